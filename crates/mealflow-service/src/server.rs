//! HTTP server for the mealflow API.
//!
//! This module provides a minimal HTTP server infrastructure exposing the
//! per-role actions and dashboard views over the engine.

use axum::{
	extract::{Path, Query, State},
	response::Json,
	routing::{get, post},
	Router,
};
use mealflow_config::ApiConfig;
use mealflow_core::{CheckoutRequest, MarketplaceEngine};
use mealflow_types::{DriverBoard, Order};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::apis::{self, ApiError};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the engine for processing requests.
	pub engine: Arc<MarketplaceEngine>,
}

/// Starts the HTTP server for the API.
///
/// This function creates and configures the HTTP server with routing,
/// middleware, and error handling for the per-role endpoints.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<MarketplaceEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app_state = AppState { engine };

	let app = Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_place_order))
				.route("/orders/{id}", get(handle_get_order))
				.route("/orders/{id}/accept", post(handle_accept))
				.route("/orders/{id}/reject", post(handle_reject))
				.route("/orders/{id}/ready", post(handle_ready))
				.route("/orders/{id}/assign", post(handle_assign))
				.route("/orders/{id}/pickup", post(handle_pickup))
				.route("/orders/{id}/deliver", post(handle_deliver))
				.route("/drivers", get(handle_driver_board))
				.route("/drivers/{id}/release", post(handle_release_driver))
				.route("/drivers/{id}/active-order", get(handle_driver_active_order))
				.route("/restaurants/{id}/orders", get(handle_restaurant_orders))
				.route(
					"/restaurants/{id}/availability",
					post(handle_set_availability),
				)
				.route("/customers/{id}/orders", get(handle_customer_orders)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(app_state);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Mealflow API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles POST /api/orders requests (customer checkout).
async fn handle_place_order(
	State(state): State<AppState>,
	Json(request): Json<CheckoutRequest>,
) -> Result<Json<apis::checkout::CheckoutResponse>, ApiError> {
	apis::checkout::place_order(&state.engine, request)
		.await
		.map(Json)
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
	apis::orders::get_order(&state.engine, &id).await.map(Json)
}

/// Handles POST /api/orders/{id}/accept requests (restaurant).
async fn handle_accept(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
	apis::orders::accept(&state.engine, &id).await.map(Json)
}

/// Handles POST /api/orders/{id}/reject requests (restaurant).
async fn handle_reject(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
	apis::orders::reject(&state.engine, &id).await.map(Json)
}

/// Handles POST /api/orders/{id}/ready requests (restaurant).
async fn handle_ready(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
	apis::orders::mark_ready(&state.engine, &id).await.map(Json)
}

/// Handles POST /api/orders/{id}/assign requests (dispatcher).
async fn handle_assign(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(request): Json<apis::orders::AssignRequest>,
) -> Result<Json<Order>, ApiError> {
	apis::orders::assign(&state.engine, &id, request)
		.await
		.map(Json)
}

/// Handles POST /api/orders/{id}/pickup requests (driver).
async fn handle_pickup(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
	apis::orders::pickup(&state.engine, &id).await.map(Json)
}

/// Handles POST /api/orders/{id}/deliver requests (driver).
async fn handle_deliver(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
	apis::orders::deliver(&state.engine, &id).await.map(Json)
}

/// Handles GET /api/drivers requests (dispatcher board).
async fn handle_driver_board(
	State(state): State<AppState>,
) -> Result<Json<DriverBoard>, ApiError> {
	apis::dispatch::driver_board(&state.engine).await.map(Json)
}

/// Handles POST /api/drivers/{id}/release requests (dispatcher reset).
async fn handle_release_driver(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
	apis::dispatch::release_driver(&state.engine, &id).await?;
	Ok(Json(serde_json::json!({ "released": id })))
}

/// Handles GET /api/drivers/{id}/active-order requests.
async fn handle_driver_active_order(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
	apis::views::driver_active_order(&state.engine, &id)
		.await
		.map(Json)
}

/// Handles GET /api/restaurants/{id}/orders requests.
async fn handle_restaurant_orders(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Query(query): Query<apis::views::RestaurantViewQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
	apis::views::restaurant_orders(&state.engine, &id, query)
		.await
		.map(Json)
}

/// Handles POST /api/restaurants/{id}/availability requests.
async fn handle_set_availability(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(request): Json<apis::restaurants::AvailabilityRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
	apis::restaurants::set_availability(&state.engine, &id, request).await?;
	Ok(Json(serde_json::json!({ "restaurantId": id })))
}

/// Handles GET /api/customers/{id}/orders requests.
async fn handle_customer_orders(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Vec<Order>>, ApiError> {
	apis::views::customer_orders(&state.engine, &id).await.map(Json)
}
