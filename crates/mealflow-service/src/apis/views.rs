//! Dashboard view endpoints.
//!
//! Thin projections over the core read model; the filtering itself lives
//! in `mealflow-core::views` and works on the resolved canonical status.

use crate::apis::ApiError;
use axum::http::StatusCode;
use mealflow_core::MarketplaceEngine;
use mealflow_types::Order;
use serde::Deserialize;

/// Which restaurant dashboard slice to return.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestaurantView {
	Incoming,
	InProgress,
	Delivered,
	Rejected,
}

/// Query parameters for the restaurant dashboard.
#[derive(Debug, Deserialize)]
pub struct RestaurantViewQuery {
	pub view: RestaurantView,
}

/// GET a restaurant's dashboard slice.
pub async fn restaurant_orders(
	engine: &MarketplaceEngine,
	restaurant_id: &str,
	query: RestaurantViewQuery,
) -> Result<Vec<Order>, ApiError> {
	let views = engine.views();
	let orders = match query.view {
		RestaurantView::Incoming => views.restaurant_incoming(restaurant_id).await?,
		RestaurantView::InProgress => views.restaurant_in_progress(restaurant_id).await?,
		RestaurantView::Delivered => views.restaurant_delivered(restaurant_id).await?,
		RestaurantView::Rejected => views.restaurant_rejected(restaurant_id).await?,
	};
	Ok(orders)
}

/// GET a customer's orders, newest first.
pub async fn customer_orders(
	engine: &MarketplaceEngine,
	customer_id: &str,
) -> Result<Vec<Order>, ApiError> {
	Ok(engine.views().customer_orders(customer_id).await?)
}

/// GET the order a driver is currently working.
pub async fn driver_active_order(
	engine: &MarketplaceEngine,
	driver_id: &str,
) -> Result<Order, ApiError> {
	engine
		.views()
		.driver_active_order(driver_id)
		.await?
		.ok_or_else(|| {
			ApiError::new(
				StatusCode::NOT_FOUND,
				"NO_ACTIVE_ORDER",
				format!("Driver {} has no active order", driver_id),
			)
		})
}
