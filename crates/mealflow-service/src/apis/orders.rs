//! Order retrieval and lifecycle transition endpoints.
//!
//! Each transition delegates to the state machine; the handlers carry no
//! lifecycle logic of their own. `InvalidTransition` surfaces as 409 to
//! the acting user and is never retried server-side.

use crate::apis::ApiError;
use mealflow_core::MarketplaceEngine;
use mealflow_types::Order;
use serde::Deserialize;

/// Request body for driver assignment.
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
	pub driver_id: String,
	/// Set after the caller confirmed overriding a busy driver.
	#[serde(default)]
	pub force: bool,
}

/// GET one order by id.
pub async fn get_order(engine: &MarketplaceEngine, order_id: &str) -> Result<Order, ApiError> {
	Ok(engine.lifecycle().get_order(order_id).await?)
}

/// Restaurant accepts a pending order.
pub async fn accept(engine: &MarketplaceEngine, order_id: &str) -> Result<Order, ApiError> {
	Ok(engine.lifecycle().accept(order_id).await?)
}

/// Restaurant rejects a pending order.
pub async fn reject(engine: &MarketplaceEngine, order_id: &str) -> Result<Order, ApiError> {
	Ok(engine.lifecycle().reject(order_id).await?)
}

/// Restaurant marks an assigned order ready for pickup.
pub async fn mark_ready(engine: &MarketplaceEngine, order_id: &str) -> Result<Order, ApiError> {
	Ok(engine.lifecycle().mark_ready(order_id).await?)
}

/// Dispatcher assigns a driver, optionally forcing over a busy one.
pub async fn assign(
	engine: &MarketplaceEngine,
	order_id: &str,
	request: AssignRequest,
) -> Result<Order, ApiError> {
	Ok(engine
		.dispatch()
		.assign(order_id, &request.driver_id, request.force)
		.await?)
}

/// Driver collects the order.
pub async fn pickup(engine: &MarketplaceEngine, order_id: &str) -> Result<Order, ApiError> {
	Ok(engine.dispatch().mark_picked_up(order_id).await?)
}

/// Driver hands the order to the customer.
pub async fn deliver(engine: &MarketplaceEngine, order_id: &str) -> Result<Order, ApiError> {
	Ok(engine.dispatch().mark_delivered(order_id).await?)
}
