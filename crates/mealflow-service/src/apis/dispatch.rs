//! Dispatcher endpoints: the driver board and manual release.

use crate::apis::ApiError;
use mealflow_core::MarketplaceEngine;
use mealflow_types::DriverBoard;

/// GET the driver board: available and busy drivers, rating-sorted.
pub async fn driver_board(engine: &MarketplaceEngine) -> Result<DriverBoard, ApiError> {
	Ok(engine.dispatch().list_drivers().await?)
}

/// Manually frees a driver's capacity (dispatcher reset).
pub async fn release_driver(
	engine: &MarketplaceEngine,
	driver_id: &str,
) -> Result<(), ApiError> {
	Ok(engine.dispatch().release(driver_id).await?)
}
