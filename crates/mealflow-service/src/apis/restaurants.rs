//! Restaurant self-service endpoints.

use crate::apis::ApiError;
use mealflow_core::MarketplaceEngine;
use mealflow_types::Collection;
use serde::Deserialize;
use serde_json::json;

/// Request body for toggling availability.
#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
	pub is_open: bool,
}

/// Flips the restaurant's `isOpen` flag.
///
/// Independently mutable at any time; the scheduled-order promoter reads
/// the flag on its next tick.
pub async fn set_availability(
	engine: &MarketplaceEngine,
	restaurant_id: &str,
	request: AvailabilityRequest,
) -> Result<(), ApiError> {
	engine
		.store()
		.update_fields(
			Collection::Restaurants,
			restaurant_id,
			vec![("isOpen".to_string(), json!(request.is_open))],
		)
		.await
		.map_err(|e| ApiError::internal(e.to_string()))?;
	Ok(())
}
