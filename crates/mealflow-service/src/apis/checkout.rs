//! Checkout endpoint: the customer places an order.

use crate::apis::ApiError;
use mealflow_core::{CheckoutReceipt, CheckoutRequest, MarketplaceEngine};
use mealflow_pricing::QuoteWarning;
use mealflow_types::Order;
use serde::Serialize;

/// Response body for a successful checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
	pub order: Order,
	pub payment_intent_id: String,
	pub warnings: Vec<QuoteWarning>,
	/// True when the order went to the scheduled holding collection.
	pub scheduled: bool,
}

impl From<CheckoutReceipt> for CheckoutResponse {
	fn from(receipt: CheckoutReceipt) -> Self {
		Self {
			order: receipt.order,
			payment_intent_id: receipt.payment_intent_id,
			warnings: receipt.warnings,
			scheduled: receipt.scheduled,
		}
	}
}

/// Processes a checkout request.
pub async fn place_order(
	engine: &MarketplaceEngine,
	request: CheckoutRequest,
) -> Result<CheckoutResponse, ApiError> {
	let receipt = engine.checkout().place(request).await?;
	Ok(receipt.into())
}
