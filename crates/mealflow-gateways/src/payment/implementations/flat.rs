//! Local always-approve payment implementation.
//!
//! Approves every charge (optionally declining above a configured cap)
//! and fabricates intent ids locally. Intended for development and test
//! configurations where no payment service is reachable.

use crate::payment::{PaymentError, PaymentIntent, PaymentInterface};
use async_trait::async_trait;
use mealflow_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Payment implementation that approves everything under an optional cap.
pub struct FlatPayment {
	/// Charges strictly above this amount are declined, when set.
	decline_over: Option<Decimal>,
}

impl FlatPayment {
	pub fn new(decline_over: Option<Decimal>) -> Self {
		Self { decline_over }
	}
}

#[async_trait]
impl PaymentInterface for FlatPayment {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FlatPaymentSchema)
	}

	async fn charge(
		&self,
		customer_id: &str,
		amount: Decimal,
	) -> Result<PaymentIntent, PaymentError> {
		if let Some(cap) = self.decline_over {
			if amount > cap {
				return Err(PaymentError::Declined(format!(
					"Amount {} exceeds configured cap {}",
					amount, cap
				)));
			}
		}
		let intent = PaymentIntent {
			id: format!("pi_{}", uuid::Uuid::new_v4().simple()),
		};
		tracing::debug!(customer_id = %customer_id, amount = %amount, intent_id = %intent.id, "Flat payment approved");
		Ok(intent)
	}
}

/// Configuration schema for FlatPayment.
pub struct FlatPaymentSchema;

impl ConfigSchema for FlatPaymentSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(vec![], vec![Field::new("decline_over", FieldType::Float)]);
		schema.validate(config)
	}
}

/// Registry for the flat payment implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "flat";
	type Factory = crate::payment::PaymentFactory;

	fn factory() -> Self::Factory {
		create_payment
	}
}

impl crate::payment::PaymentRegistry for Registry {}

/// Factory function to create a flat payment gateway from configuration.
///
/// Configuration parameters:
/// - `decline_over` (optional): decline charges above this amount
pub fn create_payment(
	config: &toml::Value,
) -> Result<Box<dyn PaymentInterface>, PaymentError> {
	FlatPaymentSchema
		.validate(config)
		.map_err(|e| PaymentError::Configuration(e.to_string()))?;
	let decline_over = config
		.get("decline_over")
		.and_then(|v| v.as_float())
		.and_then(Decimal::from_f64);
	Ok(Box::new(FlatPayment::new(decline_over)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[tokio::test]
	async fn approves_under_cap_and_declines_over() {
		let gateway = FlatPayment::new(Some(dec!(50)));
		assert!(gateway.charge("c1", dec!(45.90)).await.is_ok());
		assert!(matches!(
			gateway.charge("c1", dec!(50.01)).await,
			Err(PaymentError::Declined(_))
		));
	}

	#[tokio::test]
	async fn uncapped_approves_everything() {
		let gateway = FlatPayment::new(None);
		assert!(gateway.charge("c1", dec!(10000)).await.is_ok());
	}
}
