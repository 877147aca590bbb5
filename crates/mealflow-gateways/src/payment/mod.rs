//! Payment-intent gateway.
//!
//! Checkout charges the computed total through this gateway before any
//! order record is written; a declined or failed charge means the order is
//! never created.

use async_trait::async_trait;
use mealflow_types::{ConfigSchema, ImplementationRegistry};
use rust_decimal::Decimal;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod flat;
	pub mod intent_api;
}

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
	/// The payment service refused the charge.
	#[error("Payment declined: {0}")]
	Declined(String),
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A successfully created payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
	pub id: String,
}

/// Trait defining the interface for payment providers.
#[async_trait]
pub trait PaymentInterface: Send + Sync {
	/// Returns the configuration schema for this payment implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Charges the given amount on behalf of a customer.
	///
	/// Synchronous-confirmation style: the returned intent id is final,
	/// there is no separate capture step at this boundary.
	async fn charge(
		&self,
		customer_id: &str,
		amount: Decimal,
	) -> Result<PaymentIntent, PaymentError>;
}

/// Type alias for payment factory functions.
pub type PaymentFactory = fn(&toml::Value) -> Result<Box<dyn PaymentInterface>, PaymentError>;

/// Registry trait for payment implementations.
pub trait PaymentRegistry: ImplementationRegistry<Factory = PaymentFactory> {}

/// Get all registered payment implementations.
pub fn get_all_implementations() -> Vec<(&'static str, PaymentFactory)> {
	use implementations::{flat, intent_api};

	vec![
		(flat::Registry::NAME, flat::Registry::factory()),
		(intent_api::Registry::NAME, intent_api::Registry::factory()),
	]
}

/// High-level payment service wrapping the configured implementation.
pub struct PaymentService {
	implementation: Box<dyn PaymentInterface>,
}

impl PaymentService {
	/// Creates a new PaymentService with the specified implementation.
	pub fn new(implementation: Box<dyn PaymentInterface>) -> Self {
		Self { implementation }
	}

	/// Charges the given amount, returning the payment intent.
	pub async fn charge(
		&self,
		customer_id: &str,
		amount: Decimal,
	) -> Result<PaymentIntent, PaymentError> {
		self.implementation.charge(customer_id, amount).await
	}
}
