//! HTTP payment-intent service implementation.
//!
//! Posts charges to an external payment-intent endpoint and returns the
//! intent id from its response. A non-success HTTP status is treated as a
//! decline with the service's reason; transport failures are network
//! errors.

use crate::payment::{PaymentError, PaymentIntent, PaymentInterface};
use async_trait::async_trait;
use mealflow_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

/// Payment implementation backed by an HTTP payment-intent service.
pub struct IntentApiPayment {
	client: reqwest::Client,
	url: String,
	api_key: Option<String>,
}

impl IntentApiPayment {
	pub fn new(url: String, api_key: Option<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			url,
			api_key,
		}
	}
}

/// Response body of a successful intent creation.
#[derive(Debug, Deserialize)]
struct IntentResponse {
	id: String,
}

/// Response body of a declined charge.
#[derive(Debug, Deserialize)]
struct DeclineResponse {
	#[serde(default)]
	reason: Option<String>,
}

#[async_trait]
impl PaymentInterface for IntentApiPayment {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(IntentApiSchema)
	}

	async fn charge(
		&self,
		customer_id: &str,
		amount: Decimal,
	) -> Result<PaymentIntent, PaymentError> {
		let mut request = self.client.post(&self.url).json(&json!({
			"customerId": customer_id,
			"amount": amount,
		}));
		if let Some(key) = &self.api_key {
			request = request.bearer_auth(key);
		}

		let response = request
			.send()
			.await
			.map_err(|e| PaymentError::Network(e.to_string()))?;

		if response.status().is_success() {
			let body: IntentResponse = response
				.json()
				.await
				.map_err(|e| PaymentError::Network(e.to_string()))?;
			Ok(PaymentIntent { id: body.id })
		} else {
			let status = response.status();
			let reason = response
				.json::<DeclineResponse>()
				.await
				.ok()
				.and_then(|d| d.reason)
				.unwrap_or_else(|| format!("HTTP {}", status));
			Err(PaymentError::Declined(reason))
		}
	}
}

/// Configuration schema for IntentApiPayment.
pub struct IntentApiSchema;

impl ConfigSchema for IntentApiSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::String)],
			vec![Field::new("api_key", FieldType::String)],
		);
		schema.validate(config)
	}
}

/// Registry for the intent-api payment implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "intent_api";
	type Factory = crate::payment::PaymentFactory;

	fn factory() -> Self::Factory {
		create_payment
	}
}

impl crate::payment::PaymentRegistry for Registry {}

/// Factory function to create an intent-api payment gateway from
/// configuration.
///
/// Configuration parameters:
/// - `url`: endpoint for creating payment intents
/// - `api_key` (optional): bearer token
pub fn create_payment(
	config: &toml::Value,
) -> Result<Box<dyn PaymentInterface>, PaymentError> {
	IntentApiSchema
		.validate(config)
		.map_err(|e| PaymentError::Configuration(e.to_string()))?;
	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| PaymentError::Configuration("Missing 'url'".into()))?
		.to_string();
	let api_key = config
		.get("api_key")
		.and_then(|v| v.as_str())
		.map(str::to_string);
	Ok(Box::new(IntentApiPayment::new(url, api_key)))
}
