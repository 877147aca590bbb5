//! HTTP geocoding service implementation.
//!
//! Queries a places-search endpoint that returns candidate matches as a
//! JSON array with `lat`/`lon` fields (string or numeric) and uses the
//! first candidate.

use crate::geocode::{GeocodeError, GeocodeInterface};
use async_trait::async_trait;
use mealflow_types::{
	ConfigSchema, Field, FieldType, GeoPoint, ImplementationRegistry, Schema, ValidationError,
};
use serde_json::Value;

/// Geocoder backed by an HTTP places service.
pub struct HttpGeocoder {
	client: reqwest::Client,
	url: String,
}

impl HttpGeocoder {
	pub fn new(url: String) -> Self {
		Self {
			client: reqwest::Client::new(),
			url,
		}
	}
}

/// Extracts a coordinate that the service may encode as string or number.
fn coordinate(value: &Value, key: &str) -> Option<f64> {
	match value.get(key)? {
		Value::String(s) => s.parse().ok(),
		Value::Number(n) => n.as_f64(),
		_ => None,
	}
}

#[async_trait]
impl GeocodeInterface for HttpGeocoder {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpGeocoderSchema)
	}

	async fn geocode(&self, address: &str) -> Result<GeoPoint, GeocodeError> {
		let response = self
			.client
			.get(&self.url)
			.query(&[("q", address), ("format", "json"), ("limit", "1")])
			.send()
			.await
			.map_err(|e| GeocodeError::Network(e.to_string()))?;

		if !response.status().is_success() {
			return Err(GeocodeError::Network(format!(
				"HTTP {}",
				response.status()
			)));
		}

		let candidates: Vec<Value> = response
			.json()
			.await
			.map_err(|e| GeocodeError::Network(e.to_string()))?;

		let first = candidates
			.first()
			.ok_or_else(|| GeocodeError::NotFound(address.to_string()))?;
		let latitude = coordinate(first, "lat")
			.ok_or_else(|| GeocodeError::NotFound(address.to_string()))?;
		let longitude = coordinate(first, "lon")
			.ok_or_else(|| GeocodeError::NotFound(address.to_string()))?;

		Ok(GeoPoint::new(latitude, longitude))
	}
}

/// Configuration schema for HttpGeocoder.
pub struct HttpGeocoderSchema;

impl ConfigSchema for HttpGeocoderSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(vec![Field::new("url", FieldType::String)], vec![]);
		schema.validate(config)
	}
}

/// Registry for the HTTP geocoder implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = crate::geocode::GeocodeFactory;

	fn factory() -> Self::Factory {
		create_geocoder
	}
}

impl crate::geocode::GeocodeRegistry for Registry {}

/// Factory function to create an HTTP geocoder from configuration.
///
/// Configuration parameters:
/// - `url`: places-search endpoint
pub fn create_geocoder(
	config: &toml::Value,
) -> Result<Box<dyn GeocodeInterface>, GeocodeError> {
	HttpGeocoderSchema
		.validate(config)
		.map_err(|e| GeocodeError::Configuration(e.to_string()))?;
	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| GeocodeError::Configuration("Missing 'url'".into()))?
		.to_string();
	Ok(Box::new(HttpGeocoder::new(url)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn coordinate_accepts_string_and_number() {
		let candidate = json!({"lat": "45.5", "lon": -73.6});
		assert_eq!(coordinate(&candidate, "lat"), Some(45.5));
		assert_eq!(coordinate(&candidate, "lon"), Some(-73.6));
		assert_eq!(coordinate(&candidate, "alt"), None);
	}
}
