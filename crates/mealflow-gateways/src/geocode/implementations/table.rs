//! Static lookup-table geocoding implementation.
//!
//! Resolves addresses from entries in the configuration, for development
//! and test setups with a known set of addresses.

use crate::geocode::{GeocodeError, GeocodeInterface};
use async_trait::async_trait;
use mealflow_types::{
	ConfigSchema, Field, FieldType, GeoPoint, ImplementationRegistry, Schema, ValidationError,
};
use std::collections::HashMap;

/// Geocoder backed by a fixed address table.
pub struct TableGeocoder {
	entries: HashMap<String, GeoPoint>,
}

impl TableGeocoder {
	pub fn new(entries: HashMap<String, GeoPoint>) -> Self {
		Self { entries }
	}

	fn normalize(address: &str) -> String {
		address.trim().to_lowercase()
	}
}

#[async_trait]
impl GeocodeInterface for TableGeocoder {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(TableGeocoderSchema)
	}

	async fn geocode(&self, address: &str) -> Result<GeoPoint, GeocodeError> {
		self.entries
			.get(&Self::normalize(address))
			.copied()
			.ok_or_else(|| GeocodeError::NotFound(address.to_string()))
	}
}

/// Configuration schema for TableGeocoder.
pub struct TableGeocoderSchema;

impl ConfigSchema for TableGeocoderSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let entry_schema = Schema::new(
			vec![
				Field::new("address", FieldType::String),
				Field::new("latitude", FieldType::Float),
				Field::new("longitude", FieldType::Float),
			],
			vec![],
		);
		let schema = Schema::new(
			vec![Field::new(
				"entries",
				FieldType::Array(Box::new(FieldType::Table(entry_schema))),
			)],
			vec![],
		);
		schema.validate(config)
	}
}

/// Registry for the table geocoder implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "table";
	type Factory = crate::geocode::GeocodeFactory;

	fn factory() -> Self::Factory {
		create_geocoder
	}
}

impl crate::geocode::GeocodeRegistry for Registry {}

/// Factory function to create a table geocoder from configuration.
///
/// Configuration parameters:
/// - `entries`: array of `{ address, latitude, longitude }` tables
pub fn create_geocoder(
	config: &toml::Value,
) -> Result<Box<dyn GeocodeInterface>, GeocodeError> {
	TableGeocoderSchema
		.validate(config)
		.map_err(|e| GeocodeError::Configuration(e.to_string()))?;

	let mut entries = HashMap::new();
	if let Some(array) = config.get("entries").and_then(|v| v.as_array()) {
		for entry in array {
			let address = entry.get("address").and_then(|v| v.as_str());
			let latitude = entry
				.get("latitude")
				.and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)));
			let longitude = entry
				.get("longitude")
				.and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)));
			if let (Some(address), Some(latitude), Some(longitude)) = (address, latitude, longitude)
			{
				entries.insert(
					TableGeocoder::normalize(address),
					GeoPoint::new(latitude, longitude),
				);
			}
		}
	}
	Ok(Box::new(TableGeocoder::new(entries)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn lookup_is_case_insensitive() {
		let mut entries = HashMap::new();
		entries.insert("1 main st".to_string(), GeoPoint::new(45.0, -73.0));
		let geocoder = TableGeocoder::new(entries);

		let point = geocoder.geocode("  1 Main St ").await.unwrap();
		assert_eq!(point.latitude, 45.0);

		assert!(matches!(
			geocoder.geocode("2 Side St").await,
			Err(GeocodeError::NotFound(_))
		));
	}
}
