//! Address geocoding gateway.
//!
//! The pricing engine resolves missing coordinates through this gateway.
//! Resolution failure never blocks checkout; the caller degrades to a
//! zero delivery fee with a user-facing warning.

use async_trait::async_trait;
use mealflow_types::{ConfigSchema, GeoPoint, ImplementationRegistry};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod table;
}

/// Errors that can occur during geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
	/// The service could not resolve the address.
	#[error("Address not found: {0}")]
	NotFound(String),
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for geocoding providers.
#[async_trait]
pub trait GeocodeInterface: Send + Sync {
	/// Returns the configuration schema for this geocode implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Resolves a free-form address string to coordinates.
	async fn geocode(&self, address: &str) -> Result<GeoPoint, GeocodeError>;
}

/// Type alias for geocode factory functions.
pub type GeocodeFactory = fn(&toml::Value) -> Result<Box<dyn GeocodeInterface>, GeocodeError>;

/// Registry trait for geocode implementations.
pub trait GeocodeRegistry: ImplementationRegistry<Factory = GeocodeFactory> {}

/// Get all registered geocode implementations.
pub fn get_all_implementations() -> Vec<(&'static str, GeocodeFactory)> {
	use implementations::{http, table};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(table::Registry::NAME, table::Registry::factory()),
	]
}

/// High-level geocode service wrapping the configured implementation.
pub struct GeocodeService {
	implementation: Box<dyn GeocodeInterface>,
}

impl GeocodeService {
	/// Creates a new GeocodeService with the specified implementation.
	pub fn new(implementation: Box<dyn GeocodeInterface>) -> Self {
		Self { implementation }
	}

	/// Resolves a free-form address string to coordinates.
	pub async fn geocode(&self, address: &str) -> Result<GeoPoint, GeocodeError> {
		self.implementation.geocode(address).await
	}
}
