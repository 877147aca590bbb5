//! Configuration module for the mealflow marketplace.
//!
//! This module provides structures and utilities for managing engine
//! configuration. It supports loading configuration from TOML files and
//! provides validation to ensure all required configuration values are
//! properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the mealflow engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this marketplace instance.
	pub marketplace: MarketplaceConfig,
	/// Configuration for the store backend.
	pub store: StoreConfig,
	/// Configuration for external gateways (payment, geocoding).
	pub gateways: GatewaysConfig,
	/// Configuration for the fee and pricing engine.
	#[serde(default)]
	pub pricing: PricingConfig,
	/// Configuration for the scheduled-order promoter.
	#[serde(default)]
	pub schedule: ScheduleConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the marketplace instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketplaceConfig {
	/// Unique identifier for this engine instance, used in logs.
	pub id: String,
}

/// Configuration for the store backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of store implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for one gateway kind (payment or geocode).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySection {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for all external gateways.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaysConfig {
	pub payment: GatewaySection,
	pub geocode: GatewaySection,
}

/// Configuration for the fee and pricing engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
	/// Delivery fee per kilometer of haversine distance.
	#[serde(default = "default_rate_per_km")]
	pub rate_per_km: Decimal,
}

impl Default for PricingConfig {
	fn default() -> Self {
		Self {
			rate_per_km: default_rate_per_km(),
		}
	}
}

/// Returns the default per-kilometer delivery rate of 1.50 currency units.
fn default_rate_per_km() -> Decimal {
	Decimal::new(150, 2)
}

/// Configuration for the scheduled-order promoter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
	/// Seconds between promoter ticks.
	#[serde(default = "default_tick_seconds")]
	pub tick_seconds: u64,
	/// Optional age bound in seconds for due-but-unpromotable orders.
	/// Unset preserves the legacy unbounded retry.
	#[serde(default)]
	pub max_age_seconds: Option<u64>,
}

impl Default for ScheduleConfig {
	fn default() -> Self {
		Self {
			tick_seconds: default_tick_seconds(),
			max_age_seconds: None,
		}
	}
}

/// Returns the default promoter tick period of 300 seconds.
fn default_tick_seconds() -> u64 {
	300
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

impl Config {
	/// Loads configuration from a TOML file, following includes.
	pub async fn from_file_async(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base = path.parent().unwrap_or_else(|| Path::new("."));
		let mut loader = loader::ConfigLoader::new(base);
		loader.load_config(path).await
	}

	/// Validates cross-field constraints the serde layer cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.marketplace.id.trim().is_empty() {
			return Err(ConfigError::Validation(
				"marketplace.id must not be empty".into(),
			));
		}
		if !self
			.store
			.implementations
			.contains_key(&self.store.primary)
		{
			return Err(ConfigError::Validation(format!(
				"store.primary '{}' has no matching implementation table",
				self.store.primary
			)));
		}
		for (name, section) in [
			("payment", &self.gateways.payment),
			("geocode", &self.gateways.geocode),
		] {
			if !section.implementations.contains_key(&section.primary) {
				return Err(ConfigError::Validation(format!(
					"gateways.{}.primary '{}' has no matching implementation table",
					name, section.primary
				)));
			}
		}
		if self.pricing.rate_per_km.is_sign_negative() {
			return Err(ConfigError::Validation(
				"pricing.rate_per_km must not be negative".into(),
			));
		}
		if self.schedule.tick_seconds == 0 {
			return Err(ConfigError::Validation(
				"schedule.tick_seconds must be positive".into(),
			));
		}
		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

/// Substitutes `${VAR}` and `${VAR:-default}` references with environment
/// values before TOML parsing.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Limit input size to prevent ReDoS attacks
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).unwrap();
		let var_name = cap.get(1).unwrap().as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	const MINIMAL: &str = r#"
		[marketplace]
		id = "mealflow-test"

		[store]
		primary = "memory"
		[store.implementations.memory]

		[gateways.payment]
		primary = "flat"
		[gateways.payment.implementations.flat]

		[gateways.geocode]
		primary = "table"
		[gateways.geocode.implementations.table]
		entries = []
	"#;

	#[test]
	fn minimal_config_parses_with_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.marketplace.id, "mealflow-test");
		assert_eq!(config.pricing.rate_per_km, dec!(1.50));
		assert_eq!(config.schedule.tick_seconds, 300);
		assert_eq!(config.schedule.max_age_seconds, None);
		assert!(config.api.is_none());
	}

	#[test]
	fn primary_must_reference_an_implementation() {
		let broken = MINIMAL.replace("primary = \"memory\"", "primary = \"redis\"");
		let err = broken.parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn env_var_with_default_resolves() {
		let input = "id = \"${MEALFLOW_UNSET_VAR:-fallback}\"";
		let resolved = resolve_env_vars(input).unwrap();
		assert_eq!(resolved, "id = \"fallback\"");
	}

	#[test]
	fn missing_env_var_without_default_fails() {
		let input = "id = \"${MEALFLOW_DEFINITELY_UNSET}\"";
		assert!(resolve_env_vars(input).is_err());
	}
}
