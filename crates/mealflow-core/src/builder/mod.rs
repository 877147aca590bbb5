//! Builder pattern for constructing marketplace engines.
//!
//! Provides a flexible way to compose a MarketplaceEngine from pluggable
//! implementations using factory functions: store backends plus payment
//! and geocode gateways.

use crate::engine::{event_bus::EventBus, MarketplaceEngine};
use mealflow_config::Config;
use mealflow_gateways::geocode::{GeocodeError, GeocodeInterface};
use mealflow_gateways::payment::{PaymentError, PaymentInterface};
use mealflow_gateways::{GeocodeService, PaymentService};
use mealflow_store::{StoreError, StoreInterface, StoreService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for all factory functions needed to build a
/// MarketplaceEngine.
pub struct MarketplaceFactories<SF, PF, GF> {
	pub store_factories: HashMap<String, SF>,
	pub payment_factories: HashMap<String, PF>,
	pub geocode_factories: HashMap<String, GF>,
}

/// Builder for constructing a MarketplaceEngine with pluggable
/// implementations.
pub struct MarketplaceBuilder {
	config: Config,
}

impl MarketplaceBuilder {
	/// Creates a new MarketplaceBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the MarketplaceEngine using factories for each component
	/// type.
	pub fn build<SF, PF, GF>(
		self,
		factories: MarketplaceFactories<SF, PF, GF>,
	) -> Result<MarketplaceEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StoreInterface>, StoreError>,
		PF: Fn(&toml::Value) -> Result<Box<dyn PaymentInterface>, PaymentError>,
		GF: Fn(&toml::Value) -> Result<Box<dyn GeocodeInterface>, GeocodeError>,
	{
		let store_backend = build_primary(
			"store",
			&self.config.store.primary,
			&self.config.store.implementations,
			&factories.store_factories,
		)?;
		let store = Arc::new(StoreService::new(store_backend));

		let payment_impl = build_primary(
			"payment",
			&self.config.gateways.payment.primary,
			&self.config.gateways.payment.implementations,
			&factories.payment_factories,
		)?;
		let payment = Arc::new(PaymentService::new(payment_impl));

		let geocode_impl = build_primary(
			"geocode",
			&self.config.gateways.geocode.primary,
			&self.config.gateways.geocode.implementations,
			&factories.geocode_factories,
		)?;
		let geocode = Arc::new(GeocodeService::new(geocode_impl));

		Ok(MarketplaceEngine::new(
			self.config,
			store,
			payment,
			geocode,
			EventBus::default(),
		))
	}
}

/// Instantiates the primary implementation of one component kind.
///
/// Every configured implementation table must have a registered factory;
/// the factory validates its own configuration before constructing.
fn build_primary<T: ?Sized, E: std::fmt::Display, F>(
	component: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
) -> Result<Box<T>, BuilderError>
where
	F: Fn(&toml::Value) -> Result<Box<T>, E>,
{
	let mut built = HashMap::new();
	for (name, config) in implementations {
		let Some(factory) = factories.get(name) else {
			return Err(BuilderError::Config(format!(
				"No registered {} implementation named '{}'",
				component, name
			)));
		};
		match factory(config) {
			Ok(implementation) => {
				let is_primary = primary == name;
				tracing::info!(component, implementation = %name, enabled = %is_primary, "Loaded");
				built.insert(name.clone(), implementation);
			},
			Err(e) => {
				tracing::error!(
					component,
					implementation = %name,
					error = %e,
					"Failed to create implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
		}
	}

	built.remove(primary).ok_or_else(|| {
		BuilderError::MissingComponent(format!(
			"Primary {} '{}' failed to load or has invalid configuration",
			component, primary
		))
	})
}
