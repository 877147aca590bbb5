//! Main entry point for the mealflow service.
//!
//! This binary runs the marketplace coordination engine: the order
//! lifecycle state machine, driver dispatch, scheduled-order promotion
//! and the per-role HTTP API, over a pluggable store backend and external
//! gateway implementations.

use clap::Parser;
use mealflow_config::Config;
use mealflow_core::{MarketplaceBuilder, MarketplaceEngine, MarketplaceFactories};
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

// Import implementations from individual crates
use mealflow_gateways::geocode::implementations::http::create_geocoder as create_http_geocoder;
use mealflow_gateways::geocode::implementations::table::create_geocoder as create_table_geocoder;
use mealflow_gateways::payment::implementations::flat::create_payment as create_flat_payment;
use mealflow_gateways::payment::implementations::intent_api::create_payment as create_intent_api_payment;
use mealflow_store::implementations::file::create_store as create_file_store;
use mealflow_store::implementations::memory::create_store as create_memory_store;

/// Command-line arguments for the mealflow service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the mealflow service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the engine with all implementations
/// 5. Runs the engine (and API server) until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started mealflow");

	// Load configuration
	let config = Config::from_file_async(args.config.to_str().unwrap()).await?;
	tracing::info!("Loaded configuration [{}]", config.marketplace.id);

	// Build engine with implementations
	let engine = build_engine(config.clone())?;
	let engine = Arc::new(engine);

	// Check if API server should be started
	let api_enabled = config.api.as_ref().is_some_and(|api| api.enabled);

	if api_enabled {
		let api_config = config.api.as_ref().unwrap().clone();
		let api_engine = Arc::clone(&engine);

		// Run the engine and the API server concurrently
		tokio::select! {
			result = engine.run() => {
				tracing::info!("Engine finished");
				result?;
			}
			result = server::start_server(api_config, api_engine) => {
				tracing::info!("API server finished");
				result?;
			}
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Interrupt received");
			}
		}
	} else {
		tracing::info!("Starting engine only");
		tokio::select! {
			result = engine.run() => {
				result?;
			}
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Interrupt received");
			}
		}
	}

	engine.shutdown().await?;
	tracing::info!("Stopped mealflow");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the engine with all necessary implementations.
///
/// This function wires up all the concrete implementations for:
/// - Store backends (in-memory, file)
/// - Payment gateways (flat, HTTP intent API)
/// - Geocoders (static table, HTTP places service)
fn build_engine(config: Config) -> Result<MarketplaceEngine, Box<dyn std::error::Error>> {
	let builder = MarketplaceBuilder::new(config);

	let store_factories = create_factory_map!(
		mealflow_store::StoreInterface,
		mealflow_store::StoreError,
		"file" => create_file_store,
		"memory" => create_memory_store,
	);

	let payment_factories = create_factory_map!(
		mealflow_gateways::payment::PaymentInterface,
		mealflow_gateways::payment::PaymentError,
		"flat" => create_flat_payment,
		"intent_api" => create_intent_api_payment,
	);

	let geocode_factories = create_factory_map!(
		mealflow_gateways::geocode::GeocodeInterface,
		mealflow_gateways::geocode::GeocodeError,
		"table" => create_table_geocoder,
		"http" => create_http_geocoder,
	);

	let engine = builder.build(MarketplaceFactories {
		store_factories,
		payment_factories,
		geocode_factories,
	})?;

	Ok(engine)
}
