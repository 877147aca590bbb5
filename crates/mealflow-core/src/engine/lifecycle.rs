//! Lifecycle management for the marketplace engine.
//!
//! Handles initialization and shutdown procedures, ensuring the store is
//! consistent before the engine starts serving actors.

use super::MarketplaceEngine;

impl MarketplaceEngine {
	/// Performs any initialization required before running.
	///
	/// Runs the integrity repair sweep so dangling driver/order
	/// references left by a previous crash are healed before any actor
	/// observes them.
	pub async fn initialize(&self) -> Result<(), super::EngineError> {
		tracing::info!(marketplace = %self.config.marketplace.id, "Initializing marketplace engine");

		let report = self
			.repair
			.sweep()
			.await
			.map_err(|e| super::EngineError::Service(e.to_string()))?;
		if report.dangling_cleared > 0 || report.orders_detached > 0 {
			tracing::info!(
				drivers_checked = report.drivers_checked,
				dangling_cleared = report.dangling_cleared,
				orders_detached = report.orders_detached,
				"Startup repair sweep healed stale references"
			);
		}

		Ok(())
	}

	/// Performs cleanup operations.
	pub async fn shutdown(&self) -> Result<(), super::EngineError> {
		tracing::info!("Shutting down marketplace engine");
		Ok(())
	}
}
