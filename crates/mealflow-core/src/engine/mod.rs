//! Core marketplace engine that owns the order lifecycle.
//!
//! This module contains the main MarketplaceEngine struct which wires the
//! lifecycle state machine, checkout, dispatch, scheduled-order promotion
//! and repair over the shared store, and runs the periodic promoter loop.

pub mod event_bus;
pub mod lifecycle;

use crate::checkout::CheckoutService;
use crate::dispatch::DispatchManager;
use crate::recovery::RepairService;
use crate::schedule::SchedulePromoter;
use crate::state::OrderLifecycle;
use crate::views::DashboardViews;
use mealflow_config::Config;
use mealflow_gateways::{GeocodeService, Notifier, PaymentService};
use mealflow_pricing::PricingEngine;
use mealflow_store::StoreService;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Main engine coordinating all marketplace components.
#[derive(Clone)]
pub struct MarketplaceEngine {
	/// Engine configuration.
	pub(crate) config: Config,
	/// Store service for the shared document tree.
	pub(crate) store: Arc<StoreService>,
	/// Event bus for inter-component communication.
	pub(crate) event_bus: event_bus::EventBus,
	/// Order lifecycle state machine.
	pub(crate) lifecycle: Arc<OrderLifecycle>,
	/// Driver assignment and availability manager.
	pub(crate) dispatch: Arc<DispatchManager>,
	/// Checkout / order placement.
	pub(crate) checkout: Arc<CheckoutService>,
	/// Scheduled-order promoter.
	pub(crate) promoter: Arc<SchedulePromoter>,
	/// Role dashboard query views.
	pub(crate) views: Arc<DashboardViews>,
	/// Integrity repair sweep.
	pub(crate) repair: Arc<RepairService>,
}

impl std::fmt::Debug for MarketplaceEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MarketplaceEngine").finish_non_exhaustive()
	}
}

impl MarketplaceEngine {
	/// Creates a new engine from the configured services.
	pub fn new(
		config: Config,
		store: Arc<StoreService>,
		payment: Arc<PaymentService>,
		geocode: Arc<GeocodeService>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let notifier = Arc::new(Notifier::new(store.clone()));
		let pricing = Arc::new(PricingEngine::new(geocode, config.pricing.rate_per_km));

		let lifecycle = Arc::new(OrderLifecycle::new(store.clone(), event_bus.clone()));
		let dispatch = Arc::new(DispatchManager::new(
			store.clone(),
			lifecycle.clone(),
			notifier.clone(),
			event_bus.clone(),
		));
		let checkout = Arc::new(CheckoutService::new(
			store.clone(),
			pricing,
			payment,
			event_bus.clone(),
		));
		let promoter = Arc::new(SchedulePromoter::new(
			store.clone(),
			notifier,
			event_bus.clone(),
			config.schedule.max_age_seconds,
		));
		let views = Arc::new(DashboardViews::new(store.clone()));
		let repair = Arc::new(RepairService::new(store.clone(), event_bus.clone()));

		Self {
			config,
			store,
			event_bus,
			lifecycle,
			dispatch,
			checkout,
			promoter,
			views,
			repair,
		}
	}

	/// Main execution loop: periodic promotion ticks plus event tracing.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.initialize().await?;

		let mut ticker =
			tokio::time::interval(Duration::from_secs(self.config.schedule.tick_seconds));
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		let mut events = self.event_bus.subscribe();

		loop {
			tokio::select! {
				_ = ticker.tick() => {
					match self.promoter.run_once().await {
						Ok(report) if report.promoted > 0 || report.expired > 0 => {
							tracing::info!(
								promoted = report.promoted,
								expired = report.expired,
								deferred = report.deferred,
								"Promoter tick"
							);
						},
						Ok(_) => {},
						Err(e) => {
							tracing::warn!(error = %e, "Promoter tick failed");
						},
					}
				}

				event = events.recv() => {
					match event {
						Ok(event) => {
							tracing::debug!(event = ?event, "Marketplace event");
						},
						Err(RecvError::Lagged(skipped)) => {
							tracing::warn!(skipped, "Event tracing lagged behind the bus");
						},
						Err(RecvError::Closed) => break,
					}
				}
			}
		}

		Ok(())
	}

	/// Engine configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// The shared store service.
	pub fn store(&self) -> &Arc<StoreService> {
		&self.store
	}

	/// The event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// The order lifecycle state machine.
	pub fn lifecycle(&self) -> &Arc<OrderLifecycle> {
		&self.lifecycle
	}

	/// The driver assignment manager.
	pub fn dispatch(&self) -> &Arc<DispatchManager> {
		&self.dispatch
	}

	/// The checkout service.
	pub fn checkout(&self) -> &Arc<CheckoutService> {
		&self.checkout
	}

	/// The scheduled-order promoter.
	pub fn promoter(&self) -> &Arc<SchedulePromoter> {
		&self.promoter
	}

	/// The dashboard views.
	pub fn views(&self) -> &Arc<DashboardViews> {
		&self.views
	}

	/// The repair service.
	pub fn repair(&self) -> &Arc<RepairService> {
		&self.repair
	}
}
