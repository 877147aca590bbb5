//! Integrity repair for driver/order back-references.
//!
//! The driver and order records hold mutual pointers with no transaction
//! tying them together, so crashes and racing writers can leave orphaned
//! links. The dispatch manager repairs what it happens to read; this
//! module is the explicit, testable sweep over the whole driver and order
//! population, run at engine startup and available on demand.

use crate::engine::event_bus::EventBus;
use mealflow_store::{StoreError, StoreService};
use mealflow_types::{
	truncate_id, Collection, DispatchEvent, Driver, MarketplaceEvent, OrderRecord,
};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur during a repair sweep.
#[derive(Debug, Error)]
pub enum RecoveryError {
	#[error("Store error: {0}")]
	Store(String),
}

/// Counters from one repair sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
	/// Drivers inspected.
	pub drivers_checked: usize,
	/// Dangling `currentOrderId` fields cleared.
	pub dangling_cleared: usize,
	/// Orders whose `driverId` pointed at a missing driver.
	pub orders_detached: usize,
}

/// Sweeps the store for violated driver/order invariants and repairs
/// them.
pub struct RepairService {
	store: Arc<StoreService>,
	event_bus: EventBus,
}

impl RepairService {
	pub fn new(store: Arc<StoreService>, event_bus: EventBus) -> Self {
		Self { store, event_bus }
	}

	/// Repairs every violated back-reference it can find.
	#[instrument(skip_all)]
	pub async fn sweep(&self) -> Result<RepairReport, RecoveryError> {
		let mut report = RepairReport::default();

		// Driver side: currentOrderId must resolve to an order that
		// references this driver back.
		let drivers: Vec<(String, Driver)> = self
			.store
			.list(Collection::Drivers)
			.await
			.map_err(|e| RecoveryError::Store(e.to_string()))?;

		for (driver_id, driver) in drivers {
			report.drivers_checked += 1;
			let Some(order_id) = driver.current_order_id.clone() else {
				continue;
			};

			let linked = match self
				.store
				.retrieve::<OrderRecord>(Collection::Orders, &order_id)
				.await
			{
				Ok(record) => record.driver_id.as_deref() == Some(driver_id.as_str()),
				Err(StoreError::NotFound) => false,
				Err(e) => return Err(RecoveryError::Store(e.to_string())),
			};
			if linked {
				continue;
			}

			tracing::warn!(
				driver_id = %driver_id,
				order_id = %truncate_id(&order_id),
				"Repair sweep clearing dangling driver order reference"
			);
			self.store
				.update_fields(
					Collection::Drivers,
					&driver_id,
					vec![
						("currentOrderId".to_string(), Value::Null),
						("isAvailable".to_string(), json!(true)),
					],
				)
				.await
				.map_err(|e| RecoveryError::Store(e.to_string()))?;
			self.event_bus
				.publish(MarketplaceEvent::Dispatch(
					DispatchEvent::StaleReferenceRepaired {
						driver_id,
						order_id,
					},
				))
				.ok();
			report.dangling_cleared += 1;
		}

		// Order side: an active order referencing a driver record that no
		// longer exists gets detached.
		let orders: Vec<(String, OrderRecord)> = self
			.store
			.list(Collection::Orders)
			.await
			.map_err(|e| RecoveryError::Store(e.to_string()))?;

		for (order_id, record) in orders {
			let Some(driver_id) = record.driver_id.clone() else {
				continue;
			};
			let is_active = record
				.decode(&order_id)
				.map(|order| order.status.is_active())
				.unwrap_or(false);
			if !is_active {
				continue;
			}

			let driver_exists = self
				.store
				.exists(Collection::Drivers, &driver_id)
				.await
				.map_err(|e| RecoveryError::Store(e.to_string()))?;
			if driver_exists {
				continue;
			}

			tracing::warn!(
				order_id = %truncate_id(&order_id),
				driver_id = %driver_id,
				"Repair sweep detaching order from missing driver"
			);
			self.store
				.update_fields(
					Collection::Orders,
					&order_id,
					vec![("driverId".to_string(), Value::Null)],
				)
				.await
				.map_err(|e| RecoveryError::Store(e.to_string()))?;
			report.orders_detached += 1;
		}

		Ok(report)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil;
	use mealflow_types::{DriverApproval, OrderStatus, PrepStage};

	#[tokio::test]
	async fn clears_driver_pointer_at_missing_order() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_driver(&store, "d1", 4.0, Some("ghost"), Some(DriverApproval::Approved))
			.await;
		let repair = RepairService::new(store.clone(), bus);

		let report = repair.sweep().await.unwrap();
		assert_eq!(report.dangling_cleared, 1);

		let driver: Driver = store.retrieve(Collection::Drivers, "d1").await.unwrap();
		assert_eq!(driver.current_order_id, None);
		assert!(driver.is_available);
	}

	#[tokio::test]
	async fn clears_driver_pointer_at_reassigned_order() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(
			&store,
			"o1",
			OrderStatus::AssignedDriver(PrepStage::Preparing),
			Some("d2"),
		)
		.await;
		testutil::seed_driver(&store, "d1", 4.0, Some("o1"), Some(DriverApproval::Approved)).await;
		testutil::seed_driver(&store, "d2", 4.5, Some("o1"), Some(DriverApproval::Approved)).await;
		let repair = RepairService::new(store.clone(), bus);

		let report = repair.sweep().await.unwrap();
		assert_eq!(report.dangling_cleared, 1);

		let stale: Driver = store.retrieve(Collection::Drivers, "d1").await.unwrap();
		assert_eq!(stale.current_order_id, None);
		let current: Driver = store.retrieve(Collection::Drivers, "d2").await.unwrap();
		assert_eq!(current.current_order_id.as_deref(), Some("o1"));
	}

	#[tokio::test]
	async fn detaches_active_order_from_missing_driver() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(
			&store,
			"o1",
			OrderStatus::AssignedDriver(PrepStage::Preparing),
			Some("gone"),
		)
		.await;
		let repair = RepairService::new(store.clone(), bus);

		let report = repair.sweep().await.unwrap();
		assert_eq!(report.orders_detached, 1);

		let record: OrderRecord = store.retrieve(Collection::Orders, "o1").await.unwrap();
		assert_eq!(record.driver_id, None);
	}

	#[tokio::test]
	async fn healthy_links_are_untouched() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(
			&store,
			"o1",
			OrderStatus::AssignedDriver(PrepStage::Preparing),
			Some("d1"),
		)
		.await;
		testutil::seed_driver(&store, "d1", 4.0, Some("o1"), Some(DriverApproval::Approved)).await;
		let repair = RepairService::new(store.clone(), bus);

		let report = repair.sweep().await.unwrap();
		assert_eq!(report.dangling_cleared, 0);
		assert_eq!(report.orders_detached, 0);
	}
}
