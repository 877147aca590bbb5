//! Driver assignment and availability management.
//!
//! Selects, locks and releases driver capacity. There is no store-level
//! lock: competing assigns to one driver are serialized through an
//! in-process per-driver mutex, and the busy/available conflict is
//! resolved by the explicit force-confirmation flow. The driver/order
//! back-reference pair is self-healing: a dangling `currentOrderId`
//! observed on any read is cleared rather than surfaced as an error.

use crate::engine::event_bus::EventBus;
use crate::state::{LifecycleError, OrderLifecycle};
use mealflow_gateways::Notifier;
use mealflow_store::{server_timestamp, StoreError, StoreService};
use mealflow_types::{
	truncate_id, ActorRole, Collection, DispatchEvent, Driver, DriverBoard, MarketplaceEvent,
	NotificationKind, Order, OrderRecord, OrderStatus, PrepStage,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;

/// Errors that can occur during dispatch operations.
#[derive(Debug, Error)]
pub enum DispatchError {
	/// The target driver is on another order and `force` was not set.
	/// Recoverable: the caller re-invokes with force after confirmation.
	#[error("Driver {driver_id} is busy with order {current_order_id}")]
	DriverBusy {
		driver_id: String,
		current_order_id: String,
	},
	#[error("Driver not found: {0}")]
	DriverNotFound(String),
	#[error(transparent)]
	Lifecycle(#[from] LifecycleError),
	#[error("Store error: {0}")]
	Store(String),
}

/// Manages driver capacity and its coupling to order state.
pub struct DispatchManager {
	store: Arc<StoreService>,
	lifecycle: Arc<OrderLifecycle>,
	notifier: Arc<Notifier>,
	event_bus: EventBus,
	/// Per-driver mutexes serializing detach-then-attach within this
	/// process. Cross-process racing force-assigns remain last-writer-wins
	/// at the store.
	assign_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DispatchManager {
	pub fn new(
		store: Arc<StoreService>,
		lifecycle: Arc<OrderLifecycle>,
		notifier: Arc<Notifier>,
		event_bus: EventBus,
	) -> Self {
		Self {
			store,
			lifecycle,
			notifier,
			event_bus,
			assign_locks: Mutex::new(HashMap::new()),
		}
	}

	async fn driver_lock(&self, driver_id: &str) -> Arc<Mutex<()>> {
		let mut locks = self.assign_locks.lock().await;
		locks
			.entry(driver_id.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}

	async fn load_driver(&self, driver_id: &str) -> Result<Driver, DispatchError> {
		self.store
			.retrieve(Collection::Drivers, driver_id)
			.await
			.map_err(|e| match e {
				StoreError::NotFound => DispatchError::DriverNotFound(driver_id.to_string()),
				other => DispatchError::Store(other.to_string()),
			})
	}

	/// Lists drivers partitioned into available and busy, each sorted by
	/// rating descending. Drivers without a resolvable approval status
	/// are excluded, and dangling order references are repaired on read.
	pub async fn list_drivers(&self) -> Result<DriverBoard, DispatchError> {
		let drivers: Vec<(String, Driver)> = self
			.store
			.list(Collection::Drivers)
			.await
			.map_err(|e| DispatchError::Store(e.to_string()))?;

		let mut board = DriverBoard::default();
		for (_, driver) in drivers {
			if driver.approval.is_none() {
				continue;
			}
			let driver = self.repair_if_stale(driver).await?;
			if driver.current_order_id.is_some() {
				board.busy.push(driver);
			} else if driver.is_available {
				board.available.push(driver);
			}
		}

		board
			.available
			.sort_by(|a, b| b.rating.total_cmp(&a.rating));
		board.busy.sort_by(|a, b| b.rating.total_cmp(&a.rating));
		Ok(board)
	}

	/// Assigns a driver to an order.
	///
	/// A busy driver fails with [`DispatchError::DriverBusy`] unless
	/// `force` is set, in which case the prior order is detached first,
	/// sequentially; a failed detach aborts before the primary write. On
	/// success the order advances to `AssignedDriver(Preparing)` with
	/// `driverId` in the same atomic update, the driver is locked, and a
	/// fire-and-forget notification is appended for the driver.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), driver_id = %driver_id, force))]
	pub async fn assign(
		&self,
		order_id: &str,
		driver_id: &str,
		force: bool,
	) -> Result<Order, DispatchError> {
		let lock = self.driver_lock(driver_id).await;
		let _guard = lock.lock().await;

		let driver = self.load_driver(driver_id).await?;
		let driver = self.repair_if_stale(driver).await?;

		let forced = if let Some(prior_order_id) = driver.current_order_id.clone() {
			if !force {
				return Err(DispatchError::DriverBusy {
					driver_id: driver_id.to_string(),
					current_order_id: prior_order_id,
				});
			}
			self.detach_order(&prior_order_id, driver_id).await?;
			true
		} else {
			false
		};

		let order = self
			.lifecycle
			.transition_with_fields(
				order_id,
				OrderStatus::AssignedDriver(PrepStage::Preparing),
				ActorRole::Dispatcher,
				vec![("driverId".to_string(), json!(driver_id))],
			)
			.await?;

		self.store
			.update_fields(
				Collection::Drivers,
				driver_id,
				vec![
					("isAvailable".to_string(), json!(false)),
					("currentOrderId".to_string(), json!(order_id)),
				],
			)
			.await
			.map_err(|e| DispatchError::Store(e.to_string()))?;

		// Fire-and-forget: a failed append is logged, never rolled back.
		self.notifier
			.append_best_effort(
				driver_id,
				NotificationKind::DriverAssigned,
				order_id,
				"You have been assigned a new delivery",
			)
			.await;

		self.event_bus
			.publish(MarketplaceEvent::Dispatch(DispatchEvent::DriverAssigned {
				order_id: order_id.to_string(),
				driver_id: driver_id.to_string(),
				forced,
			}))
			.ok();

		Ok(order)
	}

	/// Frees a driver's capacity.
	///
	/// Clears `currentOrderId` and re-opens availability; when the linked
	/// order still references the driver its `driverId` is cleared too,
	/// restoring the bidirectional invariant.
	#[instrument(skip_all, fields(driver_id = %driver_id))]
	pub async fn release(&self, driver_id: &str) -> Result<(), DispatchError> {
		let lock = self.driver_lock(driver_id).await;
		let _guard = lock.lock().await;

		let driver = self.load_driver(driver_id).await?;

		let mut released_from = None;
		if let Some(order_id) = &driver.current_order_id {
			self.detach_order(order_id, driver_id).await?;
			released_from = Some(order_id.clone());
		}

		self.store
			.update_fields(
				Collection::Drivers,
				driver_id,
				vec![
					("currentOrderId".to_string(), Value::Null),
					("isAvailable".to_string(), json!(true)),
				],
			)
			.await
			.map_err(|e| DispatchError::Store(e.to_string()))?;

		self.event_bus
			.publish(MarketplaceEvent::Dispatch(DispatchEvent::DriverReleased {
				driver_id: driver_id.to_string(),
				order_id: released_from,
			}))
			.ok();

		Ok(())
	}

	/// Driver collects the order.
	pub async fn mark_picked_up(&self, order_id: &str) -> Result<Order, DispatchError> {
		Ok(self
			.lifecycle
			.transition(order_id, OrderStatus::PickedUp, ActorRole::Driver)
			.await?)
	}

	/// Driver hands the order to the customer; the driver's capacity is
	/// released afterwards.
	pub async fn mark_delivered(&self, order_id: &str) -> Result<Order, DispatchError> {
		let order = self
			.lifecycle
			.transition(order_id, OrderStatus::Delivered, ActorRole::Driver)
			.await?;

		if let Some(driver_id) = order.driver_id.clone() {
			self.release(&driver_id).await?;
		}

		Ok(order)
	}

	/// Clears the order side of a driver link when it still points at the
	/// driver. Missing orders are treated as already detached.
	async fn detach_order(&self, order_id: &str, driver_id: &str) -> Result<(), DispatchError> {
		let record: Option<OrderRecord> =
			match self.store.retrieve(Collection::Orders, order_id).await {
				Ok(record) => Some(record),
				Err(StoreError::NotFound) => None,
				Err(e) => return Err(DispatchError::Store(e.to_string())),
			};

		if let Some(record) = record {
			if record.driver_id.as_deref() == Some(driver_id) {
				self.store
					.update_fields(
						Collection::Orders,
						order_id,
						vec![
							("driverId".to_string(), Value::Null),
							("updatedAt".to_string(), server_timestamp()),
						],
					)
					.await
					.map_err(|e| DispatchError::Store(e.to_string()))?;
			}
		}
		Ok(())
	}

	/// On-read integrity repair: a driver whose `currentOrderId` does not
	/// resolve to an order referencing them back gets the dangling field
	/// cleared. Self-healing, logged, never an error path.
	async fn repair_if_stale(&self, mut driver: Driver) -> Result<Driver, DispatchError> {
		let Some(order_id) = driver.current_order_id.clone() else {
			return Ok(driver);
		};

		let linked = match self
			.store
			.retrieve::<OrderRecord>(Collection::Orders, &order_id)
			.await
		{
			Ok(record) => record.driver_id.as_deref() == Some(driver.id.as_str()),
			Err(StoreError::NotFound) => false,
			Err(e) => return Err(DispatchError::Store(e.to_string())),
		};

		if linked {
			return Ok(driver);
		}

		tracing::warn!(
			driver_id = %driver.id,
			order_id = %truncate_id(&order_id),
			"Clearing stale driver order reference"
		);
		self.store
			.update_fields(
				Collection::Drivers,
				&driver.id,
				vec![
					("currentOrderId".to_string(), Value::Null),
					("isAvailable".to_string(), json!(true)),
				],
			)
			.await
			.map_err(|e| DispatchError::Store(e.to_string()))?;

		self.event_bus
			.publish(MarketplaceEvent::Dispatch(
				DispatchEvent::StaleReferenceRepaired {
					driver_id: driver.id.clone(),
					order_id,
				},
			))
			.ok();

		driver.current_order_id = None;
		driver.is_available = true;
		Ok(driver)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil;
	use mealflow_types::{DriverApproval, ProgressStage};

	fn manager(store: &Arc<StoreService>, bus: &EventBus) -> DispatchManager {
		let lifecycle = Arc::new(OrderLifecycle::new(store.clone(), bus.clone()));
		let notifier = Arc::new(Notifier::new(store.clone()));
		DispatchManager::new(store.clone(), lifecycle, notifier, bus.clone())
	}

	#[tokio::test]
	async fn board_partitions_and_sorts_by_rating() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_driver(&store, "d1", 4.2, None, Some(DriverApproval::Approved)).await;
		testutil::seed_driver(&store, "d2", 4.9, None, Some(DriverApproval::Approved)).await;
		testutil::seed_order(&store, "o1", OrderStatus::AssignedDriver(PrepStage::Preparing), Some("d3")).await;
		testutil::seed_driver(&store, "d3", 3.1, Some("o1"), Some(DriverApproval::Approved)).await;
		// No resolvable approval status: excluded entirely.
		testutil::seed_driver(&store, "d4", 5.0, None, None).await;

		let board = manager(&store, &bus).list_drivers().await.unwrap();
		let available: Vec<&str> = board.available.iter().map(|d| d.id.as_str()).collect();
		let busy: Vec<&str> = board.busy.iter().map(|d| d.id.as_str()).collect();
		assert_eq!(available, vec!["d2", "d1"]);
		assert_eq!(busy, vec!["d3"]);
	}

	#[tokio::test]
	async fn assign_locks_driver_and_advances_order() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(
			&store,
			"o1",
			OrderStatus::InProgress(ProgressStage::Accepted),
			None,
		)
		.await;
		testutil::seed_driver(&store, "d1", 4.5, None, Some(DriverApproval::Approved)).await;
		let manager = manager(&store, &bus);

		let order = manager.assign("o1", "d1", false).await.unwrap();
		assert_eq!(
			order.status,
			OrderStatus::AssignedDriver(PrepStage::Preparing)
		);
		assert_eq!(order.driver_id.as_deref(), Some("d1"));

		let driver: Driver = store.retrieve(Collection::Drivers, "d1").await.unwrap();
		assert!(!driver.is_available);
		assert_eq!(driver.current_order_id.as_deref(), Some("o1"));

		// The fire-and-forget notification landed for the driver.
		let path = mealflow_store::StorePath::parse("notifications/d1").unwrap();
		assert!(store.backend().get(&path).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn busy_driver_without_force_is_refused() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(
			&store,
			"oA",
			OrderStatus::AssignedDriver(PrepStage::Preparing),
			Some("d1"),
		)
		.await;
		testutil::seed_order(
			&store,
			"oB",
			OrderStatus::InProgress(ProgressStage::Accepted),
			None,
		)
		.await;
		testutil::seed_driver(&store, "d1", 4.5, Some("oA"), Some(DriverApproval::Approved)).await;
		let manager = manager(&store, &bus);

		let err = manager.assign("oB", "d1", false).await.unwrap_err();
		assert!(matches!(err, DispatchError::DriverBusy { .. }));

		// Nothing moved.
		let record: OrderRecord = store.retrieve(Collection::Orders, "oB").await.unwrap();
		assert_eq!(record.driver_id, None);
	}

	#[tokio::test]
	async fn force_assign_detaches_prior_order_first() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(
			&store,
			"oA",
			OrderStatus::AssignedDriver(PrepStage::Preparing),
			Some("d1"),
		)
		.await;
		testutil::seed_order(
			&store,
			"oB",
			OrderStatus::InProgress(ProgressStage::Accepted),
			None,
		)
		.await;
		testutil::seed_driver(&store, "d1", 4.5, Some("oA"), Some(DriverApproval::Approved)).await;
		let manager = manager(&store, &bus);

		manager.assign("oB", "d1", true).await.unwrap();

		let prior: OrderRecord = store.retrieve(Collection::Orders, "oA").await.unwrap();
		assert_eq!(prior.driver_id, None);
		let target: OrderRecord = store.retrieve(Collection::Orders, "oB").await.unwrap();
		assert_eq!(target.driver_id.as_deref(), Some("d1"));
		let driver: Driver = store.retrieve(Collection::Drivers, "d1").await.unwrap();
		assert_eq!(driver.current_order_id.as_deref(), Some("oB"));
	}

	#[tokio::test]
	async fn release_clears_both_sides_of_the_link() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(
			&store,
			"o1",
			OrderStatus::AssignedDriver(PrepStage::Preparing),
			Some("d1"),
		)
		.await;
		testutil::seed_driver(&store, "d1", 4.5, Some("o1"), Some(DriverApproval::Approved)).await;
		let manager = manager(&store, &bus);

		manager.release("d1").await.unwrap();

		let driver: Driver = store.retrieve(Collection::Drivers, "d1").await.unwrap();
		assert!(driver.is_available);
		assert_eq!(driver.current_order_id, None);
		let record: OrderRecord = store.retrieve(Collection::Orders, "o1").await.unwrap();
		assert_eq!(record.driver_id, None);
	}

	#[tokio::test]
	async fn delivery_completion_releases_the_driver() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(&store, "o1", OrderStatus::PickedUp, Some("d1")).await;
		testutil::seed_driver(&store, "d1", 4.5, Some("o1"), Some(DriverApproval::Approved)).await;
		let manager = manager(&store, &bus);

		let order = manager.mark_delivered("o1").await.unwrap();
		assert_eq!(order.status, OrderStatus::Delivered);

		let driver: Driver = store.retrieve(Collection::Drivers, "d1").await.unwrap();
		assert!(driver.is_available);
		assert_eq!(driver.current_order_id, None);
	}

	#[tokio::test]
	async fn stale_reference_is_repaired_on_read() {
		let (store, bus) = testutil::store_and_bus();
		// Driver points at an order that was re-assigned to someone else.
		testutil::seed_order(
			&store,
			"o1",
			OrderStatus::AssignedDriver(PrepStage::Preparing),
			Some("d2"),
		)
		.await;
		testutil::seed_driver(&store, "d1", 4.5, Some("o1"), Some(DriverApproval::Approved)).await;
		let manager = manager(&store, &bus);

		let board = manager.list_drivers().await.unwrap();
		assert!(board.busy.is_empty());
		assert_eq!(board.available.len(), 1);

		let driver: Driver = store.retrieve(Collection::Drivers, "d1").await.unwrap();
		assert_eq!(driver.current_order_id, None);
		assert!(driver.is_available);
	}
}
