//! Scheduled-order promotion.
//!
//! A periodic task scans the holding collection and promotes due orders
//! into the live lifecycle once the target restaurant is open. Promotion
//! is copy-then-delete so a crash mid-operation duplicates rather than
//! loses the order; the only timing guarantee is that an order is
//! processed no earlier than its `scheduledFor` time. With an expiry
//! bound configured, a due order the restaurant never reopened for is
//! terminally rejected instead of retrying forever.

use crate::engine::event_bus::EventBus;
use mealflow_gateways::Notifier;
use mealflow_store::{server_timestamp, StorePath, StoreService};
use mealflow_types::{
	now_millis, truncate_id, Collection, MarketplaceEvent, NotificationKind, OrderRecord,
	Restaurant, ScheduleEvent,
};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur during a promotion pass.
#[derive(Debug, Error)]
pub enum ScheduleError {
	#[error("Store error: {0}")]
	Store(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
}

/// Outcome counters for one promoter tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PromotionReport {
	/// Due orders examined this tick.
	pub examined: usize,
	/// Orders moved into the live collection as pending.
	pub promoted: usize,
	/// Orders terminally rejected for exceeding the age bound.
	pub expired: usize,
	/// Due orders left scheduled because the restaurant is closed.
	pub deferred: usize,
}

/// Promotes scheduled orders into the live lifecycle.
pub struct SchedulePromoter {
	store: Arc<StoreService>,
	notifier: Arc<Notifier>,
	event_bus: EventBus,
	/// Age bound in milliseconds past `scheduledFor`; `None` preserves
	/// the legacy unbounded retry.
	max_age_millis: Option<u64>,
}

impl SchedulePromoter {
	pub fn new(
		store: Arc<StoreService>,
		notifier: Arc<Notifier>,
		event_bus: EventBus,
		max_age_seconds: Option<u64>,
	) -> Self {
		Self {
			store,
			notifier,
			event_bus,
			max_age_millis: max_age_seconds.map(|s| s * 1000),
		}
	}

	/// Runs one promotion pass over the holding collection.
	#[instrument(skip_all)]
	pub async fn run_once(&self) -> Result<PromotionReport, ScheduleError> {
		let scheduled: Vec<(String, OrderRecord)> = self
			.store
			.list(Collection::ScheduledOrders)
			.await
			.map_err(|e| ScheduleError::Store(e.to_string()))?;

		let now = now_millis();
		let mut report = PromotionReport::default();

		for (order_id, record) in scheduled {
			// A record without a schedule time is due immediately.
			let due_at = record.scheduled_for.unwrap_or(0);
			if due_at > now {
				continue;
			}
			report.examined += 1;

			if self.restaurant_is_open(&record).await {
				self.promote(&order_id, record).await?;
				report.promoted += 1;
			} else if self
				.max_age_millis
				.is_some_and(|max| now.saturating_sub(due_at) > max)
			{
				self.expire(&order_id, record).await?;
				report.expired += 1;
			} else {
				// Re-evaluated on the next tick; no backoff.
				self.event_bus
					.publish(MarketplaceEvent::Schedule(ScheduleEvent::Deferred {
						order_id: order_id.clone(),
					}))
					.ok();
				report.deferred += 1;
			}
		}

		Ok(report)
	}

	async fn restaurant_is_open(&self, record: &OrderRecord) -> bool {
		let Some(restaurant_id) = record.restaurant_id.as_deref() else {
			return false;
		};
		match self
			.store
			.retrieve::<Restaurant>(Collection::Restaurants, restaurant_id)
			.await
		{
			Ok(restaurant) => restaurant.is_open,
			Err(_) => false,
		}
	}

	/// Moves a due order into the live collection as freshly pending.
	async fn promote(&self, order_id: &str, record: OrderRecord) -> Result<(), ScheduleError> {
		let customer_id = record.customer_id.clone();

		// Copy first, then delete: a failure in between leaves a
		// duplicate to reconcile, never a lost order.
		let mut value =
			serde_json::to_value(&record).map_err(|e| ScheduleError::Serialization(e.to_string()))?;
		value["status"] = Value::String("pending".to_string());
		if let Some(map) = value.as_object_mut() {
			map.remove("orderStatus");
		}
		value["isScheduled"] = Value::Bool(false);
		value["updatedAt"] = server_timestamp();

		self.store
			.backend()
			.set(&StorePath::document(Collection::Orders, order_id), value)
			.await
			.map_err(|e| ScheduleError::Store(e.to_string()))?;
		self.store
			.remove(Collection::ScheduledOrders, order_id)
			.await
			.map_err(|e| ScheduleError::Store(e.to_string()))?;

		if let Some(customer_id) = customer_id {
			self.notifier
				.append_best_effort(
					&customer_id,
					NotificationKind::OrderPromoted,
					order_id,
					"Your scheduled order has been sent to the restaurant",
				)
				.await;
		}

		tracing::info!(order_id = %truncate_id(order_id), "Promoted scheduled order");
		self.event_bus
			.publish(MarketplaceEvent::Schedule(ScheduleEvent::Promoted {
				order_id: order_id.to_string(),
			}))
			.ok();
		Ok(())
	}

	/// Terminally rejects a due order that outlived the age bound.
	/// Receipts are never deleted, so the record moves to the live
	/// collection in its terminal state.
	async fn expire(&self, order_id: &str, record: OrderRecord) -> Result<(), ScheduleError> {
		let customer_id = record.customer_id.clone();

		let mut value =
			serde_json::to_value(&record).map_err(|e| ScheduleError::Serialization(e.to_string()))?;
		value["status"] = Value::String("rejected".to_string());
		if let Some(map) = value.as_object_mut() {
			map.remove("orderStatus");
		}
		value["isScheduled"] = Value::Bool(false);
		value["updatedAt"] = server_timestamp();

		self.store
			.backend()
			.set(&StorePath::document(Collection::Orders, order_id), value)
			.await
			.map_err(|e| ScheduleError::Store(e.to_string()))?;
		self.store
			.remove(Collection::ScheduledOrders, order_id)
			.await
			.map_err(|e| ScheduleError::Store(e.to_string()))?;

		if let Some(customer_id) = customer_id {
			self.notifier
				.append_best_effort(
					&customer_id,
					NotificationKind::OrderExpired,
					order_id,
					"Your scheduled order could not be placed and was cancelled",
				)
				.await;
		}

		tracing::warn!(order_id = %truncate_id(order_id), "Expired scheduled order past age bound");
		self.event_bus
			.publish(MarketplaceEvent::Schedule(ScheduleEvent::Expired {
				order_id: order_id.to_string(),
			}))
			.ok();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil;
	use mealflow_types::OrderStatus;

	fn promoter(
		store: &Arc<StoreService>,
		bus: &EventBus,
		max_age_seconds: Option<u64>,
	) -> SchedulePromoter {
		SchedulePromoter::new(
			store.clone(),
			Arc::new(Notifier::new(store.clone())),
			bus.clone(),
			max_age_seconds,
		)
	}

	#[tokio::test]
	async fn due_order_with_closed_restaurant_stays_scheduled() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_restaurant(&store, "r1", false, None).await;
		testutil::seed_order_in(
			&store,
			Collection::ScheduledOrders,
			"o1",
			OrderStatus::Pending,
			None,
			Some(now_millis() - 60_000),
		)
		.await;
		let promoter = promoter(&store, &bus, None);

		let report = promoter.run_once().await.unwrap();
		assert_eq!(report.deferred, 1);
		assert_eq!(report.promoted, 0);

		assert!(store
			.exists(Collection::ScheduledOrders, "o1")
			.await
			.unwrap());
		assert!(!store.exists(Collection::Orders, "o1").await.unwrap());
	}

	#[tokio::test]
	async fn due_order_promotes_once_restaurant_opens() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_restaurant(&store, "r1", false, None).await;
		testutil::seed_order_in(
			&store,
			Collection::ScheduledOrders,
			"o1",
			OrderStatus::Pending,
			None,
			Some(now_millis() - 60_000),
		)
		.await;
		let promoter = promoter(&store, &bus, None);

		promoter.run_once().await.unwrap();
		testutil::seed_restaurant(&store, "r1", true, None).await;
		let report = promoter.run_once().await.unwrap();
		assert_eq!(report.promoted, 1);

		// Moved out of the holding collection, reset to pending.
		assert!(!store
			.exists(Collection::ScheduledOrders, "o1")
			.await
			.unwrap());
		let record: OrderRecord = store.retrieve(Collection::Orders, "o1").await.unwrap();
		assert_eq!(record.status.as_deref(), Some("pending"));
		assert_eq!(record.order_status, None);
		assert!(!record.is_scheduled);

		// Customer was told.
		let path = StorePath::parse("notifications/c1").unwrap();
		assert!(store.backend().get(&path).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn future_order_is_left_alone() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_restaurant(&store, "r1", true, None).await;
		testutil::seed_order_in(
			&store,
			Collection::ScheduledOrders,
			"o1",
			OrderStatus::Pending,
			None,
			Some(now_millis() + 3_600_000),
		)
		.await;
		let promoter = promoter(&store, &bus, None);

		let report = promoter.run_once().await.unwrap();
		assert_eq!(report, PromotionReport::default());
		assert!(store
			.exists(Collection::ScheduledOrders, "o1")
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn aged_out_order_is_terminally_rejected() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_restaurant(&store, "r1", false, None).await;
		// Due two hours ago with a one-hour bound.
		testutil::seed_order_in(
			&store,
			Collection::ScheduledOrders,
			"o1",
			OrderStatus::Pending,
			None,
			Some(now_millis() - 7_200_000),
		)
		.await;
		let promoter = promoter(&store, &bus, Some(3600));

		let report = promoter.run_once().await.unwrap();
		assert_eq!(report.expired, 1);

		assert!(!store
			.exists(Collection::ScheduledOrders, "o1")
			.await
			.unwrap());
		let record: OrderRecord = store.retrieve(Collection::Orders, "o1").await.unwrap();
		assert_eq!(record.status.as_deref(), Some("rejected"));
	}

	#[tokio::test]
	async fn without_age_bound_retry_is_unbounded() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_restaurant(&store, "r1", false, None).await;
		testutil::seed_order_in(
			&store,
			Collection::ScheduledOrders,
			"o1",
			OrderStatus::Pending,
			None,
			Some(now_millis() - 7_200_000),
		)
		.await;
		let promoter = promoter(&store, &bus, None);

		for _ in 0..3 {
			let report = promoter.run_once().await.unwrap();
			assert_eq!(report.deferred, 1);
		}
		assert!(store
			.exists(Collection::ScheduledOrders, "o1")
			.await
			.unwrap());
	}
}
