//! Role dashboard query views.
//!
//! Filtered projections over the live order collection for each actor
//! role. Views contain no lifecycle logic: they decode records through
//! the canonical codec and filter on the resolved status, never on raw
//! field presence. Each snapshot query has a `watch` counterpart whose
//! subscription must be released (or dropped) when the view goes away.

use mealflow_store::{StoreError, StoreService, StoreSubscription, SubscriptionHandle};
use mealflow_types::{Collection, Order, OrderRecord, OrderStatus};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while building a view.
#[derive(Debug, Error)]
pub enum ViewError {
	#[error("Store error: {0}")]
	Store(String),
}

impl From<StoreError> for ViewError {
	fn from(e: StoreError) -> Self {
		ViewError::Store(e.to_string())
	}
}

/// Read-model queries over the order collection.
pub struct DashboardViews {
	store: Arc<StoreService>,
}

impl DashboardViews {
	pub fn new(store: Arc<StoreService>) -> Self {
		Self { store }
	}

	/// Loads and decodes all live orders matching a predicate.
	///
	/// Records that fail to decode are skipped; one corrupt legacy record
	/// must not blind the dashboard.
	async fn orders_where<F>(&self, predicate: F) -> Result<Vec<Order>, ViewError>
	where
		F: Fn(&Order) -> bool,
	{
		let records: Vec<(String, OrderRecord)> =
			self.store.list(Collection::Orders).await?;
		let mut orders: Vec<Order> = records
			.into_iter()
			.filter_map(|(id, record)| match record.decode(&id) {
				Ok(order) => Some(order),
				Err(e) => {
					tracing::warn!(order_id = %id, error = %e, "Skipping undecodable order in view");
					None
				},
			})
			.filter(|order| predicate(order))
			.collect();
		orders.sort_by_key(|order| order.created_at);
		Ok(orders)
	}

	/// New orders awaiting the restaurant's decision.
	pub async fn restaurant_incoming(&self, restaurant_id: &str) -> Result<Vec<Order>, ViewError> {
		self.orders_where(|o| {
			o.restaurant_id == restaurant_id && o.status == OrderStatus::Pending
		})
		.await
	}

	/// Orders the restaurant is actively working.
	///
	/// Excludes records the restaurant has not accepted yet: a bare
	/// legacy `in_progress` is not actionable here.
	pub async fn restaurant_in_progress(
		&self,
		restaurant_id: &str,
	) -> Result<Vec<Order>, ViewError> {
		self.orders_where(|o| {
			o.restaurant_id == restaurant_id && o.status.is_in_progress_view()
		})
		.await
	}

	/// Completed orders for the restaurant.
	pub async fn restaurant_delivered(&self, restaurant_id: &str) -> Result<Vec<Order>, ViewError> {
		self.orders_where(|o| {
			o.restaurant_id == restaurant_id && o.status == OrderStatus::Delivered
		})
		.await
	}

	/// Orders the restaurant declined.
	pub async fn restaurant_rejected(&self, restaurant_id: &str) -> Result<Vec<Order>, ViewError> {
		self.orders_where(|o| {
			o.restaurant_id == restaurant_id && o.status == OrderStatus::Rejected
		})
		.await
	}

	/// All of a customer's live orders, newest first.
	pub async fn customer_orders(&self, customer_id: &str) -> Result<Vec<Order>, ViewError> {
		let mut orders = self
			.orders_where(|o| o.customer_id == customer_id)
			.await?;
		orders.reverse();
		Ok(orders)
	}

	/// The order a driver is currently working, if any.
	pub async fn driver_active_order(&self, driver_id: &str) -> Result<Option<Order>, ViewError> {
		let mut orders = self
			.orders_where(|o| o.driver_id.as_deref() == Some(driver_id) && o.status.is_active())
			.await?;
		Ok(orders.pop())
	}

	/// Opens a live subscription over the whole order collection.
	///
	/// Re-subscription after a release is always safe; releasing twice is
	/// a no-op.
	pub async fn watch_orders(&self) -> Result<StoreSubscription, ViewError> {
		Ok(self.store.watch_collection(Collection::Orders).await?)
	}

	/// Opens a live subscription on one order.
	pub async fn watch_order(&self, order_id: &str) -> Result<StoreSubscription, ViewError> {
		Ok(self.store.watch(Collection::Orders, order_id).await?)
	}

	/// Releases a view subscription.
	pub async fn release(&self, handle: SubscriptionHandle) -> Result<(), ViewError> {
		Ok(self.store.release(handle).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil;
	use mealflow_types::{PrepStage, ProgressStage};

	#[tokio::test]
	async fn restaurant_views_partition_by_canonical_status() {
		let (store, _bus) = testutil::store_and_bus();
		testutil::seed_order(&store, "o1", OrderStatus::Pending, None).await;
		// Legacy bare in_progress: not actionable, excluded everywhere.
		testutil::seed_order(
			&store,
			"o2",
			OrderStatus::InProgress(ProgressStage::Placed),
			None,
		)
		.await;
		testutil::seed_order(
			&store,
			"o3",
			OrderStatus::InProgress(ProgressStage::Accepted),
			None,
		)
		.await;
		testutil::seed_order(
			&store,
			"o4",
			OrderStatus::AssignedDriver(PrepStage::Preparing),
			Some("d1"),
		)
		.await;
		testutil::seed_order(&store, "o5", OrderStatus::Delivered, None).await;
		let views = DashboardViews::new(store);

		let incoming = views.restaurant_incoming("r1").await.unwrap();
		assert_eq!(ids(&incoming), vec!["o1"]);

		let in_progress = views.restaurant_in_progress("r1").await.unwrap();
		let mut in_progress_ids = ids(&in_progress);
		in_progress_ids.sort();
		assert_eq!(in_progress_ids, vec!["o3", "o4"]);

		let delivered = views.restaurant_delivered("r1").await.unwrap();
		assert_eq!(ids(&delivered), vec!["o5"]);
	}

	#[tokio::test]
	async fn driver_active_order_ignores_terminal_states() {
		let (store, _bus) = testutil::store_and_bus();
		testutil::seed_order(&store, "o1", OrderStatus::Delivered, Some("d1")).await;
		testutil::seed_order(&store, "o2", OrderStatus::PickedUp, Some("d1")).await;
		let views = DashboardViews::new(store);

		let active = views.driver_active_order("d1").await.unwrap().unwrap();
		assert_eq!(active.id, "o2");
		assert!(views.driver_active_order("d9").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn watch_release_rewatch_cycle() {
		let (store, _bus) = testutil::store_and_bus();
		testutil::seed_order(&store, "o1", OrderStatus::Pending, None).await;
		let views = DashboardViews::new(store);

		let sub = views.watch_orders().await.unwrap();
		let handle = sub.handle;
		views.release(handle).await.unwrap();
		views.release(handle).await.unwrap();

		let mut sub = views.watch_orders().await.unwrap();
		assert!(sub.updates.recv().await.unwrap().is_some());
	}

	fn ids(orders: &[Order]) -> Vec<&str> {
		orders.iter().map(|o| o.id.as_str()).collect()
	}
}
