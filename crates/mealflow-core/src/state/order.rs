//! Order lifecycle state machine implementation.
//!
//! Manages order status transitions with validation:
//! `Pending -> {InProgress(Accepted) | Rejected}`,
//! `InProgress(Accepted) -> AssignedDriver(Preparing) ->
//! AssignedDriver(ReadyForPickup) -> PickedUp -> Delivered`.
//! There is no lock on an order: racing actors are resolved by treating a
//! transition into the current status as an idempotent success and any
//! other unpermitted transition as `InvalidTransition`, surfaced to the
//! acting user and never retried. Both legacy status fields, the
//! `updatedAt` stamp and any caller-supplied fields land in one atomic
//! merge so no observer sees a torn state.

use crate::engine::event_bus::EventBus;
use mealflow_store::{server_timestamp, StoreError, StoreService};
use mealflow_types::{
	record::status_fields, truncate_id, ActorRole, Collection, MarketplaceEvent, Order,
	OrderEvent, OrderRecord, OrderStatus, PrepStage, ProgressStage,
};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur during lifecycle transitions.
#[derive(Debug, Error)]
pub enum LifecycleError {
	#[error("Invalid transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Role {role} may not request transition to {to}")]
	RoleNotPermitted { role: ActorRole, to: OrderStatus },
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Undecodable order record: {0}")]
	Decode(String),
	#[error("Store error: {0}")]
	Store(String),
}

/// Manages order state transitions and persistence.
pub struct OrderLifecycle {
	store: Arc<StoreService>,
	event_bus: EventBus,
}

impl OrderLifecycle {
	pub fn new(store: Arc<StoreService>, event_bus: EventBus) -> Self {
		Self { store, event_bus }
	}

	/// Loads and decodes an order from the live collection.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, LifecycleError> {
		let record: OrderRecord = self
			.store
			.retrieve(Collection::Orders, order_id)
			.await
			.map_err(|e| match e {
				StoreError::NotFound => LifecycleError::OrderNotFound(order_id.to_string()),
				other => LifecycleError::Store(other.to_string()),
			})?;
		record
			.decode(order_id)
			.map_err(|e| LifecycleError::Decode(e.to_string()))
	}

	/// Requests a transition to the target status.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), target = %target))]
	pub async fn transition(
		&self,
		order_id: &str,
		target: OrderStatus,
		actor: ActorRole,
	) -> Result<Order, LifecycleError> {
		self.transition_with_fields(order_id, target, actor, Vec::new())
			.await
	}

	/// Requests a transition, merging extra fields in the same atomic
	/// update.
	///
	/// Used by driver assignment to attach `driverId` together with the
	/// status pair. A request whose target equals the current status is an
	/// idempotent success; when it carries extra fields those are still
	/// written, so re-assignment over an unchanged status takes effect.
	pub async fn transition_with_fields(
		&self,
		order_id: &str,
		target: OrderStatus,
		actor: ActorRole,
		mut extra: Vec<(String, Value)>,
	) -> Result<Order, LifecycleError> {
		let order = self.get_order(order_id).await?;

		if order.status == target {
			if extra.is_empty() {
				tracing::debug!("Transition is a no-op, status already current");
				return Ok(order);
			}
		} else {
			if !is_valid_transition(&order.status, &target) {
				return Err(LifecycleError::InvalidTransition {
					from: order.status,
					to: target,
				});
			}
			if !role_permits(actor, &target) {
				return Err(LifecycleError::RoleNotPermitted { role: actor, to: target });
			}
		}

		let mut fields = status_fields(target);
		fields.push(("updatedAt".to_string(), server_timestamp()));
		if actor == ActorRole::Restaurant {
			// Guards against a disputed party association on a stale
			// record: the restaurant's transition re-asserts the link.
			fields.push((
				"restaurantId".to_string(),
				Value::String(order.restaurant_id.clone()),
			));
		}
		fields.append(&mut extra);

		self.store
			.update_fields(Collection::Orders, order_id, fields)
			.await
			.map_err(|e| LifecycleError::Store(e.to_string()))?;

		let updated = self.get_order(order_id).await?;
		self.event_bus
			.publish(MarketplaceEvent::Order(OrderEvent::StatusChanged {
				order_id: updated.id.clone(),
				status: updated.status,
				order: updated.clone(),
			}))
			.ok();

		Ok(updated)
	}

	/// Restaurant accepts a pending order.
	pub async fn accept(&self, order_id: &str) -> Result<Order, LifecycleError> {
		self.transition(
			order_id,
			OrderStatus::InProgress(ProgressStage::Accepted),
			ActorRole::Restaurant,
		)
		.await
	}

	/// Restaurant rejects a pending order.
	pub async fn reject(&self, order_id: &str) -> Result<Order, LifecycleError> {
		self.transition(order_id, OrderStatus::Rejected, ActorRole::Restaurant)
			.await
	}

	/// Restaurant marks an assigned order ready for pickup.
	pub async fn mark_ready(&self, order_id: &str) -> Result<Order, LifecycleError> {
		self.transition(
			order_id,
			OrderStatus::AssignedDriver(PrepStage::ReadyForPickup),
			ActorRole::Restaurant,
		)
		.await
	}
}

/// Flattened status identity for the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum StatusKey {
	Pending,
	Placed,
	Accepted,
	Preparing,
	ReadyForPickup,
	PickedUp,
	Delivered,
	Rejected,
}

fn status_key(status: &OrderStatus) -> StatusKey {
	match status {
		OrderStatus::Pending => StatusKey::Pending,
		OrderStatus::InProgress(ProgressStage::Placed) => StatusKey::Placed,
		OrderStatus::InProgress(ProgressStage::Accepted) => StatusKey::Accepted,
		OrderStatus::AssignedDriver(PrepStage::Preparing) => StatusKey::Preparing,
		OrderStatus::AssignedDriver(PrepStage::ReadyForPickup) => StatusKey::ReadyForPickup,
		OrderStatus::PickedUp => StatusKey::PickedUp,
		OrderStatus::Delivered => StatusKey::Delivered,
		OrderStatus::Rejected => StatusKey::Rejected,
	}
}

/// Checks if a state transition is valid.
fn is_valid_transition(from: &OrderStatus, to: &OrderStatus) -> bool {
	// Static transition table - each state maps to allowed next states.
	// `Placed` exists only on legacy records and accepts the same
	// restaurant decisions as `Pending`.
	static TRANSITIONS: Lazy<HashMap<StatusKey, HashSet<StatusKey>>> = Lazy::new(|| {
		let mut m = HashMap::new();
		m.insert(
			StatusKey::Pending,
			HashSet::from([StatusKey::Accepted, StatusKey::Rejected]),
		);
		m.insert(
			StatusKey::Placed,
			HashSet::from([StatusKey::Accepted, StatusKey::Rejected]),
		);
		m.insert(StatusKey::Accepted, HashSet::from([StatusKey::Preparing]));
		m.insert(
			StatusKey::Preparing,
			HashSet::from([StatusKey::ReadyForPickup, StatusKey::PickedUp]),
		);
		m.insert(StatusKey::ReadyForPickup, HashSet::from([StatusKey::PickedUp]));
		m.insert(StatusKey::PickedUp, HashSet::from([StatusKey::Delivered]));
		m.insert(StatusKey::Delivered, HashSet::new()); // terminal
		m.insert(StatusKey::Rejected, HashSet::new()); // terminal
		m
	});

	TRANSITIONS
		.get(&status_key(from))
		.is_some_and(|allowed| allowed.contains(&status_key(to)))
}

/// Role guard per target status. The dispatcher role is the
/// administrative override.
fn role_permits(actor: ActorRole, target: &OrderStatus) -> bool {
	if actor == ActorRole::Dispatcher {
		return true;
	}
	match target {
		OrderStatus::InProgress(ProgressStage::Accepted)
		| OrderStatus::Rejected
		| OrderStatus::AssignedDriver(PrepStage::ReadyForPickup) => {
			actor == ActorRole::Restaurant
		},
		OrderStatus::AssignedDriver(PrepStage::Preparing) => false,
		OrderStatus::PickedUp | OrderStatus::Delivered => actor == ActorRole::Driver,
		OrderStatus::Pending | OrderStatus::InProgress(ProgressStage::Placed) => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil;
	use mealflow_types::OrderStatus;

	#[tokio::test]
	async fn accept_twice_is_idempotent() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(&store, "o1", OrderStatus::Pending, None).await;
		let lifecycle = OrderLifecycle::new(store.clone(), bus);

		let first = lifecycle.accept("o1").await.unwrap();
		assert_eq!(
			first.status,
			OrderStatus::InProgress(ProgressStage::Accepted)
		);

		// Second accept reports success and leaves the status in place.
		let second = lifecycle.accept("o1").await.unwrap();
		assert_eq!(
			second.status,
			OrderStatus::InProgress(ProgressStage::Accepted)
		);
	}

	#[tokio::test]
	async fn accept_on_delivered_is_invalid_and_leaves_record_unchanged() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(&store, "o1", OrderStatus::Delivered, None).await;
		let lifecycle = OrderLifecycle::new(store.clone(), bus);

		let err = lifecycle.accept("o1").await.unwrap_err();
		assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

		let order = lifecycle.get_order("o1").await.unwrap();
		assert_eq!(order.status, OrderStatus::Delivered);
	}

	#[tokio::test]
	async fn accept_on_rejected_is_invalid() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(&store, "o1", OrderStatus::Rejected, None).await;
		let lifecycle = OrderLifecycle::new(store.clone(), bus);

		let err = lifecycle.accept("o1").await.unwrap_err();
		assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
	}

	#[tokio::test]
	async fn legacy_placed_records_accept_like_pending() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(
			&store,
			"o1",
			OrderStatus::InProgress(ProgressStage::Placed),
			None,
		)
		.await;
		let lifecycle = OrderLifecycle::new(store, bus);

		let order = lifecycle.accept("o1").await.unwrap();
		assert_eq!(order.status, OrderStatus::InProgress(ProgressStage::Accepted));
	}

	#[tokio::test]
	async fn driver_cannot_accept() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(&store, "o1", OrderStatus::Pending, None).await;
		let lifecycle = OrderLifecycle::new(store, bus);

		let err = lifecycle
			.transition(
				"o1",
				OrderStatus::InProgress(ProgressStage::Accepted),
				ActorRole::Driver,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, LifecycleError::RoleNotPermitted { .. }));
	}

	#[tokio::test]
	async fn transition_writes_both_status_fields_and_stamp_atomically() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(&store, "o1", OrderStatus::Pending, None).await;
		let lifecycle = OrderLifecycle::new(store.clone(), bus);

		lifecycle.accept("o1").await.unwrap();

		let record: OrderRecord = store.retrieve(Collection::Orders, "o1").await.unwrap();
		assert_eq!(record.status.as_deref(), Some("in_progress"));
		assert_eq!(record.order_status.as_deref(), Some("accepted"));
		assert!(record.updated_at > 0);
		// The restaurant transition re-asserted the party link.
		assert_eq!(record.restaurant_id.as_deref(), Some("r1"));
	}

	#[tokio::test]
	async fn rejecting_clears_the_fine_status_field() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(
			&store,
			"o1",
			OrderStatus::InProgress(ProgressStage::Placed),
			None,
		)
		.await;
		let lifecycle = OrderLifecycle::new(store.clone(), bus);

		lifecycle.reject("o1").await.unwrap();

		let record: OrderRecord = store.retrieve(Collection::Orders, "o1").await.unwrap();
		assert_eq!(record.status.as_deref(), Some("rejected"));
		assert_eq!(record.order_status, None);
	}

	#[tokio::test]
	async fn status_change_event_carries_canonical_state() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_order(&store, "o1", OrderStatus::Pending, None).await;
		let mut events = bus.subscribe();
		let lifecycle = OrderLifecycle::new(store, bus);

		lifecycle.accept("o1").await.unwrap();

		let event = events.recv().await.unwrap();
		match event {
			MarketplaceEvent::Order(OrderEvent::StatusChanged { status, .. }) => {
				assert_eq!(status, OrderStatus::InProgress(ProgressStage::Accepted));
			},
			other => panic!("unexpected event {:?}", other),
		}
	}
}
