//! Order domain types for the marketplace.
//!
//! This module defines the central `Order` entity and its canonical lifecycle
//! status. The status is a single tagged enum; the legacy coarse/fine field
//! pair kept in the store is produced and consumed exclusively by the wire
//! record codec in [`crate::record`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Roles that may request a lifecycle transition.
///
/// Transitions are guarded per role; the dispatcher role is the
/// administrative override and may request any permitted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
	Customer,
	Restaurant,
	Driver,
	Dispatcher,
}

impl fmt::Display for ActorRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ActorRole::Customer => "customer",
			ActorRole::Restaurant => "restaurant",
			ActorRole::Driver => "driver",
			ActorRole::Dispatcher => "dispatcher",
		};
		f.write_str(s)
	}
}

/// Sub-stage of an order that is live but has no driver yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
	/// The record exists but the restaurant has not acted on it.
	/// Only decoded from legacy records; new orders start at `Pending`.
	Placed,
	/// The restaurant accepted the order.
	Accepted,
}

/// Sub-stage of an order that has a driver assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepStage {
	/// The restaurant is preparing the order.
	Preparing,
	/// The order is ready for the driver to collect.
	ReadyForPickup,
}

/// Canonical order lifecycle status.
///
/// One authoritative enum with sub-stages as associated data. The store
/// keeps a redundant coarse/fine string pair for compatibility with older
/// clients; mapping between that pair and this enum lives in
/// [`crate::record`], so no cross-field consistency invariant exists in the
/// domain model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum OrderStatus {
	/// Created, waiting for the restaurant to accept or reject.
	Pending,
	/// Live order without a driver.
	InProgress(ProgressStage),
	/// Driver assigned, food not collected yet.
	AssignedDriver(PrepStage),
	/// Driver has collected the order.
	PickedUp,
	/// Terminal: handed to the customer.
	Delivered,
	/// Terminal: refused by the restaurant or expired.
	Rejected,
}

impl OrderStatus {
	/// Returns true for states with no outgoing transitions.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Delivered | OrderStatus::Rejected)
	}

	/// Whether the order should surface in "in progress" dashboard views.
	///
	/// A bare `InProgress(Placed)` decoded from a legacy record is not
	/// actionable until the restaurant accepts, so it is excluded here.
	pub fn is_in_progress_view(&self) -> bool {
		matches!(
			self,
			OrderStatus::InProgress(ProgressStage::Accepted)
				| OrderStatus::AssignedDriver(_)
				| OrderStatus::PickedUp
		)
	}

	/// Whether the order still occupies restaurant or driver capacity.
	pub fn is_active(&self) -> bool {
		!self.is_terminal()
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::Pending => f.write_str("pending"),
			OrderStatus::InProgress(ProgressStage::Placed) => f.write_str("in_progress"),
			OrderStatus::InProgress(ProgressStage::Accepted) => f.write_str("in_progress/accepted"),
			OrderStatus::AssignedDriver(PrepStage::Preparing) => {
				f.write_str("assigned_driver/preparing")
			},
			OrderStatus::AssignedDriver(PrepStage::ReadyForPickup) => {
				f.write_str("assigned_driver/ready_for_pickup")
			},
			OrderStatus::PickedUp => f.write_str("picked_up"),
			OrderStatus::Delivered => f.write_str("delivered"),
			OrderStatus::Rejected => f.write_str("rejected"),
		}
	}
}

/// How the customer receives the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOption {
	Delivery,
	Pickup,
}

/// Delivery destination captured at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
	pub street: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub unit: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub instructions: Option<String>,
	/// Resolved coordinates, if geocoding succeeded at checkout.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub latitude: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub longitude: Option<f64>,
}

/// A single cart line within an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
	pub id: String,
	pub name: String,
	/// Unit price at the time the order was placed.
	pub price: Decimal,
	pub quantity: u32,
	/// Per-item customization selections: option id to chosen sub-item ids.
	#[serde(default)]
	pub customizations: HashMap<String, Vec<String>>,
	/// Always `price * quantity`; recomputed on decode, never trusted
	/// from the wire.
	pub line_total: Decimal,
}

impl LineItem {
	/// Computes the invariant line total from unit price and quantity.
	pub fn computed_total(&self) -> Decimal {
		self.price * Decimal::from(self.quantity)
	}
}

/// Immutable financial receipt, computed once at checkout.
///
/// Later discount changes at the restaurant never alter these values;
/// the order record is the authoritative receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Financials {
	pub subtotal: Decimal,
	pub discount_percentage: u32,
	pub discount_amount: Decimal,
	pub tip_percentage: u32,
	pub tip_amount: Decimal,
	pub delivery_fee: Decimal,
	pub total: Decimal,
}

/// The central marketplace entity.
///
/// Created by checkout, mutated only through the lifecycle state machine,
/// never deleted; terminal orders are retained as history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Opaque unique id, generated at creation, immutable.
	pub id: String,
	pub customer_id: String,
	pub restaurant_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub driver_id: Option<String>,
	pub status: OrderStatus,
	pub financials: Financials,
	pub delivery_option: DeliveryOption,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address: Option<Address>,
	/// Present only for orders created while the restaurant was closed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scheduled_for: Option<u64>,
	#[serde(default)]
	pub is_scheduled: bool,
	pub items: Vec<LineItem>,
	/// Server-assigned unix milliseconds, immutable after the first write.
	pub created_at: u64,
	/// Server-assigned unix milliseconds, stamped on every transition.
	pub updated_at: u64,
}

impl Order {
	/// Sum of all line totals, before discount.
	pub fn items_subtotal(&self) -> Decimal {
		self.items.iter().map(|i| i.computed_total()).sum()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn terminal_states() {
		assert!(OrderStatus::Delivered.is_terminal());
		assert!(OrderStatus::Rejected.is_terminal());
		assert!(!OrderStatus::Pending.is_terminal());
		assert!(!OrderStatus::AssignedDriver(PrepStage::Preparing).is_terminal());
	}

	#[test]
	fn placed_orders_hidden_from_in_progress_view() {
		assert!(!OrderStatus::InProgress(ProgressStage::Placed).is_in_progress_view());
		assert!(OrderStatus::InProgress(ProgressStage::Accepted).is_in_progress_view());
		assert!(OrderStatus::PickedUp.is_in_progress_view());
		assert!(!OrderStatus::Pending.is_in_progress_view());
	}

	#[test]
	fn line_total_is_price_times_quantity() {
		let item = LineItem {
			id: "itm-1".into(),
			name: "Pad Thai".into(),
			price: dec!(12.50),
			quantity: 3,
			customizations: HashMap::new(),
			line_total: dec!(0),
		};
		assert_eq!(item.computed_total(), dec!(37.50));
	}
}
