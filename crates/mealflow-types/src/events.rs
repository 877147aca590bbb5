//! Event types for inter-component communication.
//!
//! This module defines the typed event channel used by the engine for
//! asynchronous communication between components. Events flow through an
//! event bus owned by the engine; dashboards and secondary services react
//! to the resolved canonical state carried on the event instead of
//! re-deriving it from raw record fields.

use crate::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all marketplace events.
///
/// Events are categorized by the component that produces them, allowing
/// consumers to filter and handle specific event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketplaceEvent {
	/// Events from the order lifecycle state machine and checkout.
	Order(OrderEvent),
	/// Events from the driver assignment manager.
	Dispatch(DispatchEvent),
	/// Events from the scheduled-order promoter.
	Schedule(ScheduleEvent),
}

/// Events related to order creation and lifecycle transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order has been written to the live collection.
	Placed { order: Order },
	/// A new order has been written to the scheduled collection.
	Scheduled { order: Order },
	/// An order moved to a new canonical status.
	///
	/// Role-agnostic; the full updated record is carried so consumers can
	/// react to the new state without a follow-up read.
	StatusChanged {
		order_id: String,
		status: OrderStatus,
		order: Order,
	},
}

/// Events related to driver assignment and release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DispatchEvent {
	/// A driver was attached to an order.
	DriverAssigned {
		order_id: String,
		driver_id: String,
		/// True when the driver was detached from a prior order first.
		forced: bool,
	},
	/// A driver's capacity was freed.
	DriverReleased {
		driver_id: String,
		/// The order the driver was detached from, if one was linked.
		order_id: Option<String>,
	},
	/// A dangling driver/order back-reference was self-healed.
	StaleReferenceRepaired {
		driver_id: String,
		order_id: String,
	},
}

/// Events related to scheduled-order promotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScheduleEvent {
	/// A scheduled order entered the live collection as `pending`.
	Promoted { order_id: String },
	/// A due order stayed scheduled because the restaurant is closed.
	Deferred { order_id: String },
	/// A due order aged past the configured bound and was rejected.
	Expired { order_id: String },
}
