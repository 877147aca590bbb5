//! Notification records appended for marketplace actors.
//!
//! Notifications are best-effort: they are appended after the triggering
//! write succeeds and are never transactional with it.

use serde::{Deserialize, Serialize};

/// Kinds of notifications the engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
	/// A driver was assigned to an order.
	DriverAssigned,
	/// A scheduled order was promoted into the live collection.
	OrderPromoted,
	/// A scheduled order aged out before the restaurant reopened.
	OrderExpired,
}

/// A single notification record, persisted under
/// `notifications/{recipientId}/{notificationId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
	pub recipient_id: String,
	pub kind: NotificationKind,
	pub order_id: String,
	pub message: String,
	/// Server-assigned unix milliseconds.
	pub created_at: u64,
}
