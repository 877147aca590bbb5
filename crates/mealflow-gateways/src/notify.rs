//! Store-backed notification appends.
//!
//! Notifications are fanned out by appending records under
//! `notifications/{recipientId}`. They are best-effort by contract: a
//! failed append after a successful primary write is logged and never
//! rolls the primary write back.

use mealflow_store::{server_timestamp, StoreError, StorePath, StoreService};
use mealflow_types::{Collection, NotificationKind};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while appending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
	/// Error that occurs in the underlying store.
	#[error("Store error: {0}")]
	Store(#[from] StoreError),
	/// Error that occurs while encoding the record.
	#[error("Serialization error: {0}")]
	Serialization(String),
}

/// Appends notification records through the store.
pub struct Notifier {
	store: Arc<StoreService>,
}

impl Notifier {
	pub fn new(store: Arc<StoreService>) -> Self {
		Self { store }
	}

	/// Appends one notification record for a recipient.
	pub async fn append(
		&self,
		recipient_id: &str,
		kind: NotificationKind,
		order_id: &str,
		message: &str,
	) -> Result<(), NotifyError> {
		let kind_value =
			serde_json::to_value(kind).map_err(|e| NotifyError::Serialization(e.to_string()))?;
		let record = json!({
			"recipientId": recipient_id,
			"kind": kind_value,
			"orderId": order_id,
			"message": message,
			"createdAt": server_timestamp(),
		});
		let push_id = uuid::Uuid::new_v4().simple().to_string();
		let path = StorePath::collection(Collection::Notifications)
			.child(recipient_id)
			.child(&push_id);
		self.store.backend().set(&path, record).await?;
		Ok(())
	}

	/// Appends a notification, downgrading failure to a warning.
	///
	/// Used after primary writes that must not be rolled back when the
	/// notification append fails.
	pub async fn append_best_effort(
		&self,
		recipient_id: &str,
		kind: NotificationKind,
		order_id: &str,
		message: &str,
	) {
		if let Err(e) = self.append(recipient_id, kind, order_id, message).await {
			tracing::warn!(
				recipient_id = %recipient_id,
				order_id = %order_id,
				error = %e,
				"Failed to append notification"
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use mealflow_store::implementations::memory::MemoryStore;

	#[tokio::test]
	async fn append_lands_under_recipient() {
		let store = Arc::new(StoreService::new(Box::new(MemoryStore::new())));
		let notifier = Notifier::new(store.clone());

		notifier
			.append("c1", NotificationKind::OrderPromoted, "o1", "Your order is live")
			.await
			.unwrap();

		let path = StorePath::parse("notifications/c1").unwrap();
		let value = store.backend().get(&path).await.unwrap().unwrap();
		let records: Vec<&serde_json::Value> = value.as_object().unwrap().values().collect();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0]["kind"], "order_promoted");
		assert!(records[0]["createdAt"].as_u64().unwrap() > 0);
	}
}
