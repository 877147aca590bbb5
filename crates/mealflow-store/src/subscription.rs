//! Continuous subscriptions against the document tree.
//!
//! Dashboards hold long-lived subscriptions; each is registered under an
//! opaque handle and must be explicitly released (or dropped) when the
//! view goes away, so listeners never accumulate unboundedly. Teardown is
//! idempotent and re-subscription after teardown is always safe. Dropping
//! a subscription never cancels writes already issued from it.

use crate::path::StorePath;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Opaque identifier for a registered subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// A live subscription: the registration handle plus the snapshot stream.
///
/// The first message is the value at the path at subscribe time (possibly
/// `None`); every subsequent message is the value re-read after a write
/// that overlapped the path.
pub struct StoreSubscription {
	pub handle: SubscriptionHandle,
	pub updates: mpsc::UnboundedReceiver<Option<Value>>,
}

struct Subscriber {
	path: StorePath,
	sender: mpsc::UnboundedSender<Option<Value>>,
}

/// Registry of active subscribers, shared by the store backends.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
	next_id: AtomicU64,
	subscribers: DashMap<u64, Subscriber>,
}

impl SubscriberRegistry {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Registers a subscriber and delivers the initial snapshot.
	pub(crate) fn register(&self, path: StorePath, initial: Option<Value>) -> StoreSubscription {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let (sender, updates) = mpsc::unbounded_channel();
		// The receiver is in hand, this send cannot fail.
		let _ = sender.send(initial);
		self.subscribers.insert(id, Subscriber { path, sender });
		StoreSubscription {
			handle: SubscriptionHandle(id),
			updates,
		}
	}

	/// Removes a subscriber. Removing an unknown handle is a no-op.
	pub(crate) fn remove(&self, handle: SubscriptionHandle) {
		self.subscribers.remove(&handle.0);
	}

	/// Fans a committed write out to every overlapping subscriber.
	///
	/// Each subscriber receives the value re-read at its own path from the
	/// post-write tree. Subscribers whose receiver was dropped are pruned
	/// here instead of erroring.
	pub(crate) fn notify(&self, written: &StorePath, root: &Value) {
		let mut dead = Vec::new();
		for entry in self.subscribers.iter() {
			let subscriber = entry.value();
			if !subscriber.path.overlaps(written) {
				continue;
			}
			let snapshot = crate::tree::get_at(root, subscriber.path.segments()).cloned();
			if subscriber.sender.send(snapshot).is_err() {
				dead.push(*entry.key());
			}
		}
		for id in dead {
			self.subscribers.remove(&id);
		}
	}
}
