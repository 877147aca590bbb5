//! Typed event bus for inter-component communication.
//!
//! Replaces the legacy broadcast-style global listener registry with one
//! explicit channel owned by the engine. Components publish
//! [`MarketplaceEvent`]s after their writes commit; dashboards and
//! secondary services subscribe and react to the resolved canonical state
//! carried on the event.

use mealflow_types::MarketplaceEvent;
use tokio::sync::broadcast;

/// Default buffered capacity before slow subscribers start lagging.
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast channel for marketplace events.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<MarketplaceEvent>,
}

impl EventBus {
	/// Creates an event bus with the given buffer capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns the number of receivers the event reached; an error means
	/// no subscriber is listening, which publishers are free to ignore.
	pub fn publish(
		&self,
		event: MarketplaceEvent,
	) -> Result<usize, broadcast::error::SendError<MarketplaceEvent>> {
		self.sender.send(event)
	}

	/// Opens a new subscription on the bus.
	pub fn subscribe(&self) -> broadcast::Receiver<MarketplaceEvent> {
		self.sender.subscribe()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use mealflow_types::{MarketplaceEvent, ScheduleEvent};

	#[tokio::test]
	async fn subscribers_receive_published_events() {
		let bus = EventBus::default();
		let mut receiver = bus.subscribe();

		bus.publish(MarketplaceEvent::Schedule(ScheduleEvent::Promoted {
			order_id: "o1".into(),
		}))
		.unwrap();

		let event = receiver.recv().await.unwrap();
		assert!(matches!(
			event,
			MarketplaceEvent::Schedule(ScheduleEvent::Promoted { order_id }) if order_id == "o1"
		));
	}

	#[test]
	fn publish_without_subscribers_is_not_fatal() {
		let bus = EventBus::default();
		let result = bus.publish(MarketplaceEvent::Schedule(ScheduleEvent::Deferred {
			order_id: "o1".into(),
		}));
		assert!(result.is_err());
	}
}
