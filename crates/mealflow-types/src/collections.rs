//! Store collection names for the persisted tree layout.

use std::str::FromStr;

/// Top-level collections in the shared document tree.
///
/// This enum provides type safety for store operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
	/// Live orders at `orders/{orderId}`.
	Orders,
	/// Orders awaiting promotion at `scheduled_orders/{orderId}`.
	ScheduledOrders,
	/// Driver records at `drivers/{driverId}`.
	Drivers,
	/// Restaurant records at `restaurants/{restaurantId}`.
	Restaurants,
	/// Notification fan-out at `notifications/{recipientId}/{id}`.
	Notifications,
}

impl Collection {
	/// Returns the string representation of the collection.
	pub fn as_str(&self) -> &'static str {
		match self {
			Collection::Orders => "orders",
			Collection::ScheduledOrders => "scheduled_orders",
			Collection::Drivers => "drivers",
			Collection::Restaurants => "restaurants",
			Collection::Notifications => "notifications",
		}
	}

	/// Returns an iterator over all Collection variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::ScheduledOrders,
			Self::Drivers,
			Self::Restaurants,
			Self::Notifications,
		]
		.into_iter()
	}
}

impl FromStr for Collection {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"scheduled_orders" => Ok(Self::ScheduledOrders),
			"drivers" => Ok(Self::Drivers),
			"restaurants" => Ok(Self::Restaurants),
			"notifications" => Ok(Self::Notifications),
			_ => Err(()),
		}
	}
}

impl From<Collection> for &'static str {
	fn from(collection: Collection) -> Self {
		collection.as_str()
	}
}
