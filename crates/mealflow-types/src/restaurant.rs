//! Restaurant records.

use crate::GeoPoint;
use serde::{Deserialize, Serialize};

/// Posted opening hours. Informational; `is_open` is the authoritative
/// flag and the restaurant may flip it at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningHours {
	pub opens: String,
	pub closes: String,
}

/// A restaurant as persisted at `restaurants/{restaurantId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
	pub id: String,
	pub name: String,
	/// Independently mutable by the restaurant actor at any time.
	#[serde(default)]
	pub is_open: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hours: Option<OpeningHours>,
	/// Positive integer discount percentage, when the restaurant runs one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub discount: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub location: Option<GeoPoint>,
	/// Free-form address string, geocode fallback when `location` is unset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
}

impl Restaurant {
	/// Discount percentage with the missing field normalized to zero.
	pub fn discount_percentage(&self) -> u32 {
		self.discount.unwrap_or(0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_discount_is_zero() {
		let json = r#"{"id":"r1","name":"Noodle Bar","isOpen":true}"#;
		let restaurant: Restaurant = serde_json::from_str(json).unwrap();
		assert_eq!(restaurant.discount_percentage(), 0);
	}
}
