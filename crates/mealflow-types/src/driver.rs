//! Driver records and the availability board.
//!
//! Drivers carry a back-reference to their current order. The invariant is
//! bidirectional: `current_order_id` set implies `is_available == false`
//! and the referenced order's `driver_id` equals this driver's id. A
//! violation is recoverable corruption repaired by the dispatch manager,
//! never surfaced as an error.

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Document/approval status resolved for a driver.
///
/// Drivers whose stored approval value is missing or unrecognized are
/// excluded from the dispatch board entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverApproval {
	Approved,
	Pending,
	Suspended,
}

impl FromStr for DriverApproval {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"approved" => Ok(Self::Approved),
			"pending" => Ok(Self::Pending),
			"suspended" => Ok(Self::Suspended),
			_ => Err(()),
		}
	}
}

/// Tolerant decode: unknown or non-string approval values become `None`
/// rather than failing the whole driver record.
fn approval_lenient<'de, D>(deserializer: D) -> Result<Option<DriverApproval>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
	Ok(raw
		.as_ref()
		.and_then(|v| v.as_str())
		.and_then(|s| s.parse().ok()))
}

/// A delivery driver as persisted at `drivers/{driverId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub phone: String,
	#[serde(default)]
	pub rating: f64,
	#[serde(default)]
	pub completed_deliveries: u64,
	#[serde(default)]
	pub is_available: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub current_order_id: Option<String>,
	#[serde(default, deserialize_with = "approval_lenient")]
	pub approval: Option<DriverApproval>,
}

impl Driver {
	/// A driver is assignable when marked available and not linked to an
	/// order.
	pub fn is_free(&self) -> bool {
		self.is_available && self.current_order_id.is_none()
	}
}

/// Drivers partitioned for the dispatcher, each side sorted by rating
/// descending.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriverBoard {
	pub available: Vec<Driver>,
	pub busy: Vec<Driver>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unknown_approval_decodes_to_none() {
		let json = r#"{"id":"d1","name":"Sam","approval":"verified-maybe"}"#;
		let driver: Driver = serde_json::from_str(json).unwrap();
		assert_eq!(driver.approval, None);

		let json = r#"{"id":"d2","name":"Kim","approval":"approved"}"#;
		let driver: Driver = serde_json::from_str(json).unwrap();
		assert_eq!(driver.approval, Some(DriverApproval::Approved));
	}

	#[test]
	fn free_requires_available_and_unlinked() {
		let json = r#"{"id":"d1","name":"Sam","isAvailable":true}"#;
		let driver: Driver = serde_json::from_str(json).unwrap();
		assert!(driver.is_free());

		let json = r#"{"id":"d1","name":"Sam","isAvailable":true,"currentOrderId":"o1"}"#;
		let driver: Driver = serde_json::from_str(json).unwrap();
		assert!(!driver.is_free());
	}
}
