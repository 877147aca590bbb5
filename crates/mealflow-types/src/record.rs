//! Wire-format order records and the legacy status decoder.
//!
//! The shared store keeps orders in a loosely-typed shape written by
//! several generations of clients: money values are JSON floats, two
//! redundant status fields (`status` coarse, `orderStatus` fine) encode the
//! lifecycle stage, and older records omit fields freely. This module owns
//! the mapping between that shape and the strongly-typed [`Order`] with its
//! canonical [`OrderStatus`] enum. Nothing outside this module reads or
//! writes the legacy field pair.

use crate::{
	Address, DeliveryOption, Financials, LineItem, Order, OrderStatus, PrepStage, ProgressStage,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors produced while decoding a stored record into an [`Order`].
#[derive(Debug, Error)]
pub enum DecodeError {
	/// A field without which the record is unusable is absent.
	#[error("Missing required field: {0}")]
	MissingField(&'static str),
	/// The status field pair does not map to any canonical status.
	#[error("Unknown status combination: status={coarse:?}, orderStatus={fine:?}")]
	UnknownStatus {
		coarse: Option<String>,
		fine: Option<String>,
	},
	/// A money field holds a value Decimal cannot represent.
	#[error("Invalid money value in field {0}")]
	InvalidMoney(&'static str),
}

/// A cart line as stored, tolerant of missing legacy fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRecord {
	#[serde(default)]
	pub id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub price: f64,
	#[serde(default = "default_quantity")]
	pub quantity: u32,
	#[serde(default)]
	pub customizations: HashMap<String, Vec<String>>,
	/// Stored for older readers; ignored on decode and recomputed as
	/// price x quantity.
	#[serde(default)]
	pub line_total: f64,
}

fn default_quantity() -> u32 {
	1
}

/// An order as stored at `orders/{orderId}` or `scheduled_orders/{orderId}`.
///
/// Every field is optional or defaulted; [`OrderRecord::decode`] decides
/// which absences are fatal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub customer_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub restaurant_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub driver_id: Option<String>,
	/// Coarse lifecycle stage, the authoritative field when the fine
	/// signal is absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
	/// Fine-grained secondary signal, advisory context for the coarse
	/// stage.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub order_status: Option<String>,
	#[serde(default)]
	pub subtotal: f64,
	#[serde(default)]
	pub discount_percentage: u32,
	#[serde(default)]
	pub discount_amount: f64,
	#[serde(default)]
	pub tip_percentage: u32,
	#[serde(default)]
	pub tip_amount: f64,
	#[serde(default)]
	pub delivery_fee: f64,
	#[serde(default)]
	pub total: f64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub delivery_option: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address: Option<Address>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scheduled_for: Option<u64>,
	#[serde(default)]
	pub is_scheduled: bool,
	#[serde(default)]
	pub items: Vec<LineItemRecord>,
	#[serde(default)]
	pub created_at: u64,
	#[serde(default)]
	pub updated_at: u64,
}

impl OrderRecord {
	/// Decodes a stored record into a strongly-typed [`Order`].
	///
	/// `order_id` is the path segment the record was read from; it wins
	/// over any embedded id. Missing party ids are fatal, everything else
	/// falls back to a usable default.
	pub fn decode(self, order_id: &str) -> Result<Order, DecodeError> {
		let customer_id = self
			.customer_id
			.ok_or(DecodeError::MissingField("customerId"))?;
		let restaurant_id = self
			.restaurant_id
			.ok_or(DecodeError::MissingField("restaurantId"))?;

		let status = decode_status(self.status.as_deref(), self.order_status.as_deref())
			.ok_or_else(|| DecodeError::UnknownStatus {
				coarse: self.status.clone(),
				fine: self.order_status.clone(),
			})?;

		let delivery_option = match self.delivery_option.as_deref() {
			Some("pickup") => DeliveryOption::Pickup,
			Some(_) => DeliveryOption::Delivery,
			// Legacy records omit the field; infer from address presence.
			None if self.address.is_some() => DeliveryOption::Delivery,
			None => DeliveryOption::Pickup,
		};

		let items = self
			.items
			.into_iter()
			.map(|item| -> Result<LineItem, DecodeError> {
				let price = money_from_f64(item.price, "items.price")?;
				let quantity = item.quantity;
				Ok(LineItem {
					line_total: price * Decimal::from(quantity),
					id: item.id,
					name: item.name,
					price,
					quantity,
					customizations: item.customizations,
				})
			})
			.collect::<Result<Vec<_>, DecodeError>>()?;

		let financials = Financials {
			subtotal: money_from_f64(self.subtotal, "subtotal")?,
			discount_percentage: self.discount_percentage,
			discount_amount: money_from_f64(self.discount_amount, "discountAmount")?,
			tip_percentage: self.tip_percentage,
			tip_amount: money_from_f64(self.tip_amount, "tipAmount")?,
			delivery_fee: money_from_f64(self.delivery_fee, "deliveryFee")?,
			total: money_from_f64(self.total, "total")?,
		};

		Ok(Order {
			id: order_id.to_string(),
			customer_id,
			restaurant_id,
			driver_id: self.driver_id,
			status,
			financials,
			delivery_option,
			address: self.address,
			scheduled_for: self.scheduled_for,
			is_scheduled: self.is_scheduled,
			items,
			created_at: self.created_at,
			updated_at: self.updated_at,
		})
	}
}

impl From<&Order> for OrderRecord {
	fn from(order: &Order) -> Self {
		let (coarse, fine) = encode_status(order.status);
		OrderRecord {
			id: Some(order.id.clone()),
			customer_id: Some(order.customer_id.clone()),
			restaurant_id: Some(order.restaurant_id.clone()),
			driver_id: order.driver_id.clone(),
			status: Some(coarse.to_string()),
			order_status: fine.map(str::to_string),
			subtotal: money_to_f64(order.financials.subtotal),
			discount_percentage: order.financials.discount_percentage,
			discount_amount: money_to_f64(order.financials.discount_amount),
			tip_percentage: order.financials.tip_percentage,
			tip_amount: money_to_f64(order.financials.tip_amount),
			delivery_fee: money_to_f64(order.financials.delivery_fee),
			total: money_to_f64(order.financials.total),
			delivery_option: Some(
				match order.delivery_option {
					DeliveryOption::Delivery => "delivery",
					DeliveryOption::Pickup => "pickup",
				}
				.to_string(),
			),
			address: order.address.clone(),
			scheduled_for: order.scheduled_for,
			is_scheduled: order.is_scheduled,
			items: order
				.items
				.iter()
				.map(|item| LineItemRecord {
					id: item.id.clone(),
					name: item.name.clone(),
					price: money_to_f64(item.price),
					quantity: item.quantity,
					customizations: item.customizations.clone(),
					line_total: money_to_f64(item.line_total),
				})
				.collect(),
			created_at: order.created_at,
			updated_at: order.updated_at,
		}
	}
}

/// Resolves the legacy field pair into the canonical status.
///
/// Absent `orderStatus` means the coarse field is authoritative. A bare
/// `in_progress` without the `accepted` signal resolves to
/// `InProgress(Placed)`: the restaurant has not acted yet and the order is
/// not actionable in restaurant views. Inconsistent fine values are
/// dominated by the coarse stage rather than rejected.
pub fn decode_status(coarse: Option<&str>, fine: Option<&str>) -> Option<OrderStatus> {
	match coarse? {
		"pending" => Some(OrderStatus::Pending),
		"in_progress" => match fine {
			Some("accepted") => Some(OrderStatus::InProgress(ProgressStage::Accepted)),
			_ => Some(OrderStatus::InProgress(ProgressStage::Placed)),
		},
		"assigned_driver" => match fine {
			Some("ready_for_pickup") => {
				Some(OrderStatus::AssignedDriver(PrepStage::ReadyForPickup))
			},
			_ => Some(OrderStatus::AssignedDriver(PrepStage::Preparing)),
		},
		"picked_up" => Some(OrderStatus::PickedUp),
		"delivered" => Some(OrderStatus::Delivered),
		"rejected" => Some(OrderStatus::Rejected),
		_ => None,
	}
}

/// Splits the canonical status back into the legacy field pair.
pub fn encode_status(status: OrderStatus) -> (&'static str, Option<&'static str>) {
	match status {
		OrderStatus::Pending => ("pending", None),
		OrderStatus::InProgress(ProgressStage::Placed) => ("in_progress", None),
		OrderStatus::InProgress(ProgressStage::Accepted) => ("in_progress", Some("accepted")),
		OrderStatus::AssignedDriver(PrepStage::Preparing) => ("assigned_driver", Some("preparing")),
		OrderStatus::AssignedDriver(PrepStage::ReadyForPickup) => {
			("assigned_driver", Some("ready_for_pickup"))
		},
		OrderStatus::PickedUp => ("picked_up", Some("picked_up")),
		OrderStatus::Delivered => ("delivered", Some("delivered")),
		OrderStatus::Rejected => ("rejected", None),
	}
}

/// Both legacy status fields as merge-update entries.
///
/// A `None` fine status maps to JSON null, which the store's merge
/// semantics treat as a field removal. Transitions write exactly these
/// fields in one atomic update so no reader observes a torn pair.
pub fn status_fields(status: OrderStatus) -> Vec<(String, Value)> {
	let (coarse, fine) = encode_status(status);
	vec![
		("status".to_string(), Value::String(coarse.to_string())),
		(
			"orderStatus".to_string(),
			fine.map(|f| Value::String(f.to_string()))
				.unwrap_or(Value::Null),
		),
	]
}

fn money_from_f64(value: f64, field: &'static str) -> Result<Decimal, DecodeError> {
	Decimal::from_f64(value)
		.map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
		.ok_or(DecodeError::InvalidMoney(field))
}

fn money_to_f64(value: Decimal) -> f64 {
	use rust_decimal::prelude::ToPrimitive;
	value
		.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
		.to_f64()
		.unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	fn base_record() -> OrderRecord {
		OrderRecord {
			customer_id: Some("c1".into()),
			restaurant_id: Some("r1".into()),
			status: Some("pending".into()),
			..Default::default()
		}
	}

	#[test]
	fn bare_in_progress_decodes_to_placed() {
		let status = decode_status(Some("in_progress"), None).unwrap();
		assert_eq!(status, OrderStatus::InProgress(ProgressStage::Placed));
		assert!(!status.is_in_progress_view());

		let status = decode_status(Some("in_progress"), Some("accepted")).unwrap();
		assert_eq!(status, OrderStatus::InProgress(ProgressStage::Accepted));
		assert!(status.is_in_progress_view());
	}

	#[test]
	fn coarse_field_dominates_inconsistent_fine() {
		// A stale fine value from a racing legacy writer must not reject
		// the record.
		let status = decode_status(Some("picked_up"), Some("preparing")).unwrap();
		assert_eq!(status, OrderStatus::PickedUp);

		let status = decode_status(Some("assigned_driver"), Some("accepted")).unwrap();
		assert_eq!(status, OrderStatus::AssignedDriver(PrepStage::Preparing));
	}

	#[test]
	fn unknown_coarse_status_fails_decode() {
		let mut record = base_record();
		record.status = Some("enroute".into());
		let err = record.decode("o1").unwrap_err();
		assert!(matches!(err, DecodeError::UnknownStatus { .. }));
	}

	#[test]
	fn missing_party_id_fails_decode() {
		let mut record = base_record();
		record.customer_id = None;
		let err = record.decode("o1").unwrap_err();
		assert!(matches!(err, DecodeError::MissingField("customerId")));
	}

	#[test]
	fn line_totals_recomputed_from_price_and_quantity() {
		let mut record = base_record();
		record.items = vec![LineItemRecord {
			id: "i1".into(),
			name: "Ramen".into(),
			price: 11.25,
			quantity: 2,
			// A legacy writer stored a wrong total; decode ignores it.
			line_total: 99.99,
			..Default::default()
		}];
		let order = record.decode("o1").unwrap();
		assert_eq!(order.items[0].line_total, dec!(22.50));
	}

	#[test]
	fn delivery_option_inferred_from_address() {
		let mut record = base_record();
		record.address = Some(Address {
			street: "1 Main St".into(),
			unit: None,
			instructions: None,
			latitude: None,
			longitude: None,
		});
		let order = record.decode("o1").unwrap();
		assert_eq!(order.delivery_option, DeliveryOption::Delivery);

		let order = base_record().decode("o2").unwrap();
		assert_eq!(order.delivery_option, DeliveryOption::Pickup);
	}

	#[test]
	fn status_round_trips_through_field_pair() {
		for status in [
			OrderStatus::Pending,
			OrderStatus::InProgress(ProgressStage::Accepted),
			OrderStatus::AssignedDriver(PrepStage::Preparing),
			OrderStatus::AssignedDriver(PrepStage::ReadyForPickup),
			OrderStatus::PickedUp,
			OrderStatus::Delivered,
			OrderStatus::Rejected,
		] {
			let (coarse, fine) = encode_status(status);
			assert_eq!(decode_status(Some(coarse), fine), Some(status));
		}
	}

	#[test]
	fn status_fields_clear_absent_fine_status() {
		let fields = status_fields(OrderStatus::Rejected);
		assert_eq!(fields[0].1, Value::String("rejected".into()));
		assert_eq!(fields[1].1, Value::Null);
	}
}
