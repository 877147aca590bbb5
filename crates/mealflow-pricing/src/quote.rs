//! Checkout quote computation.
//!
//! All money math runs in `Decimal` and is rounded half-up to two places
//! at each boundary value. The resulting [`Quote`] is frozen into the
//! order record verbatim; later discount changes at the restaurant never
//! alter a historical receipt.

use crate::distance::haversine_km;
use mealflow_gateways::GeocodeService;
use mealflow_types::{Address, DeliveryOption, Financials, GeoPoint, LineItem, Restaurant};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Errors that make a quote impossible.
#[derive(Debug, Error)]
pub enum QuoteError {
	/// A delivery order with no address at all cannot be priced or
	/// fulfilled.
	#[error("Delivery requested without an address")]
	MissingAddress,
	/// The cart has no lines.
	#[error("Cart is empty")]
	EmptyCart,
	/// The requested tip percentage is not one of the offered options.
	#[error("Unsupported tip percentage: {0}")]
	UnsupportedTip(u32),
}

/// Non-fatal degradations carried on the quote and surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuoteWarning {
	/// Coordinates could not be resolved; the delivery fee degraded to
	/// zero rather than blocking checkout.
	FeeUnavailable { reason: String },
}

/// Tip options offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TipPercentage {
	Zero,
	Ten,
	Fifteen,
	Twenty,
	TwentyFive,
}

impl TipPercentage {
	pub fn as_u32(self) -> u32 {
		match self {
			TipPercentage::Zero => 0,
			TipPercentage::Ten => 10,
			TipPercentage::Fifteen => 15,
			TipPercentage::Twenty => 20,
			TipPercentage::TwentyFive => 25,
		}
	}
}

impl TryFrom<u32> for TipPercentage {
	type Error = QuoteError;

	fn try_from(value: u32) -> Result<Self, Self::Error> {
		match value {
			0 => Ok(TipPercentage::Zero),
			10 => Ok(TipPercentage::Ten),
			15 => Ok(TipPercentage::Fifteen),
			20 => Ok(TipPercentage::Twenty),
			25 => Ok(TipPercentage::TwentyFive),
			other => Err(QuoteError::UnsupportedTip(other)),
		}
	}
}

/// A priced cart, ready to be frozen into an order.
#[derive(Debug, Clone)]
pub struct Quote {
	pub financials: Financials,
	pub warnings: Vec<QuoteWarning>,
}

/// Computes checkout quotes.
pub struct PricingEngine {
	geocode: Arc<GeocodeService>,
	rate_per_km: Decimal,
}

impl PricingEngine {
	pub fn new(geocode: Arc<GeocodeService>, rate_per_km: Decimal) -> Self {
		Self {
			geocode,
			rate_per_km,
		}
	}

	/// Prices a cart against a restaurant.
	///
	/// The delivery fee is haversine distance times the per-km rate.
	/// Coordinates resolve restaurant-record-first, then geocode
	/// fallbacks; any failure yields a zero fee plus a warning instead of
	/// an error.
	pub async fn quote(
		&self,
		items: &[LineItem],
		restaurant: &Restaurant,
		delivery_option: DeliveryOption,
		address: Option<&Address>,
		tip: TipPercentage,
	) -> Result<Quote, QuoteError> {
		if items.is_empty() {
			return Err(QuoteError::EmptyCart);
		}

		let mut warnings = Vec::new();
		let delivery_fee = match delivery_option {
			DeliveryOption::Pickup => Decimal::ZERO,
			DeliveryOption::Delivery => {
				let address = address.ok_or(QuoteError::MissingAddress)?;
				match self.resolve_distance_km(restaurant, address).await {
					Ok(km) => self.fee_for_distance(km),
					Err(reason) => {
						tracing::warn!(restaurant_id = %restaurant.id, reason = %reason, "Delivery fee unavailable, degrading to zero");
						warnings.push(QuoteWarning::FeeUnavailable { reason });
						Decimal::ZERO
					},
				}
			},
		};

		let financials = build_financials(
			items,
			restaurant.discount_percentage(),
			tip,
			delivery_fee,
			delivery_option,
		);

		Ok(Quote {
			financials,
			warnings,
		})
	}

	/// Delivery fee for a resolved distance, rounded to cents.
	pub fn fee_for_distance(&self, km: f64) -> Decimal {
		let km = Decimal::from_f64(km).unwrap_or(Decimal::ZERO);
		round_money(km * self.rate_per_km)
	}

	/// Resolves restaurant and customer coordinates, falling back to the
	/// geocoder, and returns the haversine distance between them.
	async fn resolve_distance_km(
		&self,
		restaurant: &Restaurant,
		address: &Address,
	) -> Result<f64, String> {
		let restaurant_point = match restaurant.location {
			Some(point) => point,
			None => {
				let stored = restaurant
					.address
					.as_deref()
					.ok_or_else(|| "Restaurant has no coordinates or address".to_string())?;
				self.geocode
					.geocode(stored)
					.await
					.map_err(|e| format!("Restaurant address: {}", e))?
			},
		};

		let customer_point = match (address.latitude, address.longitude) {
			(Some(latitude), Some(longitude)) => GeoPoint::new(latitude, longitude),
			_ => self
				.geocode
				.geocode(&address.street)
				.await
				.map_err(|e| format!("Customer address: {}", e))?,
		};

		Ok(haversine_km(restaurant_point, customer_point))
	}
}

/// Builds the financial receipt from its resolved inputs.
///
/// `total = subtotal_after_discount + tip + (fee if delivery)`.
pub fn build_financials(
	items: &[LineItem],
	discount_percentage: u32,
	tip: TipPercentage,
	delivery_fee: Decimal,
	delivery_option: DeliveryOption,
) -> Financials {
	let subtotal: Decimal = items.iter().map(LineItem::computed_total).sum();
	let subtotal = round_money(subtotal);

	let discount_amount = round_money(subtotal * Decimal::from(discount_percentage) / Decimal::ONE_HUNDRED);
	let after_discount = subtotal - discount_amount;

	let tip_amount = round_money(after_discount * Decimal::from(tip.as_u32()) / Decimal::ONE_HUNDRED);

	let delivery_fee = match delivery_option {
		DeliveryOption::Delivery => round_money(delivery_fee),
		DeliveryOption::Pickup => Decimal::ZERO,
	};

	Financials {
		subtotal,
		discount_percentage,
		discount_amount,
		tip_percentage: tip.as_u32(),
		tip_amount,
		delivery_fee,
		total: round_money(after_discount + tip_amount + delivery_fee),
	}
}

fn round_money(value: Decimal) -> Decimal {
	value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
