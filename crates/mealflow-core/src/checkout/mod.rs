//! Order placement.
//!
//! Builds the quote, charges the payment gateway, and only then writes
//! the order record. A declined or failed charge means no record is ever
//! created. Orders against a closed restaurant must carry a schedule time
//! and are written to the holding collection instead of the live one.

use crate::engine::event_bus::EventBus;
use mealflow_gateways::{PaymentError, PaymentService};
use mealflow_pricing::{PricingEngine, QuoteError, QuoteWarning, TipPercentage};
use mealflow_store::{server_timestamp, StoreError, StorePath, StoreService};
use mealflow_types::{
	truncate_id, Address, Collection, DeliveryOption, Financials, LineItem, MarketplaceEvent,
	Order, OrderEvent, OrderRecord, OrderStatus, Restaurant,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
	#[error("Restaurant not found: {0}")]
	RestaurantNotFound(String),
	/// The restaurant is closed and no schedule time was provided.
	#[error("Restaurant {0} is closed")]
	RestaurantClosed(String),
	#[error("Cart is empty")]
	EmptyCart,
	#[error("Delivery requested without an address")]
	MissingAddress,
	#[error("Unsupported tip percentage: {0}")]
	UnsupportedTip(u32),
	#[error("Payment declined: {0}")]
	PaymentDeclined(String),
	#[error("Payment failed: {0}")]
	PaymentFailed(String),
	#[error("Store error: {0}")]
	Store(String),
}

/// One cart line in a checkout request.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
	pub id: String,
	pub name: String,
	pub price: Decimal,
	pub quantity: u32,
	#[serde(default)]
	pub customizations: HashMap<String, Vec<String>>,
}

/// A checkout request from the customer flow.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
	pub customer_id: String,
	pub restaurant_id: String,
	pub items: Vec<CartItem>,
	pub delivery_option: DeliveryOption,
	#[serde(default)]
	pub address: Option<Address>,
	#[serde(default)]
	pub tip_percentage: u32,
	/// Requested promotion time (unix millis) for orders placed while the
	/// restaurant is closed.
	#[serde(default)]
	pub scheduled_for: Option<u64>,
}

/// Result of a successful checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
	pub order: Order,
	pub payment_intent_id: String,
	/// Non-fatal pricing degradations, surfaced to the customer.
	pub warnings: Vec<QuoteWarning>,
	/// True when the order went to the scheduled holding collection.
	pub scheduled: bool,
}

/// Places orders on behalf of customers.
pub struct CheckoutService {
	store: Arc<StoreService>,
	pricing: Arc<PricingEngine>,
	payment: Arc<PaymentService>,
	event_bus: EventBus,
}

impl CheckoutService {
	pub fn new(
		store: Arc<StoreService>,
		pricing: Arc<PricingEngine>,
		payment: Arc<PaymentService>,
		event_bus: EventBus,
	) -> Self {
		Self {
			store,
			pricing,
			payment,
			event_bus,
		}
	}

	/// Prices, charges and persists a new order.
	#[instrument(skip_all, fields(customer_id = %request.customer_id, restaurant_id = %request.restaurant_id))]
	pub async fn place(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, CheckoutError> {
		let restaurant: Restaurant = self
			.store
			.retrieve(Collection::Restaurants, &request.restaurant_id)
			.await
			.map_err(|e| match e {
				StoreError::NotFound => {
					CheckoutError::RestaurantNotFound(request.restaurant_id.clone())
				},
				other => CheckoutError::Store(other.to_string()),
			})?;

		// A closed restaurant only takes scheduled orders. Decided before
		// the charge so no payment is taken for an unplaceable order.
		let scheduled = if restaurant.is_open {
			false
		} else if request.scheduled_for.is_some() {
			true
		} else {
			return Err(CheckoutError::RestaurantClosed(restaurant.id.clone()));
		};

		let items: Vec<LineItem> = request
			.items
			.iter()
			.map(|item| LineItem {
				id: item.id.clone(),
				name: item.name.clone(),
				price: item.price,
				quantity: item.quantity,
				customizations: item.customizations.clone(),
				line_total: item.price * Decimal::from(item.quantity),
			})
			.collect();

		let tip = TipPercentage::try_from(request.tip_percentage)
			.map_err(|_| CheckoutError::UnsupportedTip(request.tip_percentage))?;

		let quote = self
			.pricing
			.quote(
				&items,
				&restaurant,
				request.delivery_option,
				request.address.as_ref(),
				tip,
			)
			.await
			.map_err(|e| match e {
				QuoteError::EmptyCart => CheckoutError::EmptyCart,
				QuoteError::MissingAddress => CheckoutError::MissingAddress,
				QuoteError::UnsupportedTip(t) => CheckoutError::UnsupportedTip(t),
			})?;

		let intent = self
			.payment
			.charge(&request.customer_id, quote.financials.total)
			.await
			.map_err(|e| match e {
				PaymentError::Declined(reason) => CheckoutError::PaymentDeclined(reason),
				other => CheckoutError::PaymentFailed(other.to_string()),
			})?;

		let order_id = uuid::Uuid::new_v4().to_string();
		let order = self
			.write_order(&order_id, &request, items, quote.financials, scheduled)
			.await?;

		tracing::info!(
			order_id = %truncate_id(&order_id),
			total = %order.financials.total,
			scheduled,
			"Order placed"
		);

		let event = if scheduled {
			OrderEvent::Scheduled {
				order: order.clone(),
			}
		} else {
			OrderEvent::Placed {
				order: order.clone(),
			}
		};
		self.event_bus.publish(MarketplaceEvent::Order(event)).ok();

		Ok(CheckoutReceipt {
			order,
			payment_intent_id: intent.id,
			warnings: quote.warnings,
			scheduled,
		})
	}

	/// Writes the record with server-stamped timestamps and reads it back
	/// decoded.
	async fn write_order(
		&self,
		order_id: &str,
		request: &CheckoutRequest,
		items: Vec<LineItem>,
		financials: Financials,
		scheduled: bool,
	) -> Result<Order, CheckoutError> {
		let order = Order {
			id: order_id.to_string(),
			customer_id: request.customer_id.clone(),
			restaurant_id: request.restaurant_id.clone(),
			driver_id: None,
			status: OrderStatus::Pending,
			financials,
			delivery_option: request.delivery_option,
			address: request.address.clone(),
			scheduled_for: if scheduled { request.scheduled_for } else { None },
			is_scheduled: scheduled,
			items,
			created_at: 0,
			updated_at: 0,
		};

		let collection = if scheduled {
			Collection::ScheduledOrders
		} else {
			Collection::Orders
		};

		let mut value = serde_json::to_value(OrderRecord::from(&order))
			.map_err(|e| CheckoutError::Store(e.to_string()))?;
		value["createdAt"] = server_timestamp();
		value["updatedAt"] = server_timestamp();

		self.store
			.backend()
			.set(&StorePath::document(collection, order_id), value)
			.await
			.map_err(|e| CheckoutError::Store(e.to_string()))?;

		let record: OrderRecord = self
			.store
			.retrieve(collection, order_id)
			.await
			.map_err(|e| CheckoutError::Store(e.to_string()))?;
		record
			.decode(order_id)
			.map_err(|e| CheckoutError::Store(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil;
	use mealflow_gateways::geocode::implementations::table::TableGeocoder;
	use mealflow_gateways::payment::implementations::flat::FlatPayment;
	use mealflow_gateways::GeocodeService;
	use rust_decimal_macros::dec;

	fn service(
		store: &Arc<StoreService>,
		bus: &EventBus,
		decline_over: Option<Decimal>,
	) -> CheckoutService {
		let geocode = Arc::new(GeocodeService::new(Box::new(TableGeocoder::new(
			HashMap::new(),
		))));
		let pricing = Arc::new(PricingEngine::new(geocode, dec!(1.50)));
		let payment = Arc::new(PaymentService::new(Box::new(FlatPayment::new(
			decline_over,
		))));
		CheckoutService::new(store.clone(), pricing, payment, bus.clone())
	}

	fn request(scheduled_for: Option<u64>) -> CheckoutRequest {
		CheckoutRequest {
			customer_id: "c1".into(),
			restaurant_id: "r1".into(),
			items: vec![CartItem {
				id: "i1".into(),
				name: "Pho".into(),
				price: dec!(20.00),
				quantity: 2,
				customizations: HashMap::new(),
			}],
			delivery_option: DeliveryOption::Pickup,
			address: None,
			tip_percentage: 15,
			scheduled_for,
		}
	}

	#[tokio::test]
	async fn open_restaurant_order_lands_pending_with_receipt() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_restaurant(&store, "r1", true, Some(10)).await;
		let checkout = service(&store, &bus, None);

		let receipt = checkout.place(request(None)).await.unwrap();
		assert!(!receipt.scheduled);
		assert_eq!(receipt.order.status, OrderStatus::Pending);
		assert_eq!(receipt.order.financials.subtotal, dec!(40.00));
		assert_eq!(receipt.order.financials.discount_amount, dec!(4.00));
		assert_eq!(receipt.order.financials.tip_amount, dec!(5.40));
		assert_eq!(receipt.order.financials.total, dec!(41.40));
		assert!(receipt.order.created_at > 0);
		assert!(receipt.payment_intent_id.starts_with("pi_"));
	}

	#[tokio::test]
	async fn declined_payment_writes_no_record() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_restaurant(&store, "r1", true, None).await;
		let checkout = service(&store, &bus, Some(dec!(1.00)));

		let err = checkout.place(request(None)).await.unwrap_err();
		assert!(matches!(err, CheckoutError::PaymentDeclined(_)));

		let orders: Vec<(String, OrderRecord)> =
			store.list(Collection::Orders).await.unwrap();
		assert!(orders.is_empty());
	}

	#[tokio::test]
	async fn closed_restaurant_requires_schedule_time() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_restaurant(&store, "r1", false, None).await;
		let checkout = service(&store, &bus, None);

		let err = checkout.place(request(None)).await.unwrap_err();
		assert!(matches!(err, CheckoutError::RestaurantClosed(_)));
	}

	#[tokio::test]
	async fn closed_restaurant_with_schedule_goes_to_holding_collection() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_restaurant(&store, "r1", false, None).await;
		let checkout = service(&store, &bus, None);

		let receipt = checkout
			.place(request(Some(1_900_000_000_000)))
			.await
			.unwrap();
		assert!(receipt.scheduled);
		assert!(receipt.order.is_scheduled);

		let scheduled: Vec<(String, OrderRecord)> =
			store.list(Collection::ScheduledOrders).await.unwrap();
		assert_eq!(scheduled.len(), 1);
		let live: Vec<(String, OrderRecord)> = store.list(Collection::Orders).await.unwrap();
		assert!(live.is_empty());
	}

	#[tokio::test]
	async fn empty_cart_is_rejected() {
		let (store, bus) = testutil::store_and_bus();
		testutil::seed_restaurant(&store, "r1", true, None).await;
		let checkout = service(&store, &bus, None);

		let mut req = request(None);
		req.items.clear();
		let err = checkout.place(req).await.unwrap_err();
		assert!(matches!(err, CheckoutError::EmptyCart));
	}
}
