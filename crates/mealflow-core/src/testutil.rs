//! Shared fixtures for the crate's tests.
//!
//! Everything runs against the in-memory store backend; the seeded
//! records use the legacy wire shape so the decode path is exercised the
//! same way it is in production.

use crate::engine::event_bus::EventBus;
use mealflow_store::implementations::memory::MemoryStore;
use mealflow_store::StoreService;
use mealflow_types::{
	now_millis, record::encode_status, Collection, Driver, DriverApproval, GeoPoint, OrderRecord,
	OrderStatus, Restaurant,
};
use std::sync::Arc;

pub fn store_and_bus() -> (Arc<StoreService>, EventBus) {
	(
		Arc::new(StoreService::new(Box::new(MemoryStore::new()))),
		EventBus::default(),
	)
}

/// Seeds an order owned by customer `c1` at restaurant `r1`.
pub async fn seed_order(
	store: &Arc<StoreService>,
	id: &str,
	status: OrderStatus,
	driver_id: Option<&str>,
) {
	seed_order_in(store, Collection::Orders, id, status, driver_id, None).await;
}

/// Seeds an order into an arbitrary collection, optionally scheduled.
pub async fn seed_order_in(
	store: &Arc<StoreService>,
	collection: Collection,
	id: &str,
	status: OrderStatus,
	driver_id: Option<&str>,
	scheduled_for: Option<u64>,
) {
	let (coarse, fine) = encode_status(status);
	let record = OrderRecord {
		id: Some(id.to_string()),
		customer_id: Some("c1".to_string()),
		restaurant_id: Some("r1".to_string()),
		driver_id: driver_id.map(str::to_string),
		status: Some(coarse.to_string()),
		order_status: fine.map(str::to_string),
		subtotal: 20.0,
		total: 20.0,
		scheduled_for,
		is_scheduled: scheduled_for.is_some(),
		created_at: now_millis(),
		updated_at: now_millis(),
		..Default::default()
	};
	store.store(collection, id, &record).await.unwrap();
}

pub async fn seed_driver(
	store: &Arc<StoreService>,
	id: &str,
	rating: f64,
	current_order_id: Option<&str>,
	approval: Option<DriverApproval>,
) {
	let driver = Driver {
		id: id.to_string(),
		name: format!("Driver {}", id),
		phone: "555-0100".to_string(),
		rating,
		completed_deliveries: 10,
		is_available: current_order_id.is_none(),
		current_order_id: current_order_id.map(str::to_string),
		approval,
	};
	store.store(Collection::Drivers, id, &driver).await.unwrap();
}

pub async fn seed_restaurant(
	store: &Arc<StoreService>,
	id: &str,
	is_open: bool,
	discount: Option<u32>,
) {
	let restaurant = Restaurant {
		id: id.to_string(),
		name: format!("Restaurant {}", id),
		is_open,
		hours: None,
		discount,
		location: Some(GeoPoint::new(45.5017, -73.5673)),
		address: None,
	};
	store
		.store(Collection::Restaurants, id, &restaurant)
		.await
		.unwrap();
}
