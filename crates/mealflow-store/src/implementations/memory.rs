//! In-memory store backend implementation.
//!
//! This module provides a memory-based implementation of the
//! StoreInterface trait, useful for testing and development scenarios
//! where persistence is not required. Writes and subscriber fan-out are
//! serialized under one lock so every subscriber observes committed
//! states in commit order.

use crate::subscription::SubscriberRegistry;
use crate::{tree, StoreError, StoreInterface, StorePath, StoreSubscription, SubscriptionHandle};
use async_trait::async_trait;
use mealflow_types::{now_millis, ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store implementation.
pub struct MemoryStore {
	/// The document tree protected by a read-write lock.
	root: Arc<RwLock<Value>>,
	subscribers: Arc<SubscriberRegistry>,
}

impl MemoryStore {
	/// Creates a new MemoryStore instance with an empty tree.
	pub fn new() -> Self {
		Self {
			root: Arc::new(RwLock::new(Value::Object(Map::new()))),
			subscribers: Arc::new(SubscriberRegistry::new()),
		}
	}
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StoreInterface for MemoryStore {
	async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
		let root = self.root.read().await;
		Ok(tree::get_at(&root, path.segments()).cloned())
	}

	async fn set(&self, path: &StorePath, mut value: Value) -> Result<(), StoreError> {
		tree::resolve_server_values(&mut value, now_millis());
		let mut root = self.root.write().await;
		tree::set_at(&mut root, path.segments(), value);
		self.subscribers.notify(path, &root);
		Ok(())
	}

	async fn update(
		&self,
		path: &StorePath,
		fields: Vec<(String, Value)>,
	) -> Result<(), StoreError> {
		let now = now_millis();
		let fields = fields
			.into_iter()
			.map(|(key, mut value)| {
				tree::resolve_server_values(&mut value, now);
				(key, value)
			})
			.collect();
		let mut root = self.root.write().await;
		tree::merge_at(&mut root, path.segments(), fields);
		self.subscribers.notify(path, &root);
		Ok(())
	}

	async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
		let mut root = self.root.write().await;
		tree::remove_at(&mut root, path.segments());
		self.subscribers.notify(path, &root);
		Ok(())
	}

	async fn exists(&self, path: &StorePath) -> Result<bool, StoreError> {
		let root = self.root.read().await;
		Ok(tree::get_at(&root, path.segments()).is_some())
	}

	async fn subscribe(&self, path: &StorePath) -> Result<StoreSubscription, StoreError> {
		let root = self.root.read().await;
		let initial = tree::get_at(&root, path.segments()).cloned();
		Ok(self.subscribers.register(path.clone(), initial))
	}

	async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), StoreError> {
		self.subscribers.remove(handle);
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStoreSchema)
	}
}

/// Configuration schema for MemoryStore.
pub struct MemoryStoreSchema;

impl ConfigSchema for MemoryStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory store has no required configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Registry for the memory store implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StoreFactory;

	fn factory() -> Self::Factory {
		create_store
	}
}

impl crate::StoreRegistry for Registry {}

/// Factory function to create a memory store backend from configuration.
///
/// Configuration parameters:
/// - None required for memory store
pub fn create_store(_config: &toml::Value) -> Result<Box<dyn StoreInterface>, StoreError> {
	Ok(Box::new(MemoryStore::new()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn path(raw: &str) -> StorePath {
		StorePath::parse(raw).unwrap()
	}

	#[tokio::test]
	async fn test_basic_operations() {
		let store = MemoryStore::new();
		let p = path("orders/o1");

		store.set(&p, json!({"status": "pending"})).await.unwrap();
		let value = store.get(&p).await.unwrap().unwrap();
		assert_eq!(value["status"], "pending");

		assert!(store.exists(&p).await.unwrap());

		store.delete(&p).await.unwrap();
		assert!(!store.exists(&p).await.unwrap());
		assert!(store.get(&p).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_update_merges_atomically() {
		let store = MemoryStore::new();
		let p = path("orders/o1");
		store
			.set(&p, json!({"status": "pending", "driverId": "d9"}))
			.await
			.unwrap();

		let mut sub = store.subscribe(&p).await.unwrap();
		// Drain the initial snapshot.
		sub.updates.recv().await.unwrap();

		store
			.update(
				&p,
				vec![
					("status".to_string(), json!("in_progress")),
					("orderStatus".to_string(), json!("accepted")),
					("driverId".to_string(), Value::Null),
				],
			)
			.await
			.unwrap();

		// One notification carrying the complete merged state: a reader
		// never sees the coarse status without the fine status from the
		// same merge.
		let snapshot = sub.updates.recv().await.unwrap().unwrap();
		assert_eq!(snapshot["status"], "in_progress");
		assert_eq!(snapshot["orderStatus"], "accepted");
		assert!(snapshot.get("driverId").is_none());
	}

	#[tokio::test]
	async fn test_server_timestamp_resolved_on_write() {
		let store = MemoryStore::new();
		let p = path("orders/o1");
		store
			.set(&p, json!({"createdAt": crate::server_timestamp()}))
			.await
			.unwrap();

		let value = store.get(&p).await.unwrap().unwrap();
		assert!(value["createdAt"].as_u64().unwrap() > 1_600_000_000_000);
	}

	#[tokio::test]
	async fn test_subscribe_initial_snapshot_and_updates() {
		let store = MemoryStore::new();
		let p = path("orders/o1");
		store.set(&p, json!({"status": "pending"})).await.unwrap();

		let mut sub = store.subscribe(&p).await.unwrap();
		let initial = sub.updates.recv().await.unwrap().unwrap();
		assert_eq!(initial["status"], "pending");

		// A write above the subscribed path also changes the observed
		// value.
		store
			.set(&path("orders"), json!({"o1": {"status": "rejected"}}))
			.await
			.unwrap();
		let next = sub.updates.recv().await.unwrap().unwrap();
		assert_eq!(next["status"], "rejected");
	}

	#[tokio::test]
	async fn test_unsubscribe_is_idempotent() {
		let store = MemoryStore::new();
		let p = path("orders/o1");

		let sub = store.subscribe(&p).await.unwrap();
		let handle = sub.handle;
		store.unsubscribe(handle).await.unwrap();
		// Second release of the same handle must not error.
		store.unsubscribe(handle).await.unwrap();

		// Re-subscription after teardown yields a fresh stream.
		let mut sub = store.subscribe(&p).await.unwrap();
		assert!(sub.updates.recv().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_unrelated_write_does_not_notify() {
		let store = MemoryStore::new();
		let mut sub = store.subscribe(&path("orders/o1")).await.unwrap();
		sub.updates.recv().await.unwrap();

		store
			.set(&path("drivers/d1"), json!({"name": "Sam"}))
			.await
			.unwrap();

		assert!(sub.updates.try_recv().is_err());
	}
}
