//! Store module for the mealflow marketplace.
//!
//! This module provides the client abstraction over the shared,
//! tree-structured real-time document store all marketplace actors write
//! to. It offers path-addressed reads, continuous subscriptions, atomic
//! multi-field merge updates and a server-timestamp sentinel, with
//! pluggable backends for in-memory and file-based trees.

use async_trait::async_trait;
use mealflow_types::{Collection, ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod path;
pub mod subscription;
pub mod tree;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

pub use path::StorePath;
pub use subscription::{StoreSubscription, SubscriptionHandle};
pub use tree::server_timestamp;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
	/// Error that occurs when a requested document is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs when a path string is malformed.
	#[error("Invalid path: {0}")]
	InvalidPath(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the store backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for store backends.
///
/// Mutations are applied atomically per call: `update` merges all of its
/// fields in one step and produces a single notification, so a subscriber
/// can never observe a torn multi-field write. Server-timestamp sentinels
/// in any written value are resolved by the backend at application time.
#[async_trait]
pub trait StoreInterface: Send + Sync {
	/// Reads the value at a path, `None` when absent.
	async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

	/// Replaces the value at a path. `null` removes the node.
	async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

	/// Atomically merges child fields into the document at a path.
	///
	/// All fields land in one step or none do; `null` values remove keys.
	async fn update(&self, path: &StorePath, fields: Vec<(String, Value)>)
		-> Result<(), StoreError>;

	/// Removes the node at a path.
	async fn delete(&self, path: &StorePath) -> Result<(), StoreError>;

	/// Checks whether a value exists at a path.
	async fn exists(&self, path: &StorePath) -> Result<bool, StoreError>;

	/// Opens a continuous subscription at a path.
	///
	/// The initial snapshot is delivered immediately; subsequent snapshots
	/// follow every overlapping committed write.
	async fn subscribe(&self, path: &StorePath) -> Result<StoreSubscription, StoreError>;

	/// Releases a subscription. Releasing an unknown handle is a no-op,
	/// making teardown idempotent under view re-entry.
	async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), StoreError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for store factory functions.
pub type StoreFactory = fn(&toml::Value) -> Result<Box<dyn StoreInterface>, StoreError>;

/// Registry trait for store implementations.
pub trait StoreRegistry: ImplementationRegistry<Factory = StoreFactory> {}

/// Get all registered store implementations.
///
/// Returns a vector of (name, factory) tuples for all available store
/// backends, used by the factory registry in the service binary.
pub fn get_all_implementations() -> Vec<(&'static str, StoreFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// High-level store service that provides typed operations.
///
/// Wraps a backend and maps between domain types and the JSON tree, with
/// documents addressed as collection + id.
pub struct StoreService {
	/// The underlying store backend implementation.
	backend: Box<dyn StoreInterface>,
}

impl StoreService {
	/// Creates a new StoreService with the specified backend.
	pub fn new(backend: Box<dyn StoreInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable document at `collection/{id}`.
	pub async fn store<T: Serialize>(
		&self,
		collection: Collection,
		id: &str,
		data: &T,
	) -> Result<(), StoreError> {
		let value =
			serde_json::to_value(data).map_err(|e| StoreError::Serialization(e.to_string()))?;
		self.backend
			.set(&StorePath::document(collection, id), value)
			.await
	}

	/// Retrieves and deserializes the document at `collection/{id}`.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		collection: Collection,
		id: &str,
	) -> Result<T, StoreError> {
		let value = self
			.backend
			.get(&StorePath::document(collection, id))
			.await?
			.ok_or(StoreError::NotFound)?;
		serde_json::from_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
	}

	/// Atomically merges fields into the document at `collection/{id}`.
	pub async fn update_fields(
		&self,
		collection: Collection,
		id: &str,
		fields: Vec<(String, Value)>,
	) -> Result<(), StoreError> {
		self.backend
			.update(&StorePath::document(collection, id), fields)
			.await
	}

	/// Removes the document at `collection/{id}`.
	pub async fn remove(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
		self.backend
			.delete(&StorePath::document(collection, id))
			.await
	}

	/// Checks whether `collection/{id}` exists.
	pub async fn exists(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
		self.backend
			.exists(&StorePath::document(collection, id))
			.await
	}

	/// Lists all documents in a collection as (id, value) pairs.
	///
	/// Documents that fail to deserialize are skipped with a warning
	/// rather than failing the whole listing; one corrupt legacy record
	/// must not blind a dashboard to every other order.
	pub async fn list<T: DeserializeOwned>(
		&self,
		collection: Collection,
	) -> Result<Vec<(String, T)>, StoreError> {
		let root = self
			.backend
			.get(&StorePath::collection(collection))
			.await?;
		let Some(Value::Object(map)) = root else {
			return Ok(Vec::new());
		};
		let mut out = Vec::with_capacity(map.len());
		for (id, value) in map {
			match serde_json::from_value(value) {
				Ok(parsed) => out.push((id, parsed)),
				Err(e) => {
					tracing::warn!(collection = collection.as_str(), id = %id, error = %e, "Skipping undecodable document");
				},
			}
		}
		Ok(out)
	}

	/// Opens a subscription on a single document.
	pub async fn watch(
		&self,
		collection: Collection,
		id: &str,
	) -> Result<StoreSubscription, StoreError> {
		self.backend
			.subscribe(&StorePath::document(collection, id))
			.await
	}

	/// Opens a subscription on a whole collection.
	pub async fn watch_collection(
		&self,
		collection: Collection,
	) -> Result<StoreSubscription, StoreError> {
		self.backend.subscribe(&StorePath::collection(collection)).await
	}

	/// Releases a subscription previously opened through this service.
	pub async fn release(&self, handle: SubscriptionHandle) -> Result<(), StoreError> {
		self.backend.unsubscribe(handle).await
	}

	/// Raw access for callers that need path-level operations.
	pub fn backend(&self) -> &dyn StoreInterface {
		self.backend.as_ref()
	}
}
