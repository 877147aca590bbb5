//! File-backed store backend implementation.
//!
//! Persists the whole document tree as one JSON file. Mutations are
//! applied to the in-memory tree and then flushed via a temp file and
//! atomic rename, so a crash mid-write leaves the previous consistent
//! document in place. A sidecar lock file (fs2 exclusive lock) keeps two
//! processes from opening the same tree.

use crate::subscription::SubscriberRegistry;
use crate::{tree, StoreError, StoreInterface, StorePath, StoreSubscription, SubscriptionHandle};
use async_trait::async_trait;
use fs2::FileExt;
use mealflow_types::{
	now_millis, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// File-backed store implementation.
pub struct FileStore {
	document_path: PathBuf,
	root: Arc<RwLock<Value>>,
	subscribers: Arc<SubscriberRegistry>,
	/// Held for the lifetime of the store; releasing it on drop lets the
	/// next process open the tree.
	_lock_file: File,
}

impl FileStore {
	/// Opens (or creates) the document at the given path.
	pub fn open(document_path: PathBuf) -> Result<Self, StoreError> {
		if let Some(parent) = document_path.parent() {
			if !parent.as_os_str().is_empty() {
				std::fs::create_dir_all(parent)
					.map_err(|e| StoreError::Backend(format!("Cannot create store dir: {}", e)))?;
			}
		}

		let lock_path = document_path.with_extension("lock");
		let lock_file = OpenOptions::new()
			.create(true)
			.write(true)
			.truncate(false)
			.open(&lock_path)
			.map_err(|e| StoreError::Backend(format!("Cannot open lock file: {}", e)))?;
		lock_file
			.try_lock_exclusive()
			.map_err(|e| StoreError::Backend(format!("Store is locked by another process: {}", e)))?;

		let root = if document_path.exists() {
			let bytes = std::fs::read(&document_path)
				.map_err(|e| StoreError::Backend(format!("Cannot read store file: {}", e)))?;
			serde_json::from_slice(&bytes)
				.map_err(|e| StoreError::Serialization(e.to_string()))?
		} else {
			Value::Object(Map::new())
		};

		Ok(Self {
			document_path,
			root: Arc::new(RwLock::new(root)),
			subscribers: Arc::new(SubscriberRegistry::new()),
			_lock_file: lock_file,
		})
	}

	/// Flushes the tree to disk. Called with the write lock held so the
	/// on-disk document always matches some committed state.
	fn persist(&self, root: &Value) -> Result<(), StoreError> {
		let bytes =
			serde_json::to_vec_pretty(root).map_err(|e| StoreError::Serialization(e.to_string()))?;
		let tmp_path = self.document_path.with_extension("tmp");
		std::fs::write(&tmp_path, bytes)
			.map_err(|e| StoreError::Backend(format!("Cannot write store file: {}", e)))?;
		std::fs::rename(&tmp_path, &self.document_path)
			.map_err(|e| StoreError::Backend(format!("Cannot replace store file: {}", e)))?;
		Ok(())
	}
}

#[async_trait]
impl StoreInterface for FileStore {
	async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
		let root = self.root.read().await;
		Ok(tree::get_at(&root, path.segments()).cloned())
	}

	async fn set(&self, path: &StorePath, mut value: Value) -> Result<(), StoreError> {
		tree::resolve_server_values(&mut value, now_millis());
		let mut root = self.root.write().await;
		tree::set_at(&mut root, path.segments(), value);
		self.persist(&root)?;
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
		self.persist(&root)?;
		self.subscribers.notify(path, &root);
		Ok(())
	}

	async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
		let mut root = self.root.write().await;
		tree::remove_at(&mut root, path.segments());
		self.persist(&root)?;
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
		Box::new(FileStoreSchema)
	}
}

/// Configuration schema for FileStore.
pub struct FileStoreSchema;

impl ConfigSchema for FileStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(vec![Field::new("path", FieldType::String)], vec![]);
		schema.validate(config)
	}
}

/// Registry for the file store implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StoreFactory;

	fn factory() -> Self::Factory {
		create_store
	}
}

impl crate::StoreRegistry for Registry {}

/// Factory function to create a file store backend from configuration.
///
/// Configuration parameters:
/// - `path`: location of the JSON document file
pub fn create_store(config: &toml::Value) -> Result<Box<dyn StoreInterface>, StoreError> {
	FileStoreSchema
		.validate(config)
		.map_err(|e| StoreError::Configuration(e.to_string()))?;
	let path = config
		.get("path")
		.and_then(|v| v.as_str())
		.ok_or_else(|| StoreError::Configuration("Missing 'path'".into()))?;
	Ok(Box::new(FileStore::open(PathBuf::from(path))?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn path(raw: &str) -> StorePath {
		StorePath::parse(raw).unwrap()
	}

	#[tokio::test]
	async fn test_persists_across_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let doc = dir.path().join("store.json");

		{
			let store = FileStore::open(doc.clone()).unwrap();
			store
				.set(&path("orders/o1"), json!({"status": "pending"}))
				.await
				.unwrap();
		}

		let store = FileStore::open(doc).unwrap();
		let value = store.get(&path("orders/o1")).await.unwrap().unwrap();
		assert_eq!(value["status"], "pending");
	}

	#[tokio::test]
	async fn test_second_open_while_locked_fails() {
		let dir = tempfile::tempdir().unwrap();
		let doc = dir.path().join("store.json");

		let _store = FileStore::open(doc.clone()).unwrap();
		assert!(FileStore::open(doc).is_err());
	}

	#[tokio::test]
	async fn test_update_then_reload_reflects_merge() {
		let dir = tempfile::tempdir().unwrap();
		let doc = dir.path().join("store.json");

		{
			let store = FileStore::open(doc.clone()).unwrap();
			store
				.set(&path("orders/o1"), json!({"status": "pending"}))
				.await
				.unwrap();
			store
				.update(
					&path("orders/o1"),
					vec![
						("status".to_string(), json!("in_progress")),
						("orderStatus".to_string(), json!("accepted")),
					],
				)
				.await
				.unwrap();
		}

		let store = FileStore::open(doc).unwrap();
		let value = store.get(&path("orders/o1")).await.unwrap().unwrap();
		assert_eq!(value["status"], "in_progress");
		assert_eq!(value["orderStatus"], "accepted");
	}
}
