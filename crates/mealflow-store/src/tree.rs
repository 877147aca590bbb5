//! In-memory document tree manipulation shared by the store backends.
//!
//! The tree is a plain `serde_json::Value`. Writing `null` removes a key,
//! matching the store's wire semantics, and empty objects left behind by a
//! removal are pruned so absence and emptiness stay indistinguishable to
//! readers.

use serde_json::{Map, Value};

/// The sentinel key whose value names a server-resolved placeholder.
const SERVER_VALUE_KEY: &str = ".sv";

/// A field value that the backend replaces with its own clock (unix
/// milliseconds) at write application time. Clients never stamp
/// `createdAt`/`updatedAt` themselves.
pub fn server_timestamp() -> Value {
	let mut map = Map::new();
	map.insert(
		SERVER_VALUE_KEY.to_string(),
		Value::String("timestamp".to_string()),
	);
	Value::Object(map)
}

/// Recursively replaces server-value sentinels with concrete values.
pub fn resolve_server_values(value: &mut Value, now_millis: u64) {
	match value {
		Value::Object(map) => {
			if map.len() == 1
				&& map
					.get(SERVER_VALUE_KEY)
					.and_then(Value::as_str)
					.is_some_and(|v| v == "timestamp")
			{
				*value = Value::from(now_millis);
				return;
			}
			for child in map.values_mut() {
				resolve_server_values(child, now_millis);
			}
		},
		Value::Array(items) => {
			for item in items.iter_mut() {
				resolve_server_values(item, now_millis);
			}
		},
		_ => {},
	}
}

/// Reads the value at a path, `None` when absent.
pub fn get_at<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
	let mut current = root;
	for segment in segments {
		current = current.as_object()?.get(segment)?;
	}
	Some(current)
}

/// Replaces the value at a path, creating intermediate objects.
/// A `null` value removes the node instead.
pub fn set_at(root: &mut Value, segments: &[String], value: Value) {
	if value.is_null() {
		remove_at(root, segments);
		return;
	}
	let Some((first, rest)) = segments.split_first() else {
		*root = value;
		return;
	};
	if !root.is_object() {
		*root = Value::Object(Map::new());
	}
	let map = root.as_object_mut().expect("just coerced to object");
	if rest.is_empty() {
		map.insert(first.clone(), value);
	} else {
		let child = map
			.entry(first.clone())
			.or_insert_with(|| Value::Object(Map::new()));
		set_at(child, rest, value);
	}
}

/// Merges child fields into the object at a path in one step.
///
/// `null` field values remove the key. The object is created when absent,
/// so a merge against a missing document behaves like a partial create.
pub fn merge_at(root: &mut Value, segments: &[String], fields: Vec<(String, Value)>) {
	for (key, value) in fields {
		let mut child = segments.to_vec();
		child.push(key);
		set_at(root, &child, value);
	}
}

/// Removes the node at a path and prunes empty ancestors.
pub fn remove_at(root: &mut Value, segments: &[String]) {
	let Some((first, rest)) = segments.split_first() else {
		*root = Value::Object(Map::new());
		return;
	};
	let Some(map) = root.as_object_mut() else {
		return;
	};
	if rest.is_empty() {
		map.remove(first);
	} else if let Some(child) = map.get_mut(first) {
		remove_at(child, rest);
		if child.as_object().is_some_and(Map::is_empty) {
			map.remove(first);
		}
	}
}
