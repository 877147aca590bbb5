//! Path addressing for the tree-structured document store.

use crate::StoreError;
use mealflow_types::Collection;
use std::fmt;

/// Characters that may not appear in a path segment.
const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// A validated, `/`-separated location in the document tree, for example
/// `orders/8f3c` or `drivers/d1/currentOrderId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
	segments: Vec<String>,
}

impl StorePath {
	/// Parses a slash-separated path string.
	///
	/// Rejects empty paths, empty segments and segments containing
	/// characters the store reserves.
	pub fn parse(raw: &str) -> Result<Self, StoreError> {
		let trimmed = raw.trim_matches('/');
		if trimmed.is_empty() {
			return Err(StoreError::InvalidPath(raw.to_string()));
		}
		let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
		for segment in &segments {
			if segment.is_empty() || segment.contains(FORBIDDEN) {
				return Err(StoreError::InvalidPath(raw.to_string()));
			}
		}
		Ok(Self { segments })
	}

	/// The root of a top-level collection.
	pub fn collection(collection: Collection) -> Self {
		Self {
			segments: vec![collection.as_str().to_string()],
		}
	}

	/// A document inside a top-level collection.
	pub fn document(collection: Collection, id: &str) -> Self {
		Self::collection(collection).child(id)
	}

	/// Appends one segment.
	pub fn child(&self, segment: &str) -> Self {
		let mut segments = self.segments.clone();
		segments.push(segment.to_string());
		Self { segments }
	}

	pub fn segments(&self) -> &[String] {
		&self.segments
	}

	/// True when one path is a prefix of the other (or they are equal).
	///
	/// A write anywhere on the spine of a subscription's path changes the
	/// value observed at that path, in both directions.
	pub fn overlaps(&self, other: &StorePath) -> bool {
		let shorter = self.segments.len().min(other.segments.len());
		self.segments[..shorter] == other.segments[..shorter]
	}
}

impl fmt::Display for StorePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.segments.join("/"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_rejects_reserved_characters() {
		assert!(StorePath::parse("orders/ab#cd").is_err());
		assert!(StorePath::parse("orders//x").is_err());
		assert!(StorePath::parse("").is_err());
		assert!(StorePath::parse("orders/abc").is_ok());
	}

	#[test]
	fn overlap_is_bidirectional() {
		let collection = StorePath::parse("orders").unwrap();
		let doc = StorePath::parse("orders/o1").unwrap();
		let field = StorePath::parse("orders/o1/status").unwrap();
		let other = StorePath::parse("drivers/d1").unwrap();

		assert!(collection.overlaps(&field));
		assert!(field.overlaps(&collection));
		assert!(doc.overlaps(&doc));
		assert!(!doc.overlaps(&other));
	}
}
