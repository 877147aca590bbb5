//! Utility functions for common conversions.

use std::time::{SystemTime, UNIX_EPOCH};

/// Truncates an id for log output, keeping a recognizable prefix.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Current wall-clock time as unix milliseconds.
///
/// The store stamps records itself via the server-timestamp sentinel;
/// this is for client-side comparisons (schedule due checks, ages).
pub fn now_millis() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}
