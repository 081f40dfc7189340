// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local mirror of sent records for debugging.

use pulse_tracker_core::EventRecord;
use serde_json::Value;
use tracing::{debug, warn};

use crate::env::{KeyValueStore, MIRROR_STORAGE_KEY};
use crate::error::Result;

/// Most recent records kept in the mirror.
pub const MIRROR_CAPACITY: usize = 500;

/// Appends every attempted batch to a JSON array in local storage.
///
/// Failures are logged and swallowed; the mirror never affects delivery.
#[derive(Debug, Clone, Copy)]
pub struct DebugMirror {
	capacity: usize,
}

impl Default for DebugMirror {
	fn default() -> Self {
		Self::new(MIRROR_CAPACITY)
	}
}

impl DebugMirror {
	pub fn new(capacity: usize) -> Self {
		Self { capacity }
	}

	pub fn record(&self, store: &dyn KeyValueStore, records: &[EventRecord]) {
		if records.is_empty() {
			return;
		}
		match self.append(store, records) {
			Ok(total) => debug!(added = records.len(), total, "Mirrored event batch"),
			Err(e) => warn!(error = %e, "Failed to mirror event batch"),
		}
	}

	/// Reads back everything mirrored so far. Unreadable contents read as empty.
	pub fn load(&self, store: &dyn KeyValueStore) -> Vec<Value> {
		match store.get(MIRROR_STORAGE_KEY) {
			Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
			_ => Vec::new(),
		}
	}

	fn append(&self, store: &dyn KeyValueStore, records: &[EventRecord]) -> Result<usize> {
		let mut stored = self.load(store);
		for record in records {
			stored.push(serde_json::to_value(record)?);
		}
		if stored.len() > self.capacity {
			let excess = stored.len() - self.capacity;
			stored.drain(..excess);
		}
		store.set(MIRROR_STORAGE_KEY, &serde_json::to_string(&stored)?)?;
		Ok(stored.len())
	}
}
