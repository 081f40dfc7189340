// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Free-form event payloads.

use serde_json::{Map, Value};

/// Key under which non-object data passed to `track` is preserved.
pub const WRAPPED_VALUE_KEY: &str = "value";

/// A builder for the caller-supplied part of an event record.
///
/// # Example
///
/// ```
/// use pulse_tracker_core::Payload;
///
/// let payload = Payload::new()
///     .insert("productId", "sku-42")
///     .insert("price", 1299.0)
///     .insert("quantity", 2);
/// assert_eq!(payload.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
	inner: Map<String, Value>,
}

impl Payload {
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair, replacing any previous value for the key.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts `value` only when it is present; absent attributes are recorded
	/// as JSON `null` so the key still shows up downstream.
	pub fn insert_opt<K, V>(self, key: K, value: Option<V>) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		match value {
			Some(v) => self.insert(key, v),
			None => self.insert(key, Value::Null),
		}
	}

	/// Merges another payload into this one. On collision `other` wins.
	pub fn merge(mut self, other: Payload) -> Self {
		self.inner.extend(other.inner);
		self
	}

	/// Removes and returns the value stored under `key`.
	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.inner.remove(key)
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.inner.contains_key(key)
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn into_map(self) -> Map<String, Value> {
		self.inner
	}
}

impl From<Payload> for Value {
	fn from(payload: Payload) -> Self {
		Value::Object(payload.inner)
	}
}

/// Best-effort conversion used by the public `track` API: objects are taken
/// as-is, `null` becomes empty, and any other value is kept under
/// [`WRAPPED_VALUE_KEY`] rather than rejected.
impl From<Value> for Payload {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(map) => Self { inner: map },
			Value::Null => Self::new(),
			other => Self::new().insert(WRAPPED_VALUE_KEY, other),
		}
	}
}

impl From<Map<String, Value>> for Payload {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Payload {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			inner: iter
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}
}
