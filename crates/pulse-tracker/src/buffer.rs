// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ordered in-memory buffer of pending event records.
//!
//! Records are leased to a flush when they are copied into its request and
//! released or removed when that flush completes. Removal is always by lease,
//! never "whatever is in the buffer now", so records appended while a request
//! is outstanding survive its reconciliation.

use std::fmt;

use pulse_tracker_core::{EventId, EventRecord};

/// Identifies one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlushId(pub u64);

impl fmt::Display for FlushId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, Clone)]
struct Entry {
	record: EventRecord,
	lease: Option<FlushId>,
}

/// Pending records in detection order.
#[derive(Debug, Clone, Default)]
pub struct EventBuffer {
	entries: Vec<Entry>,
}

impl EventBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a record at the tail.
	pub fn push(&mut self, record: EventRecord) {
		self.entries.push(Entry {
			record,
			lease: None,
		});
	}

	/// Total pending records, leased or not.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Records not currently part of an outstanding request.
	pub fn unleased_len(&self) -> usize {
		self.entries.iter().filter(|e| e.lease.is_none()).count()
	}

	/// Leases every unleased record to `flush` and returns copies in order.
	pub fn lease_unleased(&mut self, flush: FlushId) -> Vec<EventRecord> {
		self.entries
			.iter_mut()
			.filter(|e| e.lease.is_none())
			.map(|e| {
				e.lease = Some(flush);
				e.record.clone()
			})
			.collect()
	}

	/// Leases every record to `flush`, taking over existing leases.
	pub fn lease_all(&mut self, flush: FlushId) -> Vec<EventRecord> {
		self.entries
			.iter_mut()
			.map(|e| {
				e.lease = Some(flush);
				e.record.clone()
			})
			.collect()
	}

	/// Removes exactly the records leased to `flush`. Returns how many.
	pub fn remove_leased(&mut self, flush: FlushId) -> usize {
		let before = self.entries.len();
		self.entries.retain(|e| e.lease != Some(flush));
		before - self.entries.len()
	}

	/// Makes records leased to `flush` eligible again. Returns how many.
	pub fn release(&mut self, flush: FlushId) -> usize {
		let mut released = 0;
		for entry in self.entries.iter_mut().filter(|e| e.lease == Some(flush)) {
			entry.lease = None;
			released += 1;
		}
		released
	}

	/// Copies of every pending record in order.
	pub fn records(&self) -> Vec<EventRecord> {
		self.entries.iter().map(|e| e.record.clone()).collect()
	}

	pub fn contains(&self, id: EventId) -> bool {
		self.entries.iter().any(|e| e.record.event_id == id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use pulse_tracker_core::{EventKind, PageContext, PageView, Payload, Session, SessionMetadata};

	use crate::normalizer::EventNormalizer;

	fn records(n: usize) -> Vec<EventRecord> {
		let mut normalizer = EventNormalizer::new(
			Session::start(Utc::now()),
			PageView::new(Utc::now()),
			SessionMetadata::default(),
		);
		(0..n)
			.map(|i| {
				normalizer.normalize(
					&EventKind::custom("test"),
					Payload::new().insert("seq", i),
					Utc::now(),
					PageContext::from_url("https://a.example/", None),
				)
			})
			.collect()
	}

	#[test]
	fn test_lease_then_remove_only_leased() {
		let mut buffer = EventBuffer::new();
		let batch = records(3);
		for r in batch.iter().cloned() {
			buffer.push(r);
		}

		let sent = buffer.lease_unleased(FlushId(1));
		assert_eq!(sent.len(), 3);

		let late = records(1).remove(0);
		buffer.push(late.clone());
		assert_eq!(buffer.len(), 4);
		assert_eq!(buffer.unleased_len(), 1);

		assert_eq!(buffer.remove_leased(FlushId(1)), 3);
		assert_eq!(buffer.len(), 1);
		assert!(buffer.contains(late.event_id));
	}

	#[test]
	fn test_release_makes_records_eligible_again_in_order() {
		let mut buffer = EventBuffer::new();
		let batch = records(2);
		for r in batch.iter().cloned() {
			buffer.push(r);
		}
		buffer.lease_unleased(FlushId(1));
		buffer.push(records(1).remove(0));

		assert_eq!(buffer.release(FlushId(1)), 2);
		let again = buffer.lease_unleased(FlushId(2));
		assert_eq!(again.len(), 3);
		assert_eq!(again[0].event_id, batch[0].event_id);
		assert_eq!(again[1].event_id, batch[1].event_id);
	}

	#[test]
	fn test_lease_unleased_skips_outstanding_records() {
		let mut buffer = EventBuffer::new();
		for r in records(2) {
			buffer.push(r);
		}
		buffer.lease_unleased(FlushId(1));
		assert!(buffer.lease_unleased(FlushId(2)).is_empty());
	}

	#[test]
	fn test_lease_all_takes_over_outstanding_leases() {
		let mut buffer = EventBuffer::new();
		for r in records(2) {
			buffer.push(r);
		}
		buffer.lease_unleased(FlushId(1));
		buffer.push(records(1).remove(0));

		assert_eq!(buffer.lease_all(FlushId(9)).len(), 3);
		assert_eq!(buffer.remove_leased(FlushId(1)), 0);
		assert_eq!(buffer.release(FlushId(1)), 0);
		assert_eq!(buffer.remove_leased(FlushId(9)), 3);
		assert!(buffer.is_empty());
	}
}
