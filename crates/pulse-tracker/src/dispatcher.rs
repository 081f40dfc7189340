// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flush policy and reconciliation for the event buffer.
//!
//! The dispatcher is a synchronous state machine. It decides *when* to flush
//! and *what* goes into each request; performing the send is the caller's
//! job, which reports back through [`Dispatcher::complete`]. Three triggers
//! converge on the same lease-and-reconcile path:
//!
//! - **threshold**: unsent records reach `flush_threshold` on append
//! - **timer**: the periodic interval elapses with unsent records
//! - **unload**: page teardown hands everything to a best-effort beacon
//!
//! Requests may overlap and complete in any order. Each request owns a lease
//! on exactly the records it carries, so:
//!
//! - success removes that lease's records and nothing else
//! - failure releases them for the next flush, unchanged and in order
//! - a new snapshot never includes records already in flight, so an
//!   always-succeeding transport sees every record exactly once
//!
//! Released records count toward the threshold again, so a failed batch is
//! retried by whichever of the timer or the next threshold crossing comes
//! first.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pulse_tracker_core::EventRecord;
use tracing::{debug, warn};

use crate::buffer::{EventBuffer, FlushId};
use crate::clock;

/// What caused a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
	Threshold,
	Timer,
	Unload,
	/// Explicit `Tracker::flush` or shutdown.
	Manual,
}

impl fmt::Display for FlushTrigger {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Threshold => write!(f, "threshold"),
			Self::Timer => write!(f, "timer"),
			Self::Unload => write!(f, "unload"),
			Self::Manual => write!(f, "manual"),
		}
	}
}

/// A snapshot of records to send in one request.
#[derive(Debug, Clone)]
pub struct FlushRequest {
	pub id: FlushId,
	pub trigger: FlushTrigger,
	pub records: Vec<EventRecord>,
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
	/// The collector acknowledged the request.
	Delivered,
	/// The send failed; records stay buffered.
	Failed,
	/// Records were handed to a fire-and-forget transport at unload and are
	/// deliberately dropped without confirmation.
	Abandoned,
}

/// Effect of a completed flush on the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
	pub flush: FlushId,
	pub outcome: FlushOutcome,
	pub removed: usize,
	pub released: usize,
	pub remaining: usize,
}

/// Observable dispatcher state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
	/// No request outstanding.
	Idle,
	/// One or more requests outstanding.
	Sending { in_flight: usize },
}

/// Flush policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
	pub flush_threshold: usize,
	pub flush_interval: Duration,
}

impl Default for DispatchPolicy {
	fn default() -> Self {
		Self {
			flush_threshold: pulse_tracker_core::config::DEFAULT_FLUSH_THRESHOLD,
			flush_interval: Duration::from_millis(
				pulse_tracker_core::config::DEFAULT_FLUSH_INTERVAL_MS,
			),
		}
	}
}

/// Buffer plus flush bookkeeping.
#[derive(Debug)]
pub struct Dispatcher {
	buffer: EventBuffer,
	policy: DispatchPolicy,
	in_flight: BTreeMap<FlushId, FlushTrigger>,
	next_flush_id: u64,
	next_timer_at: DateTime<Utc>,
}

impl Dispatcher {
	pub fn new(policy: DispatchPolicy, now: DateTime<Utc>) -> Self {
		Self {
			buffer: EventBuffer::new(),
			policy,
			in_flight: BTreeMap::new(),
			next_flush_id: 1,
			next_timer_at: clock::add(now, policy.flush_interval),
		}
	}

	/// Appends a record; returns a threshold flush if one is due.
	pub fn push(&mut self, record: EventRecord) -> Option<FlushRequest> {
		self.buffer.push(record);
		if self.buffer.unleased_len() >= self.policy.flush_threshold {
			return self.begin_flush(FlushTrigger::Threshold);
		}
		None
	}

	/// Appends a record without evaluating the threshold, for callers that
	/// take a snapshot of everything right after.
	pub fn append(&mut self, record: EventRecord) {
		self.buffer.push(record);
	}

	/// Fires the periodic flush when its deadline has passed. The timer is
	/// re-armed whether or not there was anything to send.
	pub fn poll_timer(&mut self, now: DateTime<Utc>) -> Option<FlushRequest> {
		if now < self.next_timer_at {
			return None;
		}
		self.next_timer_at = clock::add(now, self.policy.flush_interval);
		self.begin_flush(FlushTrigger::Timer)
	}

	/// When the periodic flush is next due.
	pub fn next_timer_at(&self) -> DateTime<Utc> {
		self.next_timer_at
	}

	/// Snapshots every record not already in flight.
	pub fn begin_flush(&mut self, trigger: FlushTrigger) -> Option<FlushRequest> {
		if self.buffer.unleased_len() == 0 {
			return None;
		}
		let id = self.allocate_id();
		let records = self.buffer.lease_unleased(id);
		self.in_flight.insert(id, trigger);
		debug!(flush_id = %id, %trigger, count = records.len(), "Beginning flush");
		Some(FlushRequest {
			id,
			trigger,
			records,
		})
	}

	/// Snapshots everything, including records already in flight, for the
	/// unload beacon. Outstanding requests may never complete once the page
	/// is torn down, so their records ride along; this can duplicate
	/// deliveries, which the at-least-once contract allows.
	pub fn begin_unload(&mut self) -> Option<FlushRequest> {
		if self.buffer.is_empty() {
			return None;
		}
		let id = self.allocate_id();
		let records = self.buffer.lease_all(id);
		self.in_flight.insert(id, FlushTrigger::Unload);
		debug!(flush_id = %id, count = records.len(), "Beginning unload flush");
		Some(FlushRequest {
			id,
			trigger: FlushTrigger::Unload,
			records,
		})
	}

	/// Reconciles the buffer with the outcome of request `id`.
	///
	/// Returns `None` for an unknown or already-completed id.
	pub fn complete(&mut self, id: FlushId, outcome: FlushOutcome) -> Option<Reconciliation> {
		let Some(trigger) = self.in_flight.remove(&id) else {
			warn!(flush_id = %id, "Ignoring completion for unknown flush");
			return None;
		};

		let (removed, released) = match outcome {
			FlushOutcome::Delivered | FlushOutcome::Abandoned => {
				(self.buffer.remove_leased(id), 0)
			}
			FlushOutcome::Failed => (0, self.buffer.release(id)),
		};

		debug!(
			flush_id = %id,
			%trigger,
			?outcome,
			removed,
			released,
			remaining = self.buffer.len(),
			"Flush reconciled"
		);

		Some(Reconciliation {
			flush: id,
			outcome,
			removed,
			released,
			remaining: self.buffer.len(),
		})
	}

	pub fn state(&self) -> DispatchState {
		if self.in_flight.is_empty() {
			DispatchState::Idle
		} else {
			DispatchState::Sending {
				in_flight: self.in_flight.len(),
			}
		}
	}

	/// Total buffered records, including those in flight.
	pub fn pending_len(&self) -> usize {
		self.buffer.len()
	}

	/// Buffered records not part of any outstanding request.
	pub fn unsent_len(&self) -> usize {
		self.buffer.unleased_len()
	}

	pub fn pending_records(&self) -> Vec<EventRecord> {
		self.buffer.records()
	}

	pub fn policy(&self) -> DispatchPolicy {
		self.policy
	}

	fn allocate_id(&mut self) -> FlushId {
		let id = FlushId(self.next_flush_id);
		self.next_flush_id += 1;
		id
	}
}
