// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test doubles shared by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use pulse_tracker_core::{EventId, EventRecord};
use tokio::sync::Semaphore;

use crate::dispatcher::DispatchState;
use crate::error::{Result, TrackerError};
use crate::tracker::Tracker;
use crate::transport::Transport;

/// Records every batch; can fail on demand or hold sends until released.
#[derive(Default)]
pub(crate) struct RecordingTransport {
	batches: Mutex<Vec<Vec<EventRecord>>>,
	beacons: Mutex<Vec<Vec<EventRecord>>>,
	should_fail: AtomicBool,
	gate: Option<Semaphore>,
}

impl RecordingTransport {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Every send blocks until [`RecordingTransport::release`] is called.
	pub(crate) fn gated() -> Self {
		Self {
			gate: Some(Semaphore::new(0)),
			..Self::default()
		}
	}

	pub(crate) fn set_should_fail(&self, fail: bool) {
		self.should_fail.store(fail, Ordering::SeqCst);
	}

	pub(crate) fn release(&self, sends: usize) {
		if let Some(gate) = &self.gate {
			gate.add_permits(sends);
		}
	}

	/// Batches passed to `send`, including ones that then failed.
	pub(crate) fn batches(&self) -> Vec<Vec<EventRecord>> {
		self.batches.lock().unwrap_or_else(PoisonError::into_inner).clone()
	}

	pub(crate) fn beacons(&self) -> Vec<Vec<EventRecord>> {
		self.beacons.lock().unwrap_or_else(PoisonError::into_inner).clone()
	}

	pub(crate) fn sent_ids(&self) -> Vec<EventId> {
		self.batches()
			.iter()
			.flatten()
			.map(|r| r.event_id)
			.collect()
	}
}

#[async_trait]
impl Transport for RecordingTransport {
	async fn send(&self, records: &[EventRecord]) -> Result<()> {
		self.batches
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push(records.to_vec());
		if let Some(gate) = &self.gate {
			if let Ok(permit) = gate.acquire().await {
				permit.forget();
			}
		}
		if self.should_fail.load(Ordering::SeqCst) {
			return Err(TrackerError::ServerError {
				status: 503,
				message: "mock failure".to_string(),
			});
		}
		Ok(())
	}

	fn send_beacon(&self, records: Vec<EventRecord>) -> Result<()> {
		if self.should_fail.load(Ordering::SeqCst) {
			return Err(TrackerError::NoRuntime);
		}
		self.beacons
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push(records);
		Ok(())
	}
}

/// Yields until every background send has been reconciled.
pub(crate) async fn settle(tracker: &Tracker) {
	for _ in 0..1_000 {
		if tracker.dispatch_state() == DispatchState::Idle {
			return;
		}
		tokio::task::yield_now().await;
	}
	panic!("tracker did not settle: {:?}", tracker.dispatch_state());
}

/// Yields until `transport` has seen `count` batches.
pub(crate) async fn wait_for_batches(transport: &RecordingTransport, count: usize) {
	for _ in 0..1_000 {
		if transport.batches().len() >= count {
			return;
		}
		tokio::task::yield_now().await;
	}
	panic!("expected {count} batches, saw {}", transport.batches().len());
}
