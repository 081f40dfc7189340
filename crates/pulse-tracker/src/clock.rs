// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Time sources.
//!
//! Every timestamp and every debounce/throttle decision in the tracker reads
//! the injected [`Clock`], so a [`ManualClock`] makes the whole pipeline
//! deterministic.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
	now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			now: Arc::new(Mutex::new(start)),
		}
	}

	/// Moves time forward by `by`.
	pub fn advance(&self, by: Duration) {
		let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
		let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
		*now = now.checked_add_signed(delta).unwrap_or(*now);
	}

	/// Jumps to `to`. Moving backwards is allowed; consumers clamp negative spans.
	pub fn set(&self, to: DateTime<Utc>) {
		*self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
	}
}

impl Default for ManualClock {
	fn default() -> Self {
		Self::new(DateTime::<Utc>::UNIX_EPOCH)
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

/// Span from `earlier` to `later` as a std duration; zero if `later` is not after `earlier`.
pub fn elapsed(earlier: DateTime<Utc>, later: DateTime<Utc>) -> Duration {
	(later - earlier).to_std().unwrap_or(Duration::ZERO)
}

/// `at + by`, saturating at the far future.
pub fn add(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
	chrono::Duration::from_std(by)
		.ok()
		.and_then(|d| at.checked_add_signed(d))
		.unwrap_or(DateTime::<Utc>::MAX_UTC)
}
