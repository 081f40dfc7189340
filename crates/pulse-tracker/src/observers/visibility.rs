// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Page visibility transitions.

use chrono::{DateTime, Utc};
use pulse_tracker_core::{EventKind, Payload};

use super::Observation;
use crate::clock;

/// Pairs `page_hidden` with the following `page_visible`.
///
/// A visible transition without a recorded hidden timestamp emits nothing.
/// A second hidden transition while already hidden keeps the first timestamp.
#[derive(Debug, Clone, Default)]
pub struct VisibilityObserver {
	hidden_at: Option<DateTime<Utc>>,
}

impl VisibilityObserver {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_hidden(&self) -> bool {
		self.hidden_at.is_some()
	}

	pub fn on_change(
		&mut self,
		hidden: bool,
		now: DateTime<Utc>,
		page_loaded_at: DateTime<Utc>,
	) -> Option<Observation> {
		if hidden {
			if self.hidden_at.is_some() {
				return None;
			}
			self.hidden_at = Some(now);
			let on_page = clock::elapsed(page_loaded_at, now).as_millis() as u64;
			return Some(Observation::new(
				EventKind::PageHidden,
				Payload::new().insert("timeOnPageBeforeHiding", on_page),
			));
		}

		let hidden_at = self.hidden_at.take()?;
		let time_hidden = clock::elapsed(hidden_at, now).as_millis() as u64;
		Some(Observation::new(
			EventKind::PageVisible,
			Payload::new()
				.insert("timeHidden", time_hidden)
				.insert("timeHiddenSeconds", (time_hidden + 500) / 1000),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use serde_json::json;

	fn t(ms: i64) -> DateTime<Utc> {
		Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
	}

	#[test]
	fn test_hidden_then_visible_pairs_durations() {
		let mut v = VisibilityObserver::new();
		let hidden = v.on_change(true, t(4_000), t(0)).unwrap();
		assert_eq!(hidden.kind, EventKind::PageHidden);
		assert_eq!(hidden.payload.get("timeOnPageBeforeHiding"), Some(&json!(4000)));

		let visible = v.on_change(false, t(6_600), t(0)).unwrap();
		assert_eq!(visible.kind, EventKind::PageVisible);
		assert_eq!(visible.payload.get("timeHidden"), Some(&json!(2600)));
		assert_eq!(visible.payload.get("timeHiddenSeconds"), Some(&json!(3)));
		assert!(!v.is_hidden());
	}

	#[test]
	fn test_visible_without_prior_hidden_emits_nothing() {
		let mut v = VisibilityObserver::new();
		assert!(v.on_change(false, t(100), t(0)).is_none());
	}

	#[test]
	fn test_repeated_hidden_keeps_first_timestamp() {
		let mut v = VisibilityObserver::new();
		assert!(v.on_change(true, t(1_000), t(0)).is_some());
		assert!(v.on_change(true, t(2_000), t(0)).is_none());
		let visible = v.on_change(false, t(3_000), t(0)).unwrap();
		assert_eq!(visible.payload.get("timeHidden"), Some(&json!(2000)));
	}

	#[test]
	fn test_clock_going_backwards_clamps_to_zero() {
		let mut v = VisibilityObserver::new();
		v.on_change(true, t(5_000), t(0));
		let visible = v.on_change(false, t(1_000), t(0)).unwrap();
		assert_eq!(visible.payload.get("timeHidden"), Some(&json!(0)));
	}
}
