// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scroll depth tracking.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pulse_tracker_core::{EventKind, Payload, ScrollMetrics, ScrollMode};

use super::Observation;
use crate::clock;

/// Quiet period after the last scroll signal before a `scroll` record is
/// sampled.
pub const SCROLL_SETTLE: Duration = Duration::from_millis(100);

/// Tracks the deepest scroll position of the page view.
///
/// In [`ScrollMode::Summary`] nothing is emitted until unload. In
/// [`ScrollMode::Throttled`] each burst of scroll signals is sampled once it
/// has been quiet for [`SCROLL_SETTLE`], so the record carries where scrolling
/// came to rest; a sample falling inside the throttle interval of the previous
/// record is dropped. Every signal still updates the maximum depth.
#[derive(Debug, Clone)]
pub struct ScrollObserver {
	mode: ScrollMode,
	throttle: Duration,
	max_depth: u8,
	last_emitted_at: Option<DateTime<Utc>>,
	pending: Option<(ScrollMetrics, DateTime<Utc>)>,
}

impl ScrollObserver {
	pub fn new(mode: ScrollMode, throttle: Duration) -> Self {
		Self {
			mode,
			throttle,
			max_depth: 0,
			last_emitted_at: None,
			pending: None,
		}
	}

	pub fn on_scroll(&mut self, metrics: &ScrollMetrics, now: DateTime<Utc>) {
		self.max_depth = self.max_depth.max(metrics.percent());
		if self.mode == ScrollMode::Throttled {
			self.pending = Some((*metrics, clock::add(now, SCROLL_SETTLE)));
		}
	}

	/// Samples the settled position once its quiet period has passed.
	pub fn poll(&mut self, now: DateTime<Utc>) -> Option<Observation> {
		match self.pending {
			Some((_, due)) if due <= now => {}
			_ => return None,
		}
		let (metrics, _) = self.pending.take()?;
		if let Some(last) = self.last_emitted_at {
			if clock::elapsed(last, now) < self.throttle {
				return None;
			}
		}
		self.last_emitted_at = Some(now);

		Some(Observation::new(
			EventKind::Scroll,
			Payload::new()
				.insert("scrollTop", sanitize(metrics.scroll_top))
				.insert("scrollHeight", sanitize(metrics.scroll_height))
				.insert("clientHeight", sanitize(metrics.client_height))
				.insert("scrollPercent", metrics.percent())
				.insert("maxScrollDepth", self.max_depth),
		))
	}

	/// When the pending sample is due, if one is waiting.
	pub fn deadline(&self) -> Option<DateTime<Utc>> {
		self.pending.map(|(_, due)| due)
	}

	/// Deepest percentage reached so far, `0..=100`.
	pub fn max_depth(&self) -> u8 {
		self.max_depth
	}

	/// The `scroll_depth` record emitted at unload.
	pub fn summary(&self) -> Observation {
		Observation::new(
			EventKind::ScrollDepth,
			Payload::new().insert("maxScrollDepth", self.max_depth),
		)
	}
}

/// Non-finite geometry is reported as zero; JSON has no NaN.
fn sanitize(value: f64) -> f64 {
	if value.is_finite() {
		value
	} else {
		0.0
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
	fn test_summary_mode_tracks_max_without_emitting() {
		let mut s = ScrollObserver::new(ScrollMode::Summary, Duration::from_millis(500));
		s.on_scroll(&ScrollMetrics::new(500.0, 2000.0, 1000.0), t(0));
		s.on_scroll(&ScrollMetrics::new(100.0, 2000.0, 1000.0), t(10));
		assert_eq!(s.max_depth(), 50);

		let summary = s.summary();
		assert_eq!(summary.kind, EventKind::ScrollDepth);
		assert_eq!(summary.payload.get("maxScrollDepth"), Some(&json!(50)));
	}

	fn sample(s: &mut ScrollObserver, top: f64, at: i64) -> Option<Observation> {
		s.on_scroll(&ScrollMetrics::new(top, 2000.0, 1000.0), t(at));
		s.poll(t(at + 100))
	}

	#[test]
	fn test_throttled_mode_samples_where_scrolling_settles() {
		let mut s = ScrollObserver::new(ScrollMode::Throttled, Duration::from_millis(500));
		s.on_scroll(&ScrollMetrics::new(100.0, 2000.0, 1000.0), t(0));
		s.on_scroll(&ScrollMetrics::new(400.0, 2000.0, 1000.0), t(60));
		s.on_scroll(&ScrollMetrics::new(300.0, 2000.0, 1000.0), t(120));
		assert_eq!(s.deadline(), Some(t(220)));
		assert!(s.poll(t(219)).is_none());

		let settled = s.poll(t(220)).unwrap();
		assert_eq!(settled.kind, EventKind::Scroll);
		assert_eq!(settled.payload.get("scrollTop"), Some(&json!(300.0)));
		assert_eq!(settled.payload.get("scrollPercent"), Some(&json!(30)));
		assert_eq!(settled.payload.get("maxScrollDepth"), Some(&json!(40)));
		assert_eq!(s.deadline(), None);
		assert!(s.poll(t(5000)).is_none());
	}

	#[test]
	fn test_throttled_mode_spaces_samples() {
		let mut s = ScrollObserver::new(ScrollMode::Throttled, Duration::from_millis(500));
		assert!(sample(&mut s, 250.0, 0).is_some());

		assert!(sample(&mut s, 900.0, 300).is_none());
		assert_eq!(s.max_depth(), 90);

		let next = sample(&mut s, 600.0, 500).unwrap();
		assert_eq!(next.payload.get("scrollPercent"), Some(&json!(60)));
		assert_eq!(next.payload.get("maxScrollDepth"), Some(&json!(90)));
	}

	#[test]
	fn test_summary_mode_never_schedules_a_sample() {
		let mut s = ScrollObserver::new(ScrollMode::Summary, Duration::from_millis(500));
		s.on_scroll(&ScrollMetrics::new(500.0, 2000.0, 1000.0), t(0));
		assert_eq!(s.deadline(), None);
		assert!(s.poll(t(1000)).is_none());
	}

	#[test]
	fn test_unscrollable_page_reports_zero() {
		let mut s = ScrollObserver::new(ScrollMode::Throttled, Duration::from_millis(500));
		s.on_scroll(&ScrollMetrics::new(0.0, 1000.0, 1000.0), t(0));
		let obs = s.poll(t(100)).unwrap();
		assert_eq!(obs.payload.get("scrollPercent"), Some(&json!(0)));
		assert_eq!(s.max_depth(), 0);
	}

	#[test]
	fn test_non_finite_geometry_is_zeroed() {
		let mut s = ScrollObserver::new(ScrollMode::Throttled, Duration::from_millis(500));
		s.on_scroll(&ScrollMetrics::new(f64::NAN, f64::INFINITY, 1000.0), t(0));
		let obs = s.poll(t(100)).unwrap();
		assert_eq!(obs.payload.get("scrollTop"), Some(&json!(0.0)));
		assert_eq!(obs.payload.get("scrollHeight"), Some(&json!(0.0)));
	}
}
