// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Page-view start and unload records.

use chrono::{DateTime, Utc};
use pulse_tracker_core::{EventKind, Payload};

use super::Observation;

/// What the host knows about the document when tracking starts.
#[derive(Debug, Clone, Default)]
pub struct PageViewDetails {
	pub title: Option<String>,
	pub load_time_ms: Option<u64>,
	pub session_started_at: Option<DateTime<Utc>>,
}

/// The `page_view` record emitted once when tracking starts.
pub fn page_view(details: PageViewDetails) -> Observation {
	Observation::new(
		EventKind::PageView,
		Payload::new()
			.insert_opt("title", details.title)
			.insert_opt("loadTime", details.load_time_ms)
			.insert_opt(
				"sessionStartTime",
				details.session_started_at.map(|t| t.timestamp_millis()),
			),
	)
}

/// Time spent on the page, emitted at unload when page views are tracked.
pub fn page_time(time_spent_ms: u64) -> Observation {
	Observation::new(
		EventKind::PageTime,
		Payload::new()
			.insert("timeSpent", time_spent_ms)
			.insert("timeSpentSeconds", (time_spent_ms + 500) / 1000),
	)
}

/// The `page_unload` summary.
///
/// `total_events` counts records tracked during this page view before the
/// summary itself.
pub fn page_unload(total_time_ms: u64, total_events: u64, max_scroll_depth: u8) -> Observation {
	Observation::new(
		EventKind::PageUnload,
		Payload::new()
			.insert("totalTimeOnPage", total_time_ms)
			.insert("totalEvents", total_events)
			.insert("maxScrollDepth", max_scroll_depth),
	)
}
