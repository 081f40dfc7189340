// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Interaction observers.
//!
//! Each observer turns raw [`crate::signal::DomSignal`]s into zero or more
//! [`Observation`]s. Observers never touch the buffer or the clock directly:
//! the tracker passes `now` in and normalizes whatever comes out, which keeps
//! every debounce and throttle decision deterministic under a manual clock.

mod click;
mod lifecycle;
mod rage_click;
mod scroll;
mod visibility;

pub use click::{classify, truncate_text, ClickObserver, ClickType, MAX_ELEMENT_TEXT};
pub use lifecycle::{page_time, page_unload, page_view, PageViewDetails};
pub use rage_click::{RageClickDetector, RAGE_CLICK_TEXT_LIMIT};
pub use scroll::{ScrollObserver, SCROLL_SETTLE};
pub use visibility::VisibilityObserver;

use pulse_tracker_core::{EventKind, Payload};

/// An event detected by an observer, not yet normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
	pub kind: EventKind,
	pub payload: Payload,
}

impl Observation {
	pub fn new(kind: EventKind, payload: Payload) -> Self {
		Self { kind, payload }
	}
}

/// Treats empty attribute strings as absent, as the DOM reports `""` for
/// unset `id`/`className`.
pub(crate) fn present(value: Option<&str>) -> Option<String> {
	value.filter(|v| !v.is_empty()).map(str::to_string)
}
