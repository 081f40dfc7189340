// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rage-click detection.
//!
//! A trailing-edge debounce: every click on the current target pushes the
//! deadline out by one window. When the window closes in silence, a
//! `rage_click` is emitted if the run reached the threshold. The detector is
//! driven entirely by the timestamps it is given; the tracker calls
//! [`RageClickDetector::poll`] when [`RageClickDetector::deadline`] passes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pulse_tracker_core::{EventKind, Payload};
use serde_json::Value;

use super::click::descriptor;
use super::Observation;
use crate::clock;
use crate::signal::{ElementInfo, TargetId};

/// Element text kept in the rage-click descriptor, in characters.
pub const RAGE_CLICK_TEXT_LIMIT: usize = 50;

#[derive(Debug, Clone)]
enum State {
	Idle,
	Counting {
		target: TargetId,
		element: Value,
		count: u32,
		deadline: DateTime<Utc>,
	},
}

#[derive(Debug, Clone)]
pub struct RageClickDetector {
	threshold: u32,
	window: Duration,
	state: State,
}

impl RageClickDetector {
	pub fn new(threshold: u32, window: Duration) -> Self {
		Self {
			threshold,
			window,
			state: State::Idle,
		}
	}

	/// Feeds one click. May return a rage click that completed before this
	/// click arrived, either because the window had already closed or
	/// because the target changed after the threshold was reached.
	pub fn on_click(
		&mut self,
		target: TargetId,
		element: &ElementInfo,
		now: DateTime<Utc>,
	) -> Option<Observation> {
		let expired = self.poll(now);
		let deadline = clock::add(now, self.window);

		let previous = std::mem::replace(&mut self.state, State::Idle);
		let (state, pending) = match previous {
			State::Counting {
				target: current,
				element: el,
				count,
				..
			} if current == target => (
				State::Counting {
					target,
					element: el,
					count: count.saturating_add(1),
					deadline,
				},
				None,
			),
			State::Counting {
				element: el, count, ..
			} => {
				let pending = (count >= self.threshold).then(|| rage_click(el, count));
				(self.start(target, element, deadline), pending)
			}
			State::Idle => (self.start(target, element, deadline), None),
		};
		self.state = state;

		expired.or(pending)
	}

	/// Closes the window if its deadline has passed.
	pub fn poll(&mut self, now: DateTime<Utc>) -> Option<Observation> {
		let expired = matches!(&self.state, State::Counting { deadline, .. } if now >= *deadline);
		if expired {
			self.finish()
		} else {
			None
		}
	}

	/// Closes the open window immediately, e.g. at page teardown.
	pub fn finish(&mut self) -> Option<Observation> {
		match std::mem::replace(&mut self.state, State::Idle) {
			State::Counting { element, count, .. } if count >= self.threshold => {
				Some(rage_click(element, count))
			}
			_ => None,
		}
	}

	/// When the open window closes, if one is open.
	pub fn deadline(&self) -> Option<DateTime<Utc>> {
		match &self.state {
			State::Counting { deadline, .. } => Some(*deadline),
			State::Idle => None,
		}
	}

	/// Clicks counted in the open window.
	pub fn count(&self) -> u32 {
		match &self.state {
			State::Counting { count, .. } => *count,
			State::Idle => 0,
		}
	}

	fn start(&self, target: TargetId, element: &ElementInfo, deadline: DateTime<Utc>) -> State {
		State::Counting {
			target,
			element: descriptor(element, RAGE_CLICK_TEXT_LIMIT),
			count: 1,
			deadline,
		}
	}
}

fn rage_click(element: Value, count: u32) -> Observation {
	Observation::new(
		EventKind::RageClick,
		Payload::new()
			.insert("element", element)
			.insert("clickCount", count),
	)
}
