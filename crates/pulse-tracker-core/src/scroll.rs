// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scroll-depth arithmetic.

use serde::{Deserialize, Serialize};

/// Raw scroll geometry of the document, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
	pub scroll_top: f64,
	pub scroll_height: f64,
	pub client_height: f64,
}

impl ScrollMetrics {
	pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
		Self {
			scroll_top,
			scroll_height,
			client_height,
		}
	}

	/// Depth reached, as a whole percentage. See [`scroll_percent`].
	pub fn percent(&self) -> u8 {
		scroll_percent(self.scroll_top, self.scroll_height, self.client_height)
	}
}

/// `scroll_top / (scroll_height - client_height) * 100`, rounded and clamped
/// to `0..=100`.
///
/// A document that does not scroll (`scroll_height <= client_height`) and any
/// non-finite input resolve to 0.
pub fn scroll_percent(scroll_top: f64, scroll_height: f64, client_height: f64) -> u8 {
	let scrollable = scroll_height - client_height;
	if !scrollable.is_finite() || !scroll_top.is_finite() || scrollable <= 0.0 {
		return 0;
	}
	let percent = (scroll_top / scrollable * 100.0).round();
	percent.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_halfway_is_fifty_percent() {
		assert_eq!(scroll_percent(500.0, 2000.0, 1000.0), 50);
	}

	#[test]
	fn test_bottom_is_one_hundred_percent() {
		assert_eq!(scroll_percent(1000.0, 2000.0, 1000.0), 100);
	}

	#[test]
	fn test_non_scrollable_document_is_zero() {
		assert_eq!(scroll_percent(0.0, 1000.0, 1000.0), 0);
		assert_eq!(scroll_percent(10.0, 800.0, 1000.0), 0);
	}

	#[test]
	fn test_overscroll_is_clamped() {
		assert_eq!(scroll_percent(1500.0, 2000.0, 1000.0), 100);
		assert_eq!(scroll_percent(-40.0, 2000.0, 1000.0), 0);
	}

	#[test]
	fn test_non_finite_inputs_are_zero() {
		assert_eq!(scroll_percent(f64::NAN, 2000.0, 1000.0), 0);
		assert_eq!(scroll_percent(100.0, f64::INFINITY, 1000.0), 0);
	}

	#[test]
	fn test_metrics_delegate_to_percent() {
		assert_eq!(ScrollMetrics::new(250.0, 1500.0, 1000.0).percent(), 50);
	}

	proptest! {
		#[test]
		fn test_percent_is_always_in_range(
			top in -1.0e6f64..1.0e6,
			height in 0.0f64..1.0e6,
			client in 0.0f64..1.0e6,
		) {
			let p = scroll_percent(top, height, client);
			prop_assert!(p <= 100);
		}
	}
}
