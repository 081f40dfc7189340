// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Raw browser signals forwarded by the host.

use pulse_tracker_core::ScrollMetrics;
use serde::{Deserialize, Serialize};

use crate::env::SignalKind;

/// Stable identity of a DOM node for the lifetime of the document.
///
/// The host assigns these (e.g. from a `WeakMap` counter); the tracker only
/// compares them for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub u64);

/// Attributes of a clicked element. Every attribute is optional: hosts
/// report whatever they could read, and missing values are recorded as null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementInfo {
	pub tag_name: Option<String>,
	pub id: Option<String>,
	pub class_name: Option<String>,
	/// Rendered inner text, untruncated.
	pub text: Option<String>,
	pub href: Option<String>,
	/// `type` attribute (`submit`, `checkbox`, ...).
	#[serde(rename = "type")]
	pub input_type: Option<String>,
	pub name: Option<String>,
	/// ARIA role.
	pub role: Option<String>,
}

impl ElementInfo {
	pub fn new(tag_name: impl Into<String>) -> Self {
		Self {
			tag_name: Some(tag_name.into()),
			..Default::default()
		}
	}

	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}

	pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
		self.class_name = Some(class_name.into());
		self
	}

	pub fn with_text(mut self, text: impl Into<String>) -> Self {
		self.text = Some(text.into());
		self
	}

	pub fn with_href(mut self, href: impl Into<String>) -> Self {
		self.href = Some(href.into());
		self
	}

	pub fn with_type(mut self, input_type: impl Into<String>) -> Self {
		self.input_type = Some(input_type.into());
		self
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn with_role(mut self, role: impl Into<String>) -> Self {
		self.role = Some(role.into());
		self
	}

	/// Upper-cased tag name, or `None` when blank.
	pub fn tag(&self) -> Option<String> {
		self.tag_name
			.as_deref()
			.map(str::trim)
			.filter(|t| !t.is_empty())
			.map(str::to_ascii_uppercase)
	}
}

/// One physical click.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickSignal {
	pub target: TargetId,
	#[serde(default)]
	pub element: ElementInfo,
	#[serde(default)]
	pub x: f64,
	#[serde(default)]
	pub y: f64,
	#[serde(default)]
	pub page_x: f64,
	#[serde(default)]
	pub page_y: f64,
}

impl ClickSignal {
	pub fn new(target: TargetId, element: ElementInfo) -> Self {
		Self {
			target,
			element,
			x: 0.0,
			y: 0.0,
			page_x: 0.0,
			page_y: 0.0,
		}
	}

	/// Sets viewport coordinates; page coordinates default to the same values.
	pub fn at(mut self, x: f64, y: f64) -> Self {
		self.x = x;
		self.y = y;
		self.page_x = x;
		self.page_y = y;
		self
	}

	pub fn at_page(mut self, page_x: f64, page_y: f64) -> Self {
		self.page_x = page_x;
		self.page_y = page_y;
		self
	}
}

/// A DOM event forwarded by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomSignal {
	Click(ClickSignal),
	Scroll(ScrollMetrics),
	/// `visibilitychange`; `hidden` mirrors `document.hidden`.
	Visibility { hidden: bool },
	/// `pagehide` / `beforeunload`.
	Unload,
}

impl DomSignal {
	pub fn kind(&self) -> SignalKind {
		match self {
			Self::Click(_) => SignalKind::Click,
			Self::Scroll(_) => SignalKind::Scroll,
			Self::Visibility { .. } => SignalKind::VisibilityChange,
			Self::Unload => SignalKind::Unload,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tag_is_normalized() {
		assert_eq!(ElementInfo::new("a").tag().as_deref(), Some("A"));
		assert_eq!(ElementInfo::new("  ").tag(), None);
		assert_eq!(ElementInfo::default().tag(), None);
	}

	#[test]
	fn test_signal_kinds() {
		let click = DomSignal::Click(ClickSignal::new(TargetId(1), ElementInfo::new("div")));
		assert_eq!(click.kind(), SignalKind::Click);
		assert_eq!(DomSignal::Unload.kind(), SignalKind::Unload);
		assert_eq!(
			DomSignal::Visibility { hidden: true }.kind(),
			SignalKind::VisibilityChange
		);
	}

	#[test]
	fn test_signals_deserialize_from_tagged_json() {
		let click: DomSignal = serde_json::from_str(
			r#"{"type":"click","target":7,"element":{"tagName":"BUTTON","text":"Buy"},"x":10,"y":20}"#,
		)
		.unwrap();
		match click {
			DomSignal::Click(c) => {
				assert_eq!(c.target, TargetId(7));
				assert_eq!(c.element.text.as_deref(), Some("Buy"));
				assert_eq!(c.x, 10.0);
			}
			other => panic!("unexpected signal {other:?}"),
		}

		let scroll: DomSignal = serde_json::from_str(
			r#"{"type":"scroll","scrollTop":500,"scrollHeight":2000,"clientHeight":1000}"#,
		)
		.unwrap();
		assert!(matches!(scroll, DomSignal::Scroll(m) if m.percent() == 50));

		let hidden: DomSignal = serde_json::from_str(r#"{"type":"visibility","hidden":true}"#).unwrap();
		assert_eq!(hidden, DomSignal::Visibility { hidden: true });
	}

	#[test]
	fn test_element_deserializes_with_missing_fields() {
		let el: ElementInfo = serde_json::from_str(r#"{"type":"submit"}"#).unwrap();
		assert_eq!(el.input_type.as_deref(), Some("submit"));
		assert_eq!(el.tag_name, None);
	}
}
