// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Canonical event records and the event-type vocabulary.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::context::SessionMetadata;
use crate::ids::{EventId, PageViewId, SessionId};

/// Prefix that namespaces events emitted through the public `track` API.
pub const CUSTOM_EVENT_PREFIX: &str = "custom_";

/// Name substituted when `track` is called with a blank event name.
pub const UNNAMED_CUSTOM_EVENT: &str = "unnamed";

/// Top-level keys owned by the record itself. Payload entries with these
/// keys are discarded during normalization so identifying fields always win.
pub const RESERVED_KEYS: &[&str] = &[
	"eventId",
	"eventType",
	"timestamp",
	"sessionId",
	"pageViewId",
	"url",
	"pathname",
	"referrer",
	"viewport",
	"screen",
	"userAgent",
];

/// Every event type the tracker emits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
	PageView,
	Click,
	Scroll,
	ScrollDepth,
	PageHidden,
	PageVisible,
	RageClick,
	PageTime,
	PageUnload,
	/// Emitted by an external integration through `track`; holds the bare name.
	Custom(String),
}

impl EventKind {
	/// Builds a custom kind from a caller-supplied name, trimming whitespace
	/// and substituting [`UNNAMED_CUSTOM_EVENT`] for blank names.
	pub fn custom(name: &str) -> Self {
		let trimmed = name.trim();
		if trimmed.is_empty() {
			Self::Custom(UNNAMED_CUSTOM_EVENT.to_string())
		} else {
			Self::Custom(trimmed.to_string())
		}
	}

	/// Wire name of the event type.
	pub fn as_type(&self) -> String {
		match self {
			Self::PageView => "page_view".to_string(),
			Self::Click => "click".to_string(),
			Self::Scroll => "scroll".to_string(),
			Self::ScrollDepth => "scroll_depth".to_string(),
			Self::PageHidden => "page_hidden".to_string(),
			Self::PageVisible => "page_visible".to_string(),
			Self::RageClick => "rage_click".to_string(),
			Self::PageTime => "page_time".to_string(),
			Self::PageUnload => "page_unload".to_string(),
			Self::Custom(name) => format!("{CUSTOM_EVENT_PREFIX}{name}"),
		}
	}

	pub fn is_custom(&self) -> bool {
		matches!(self, Self::Custom(_))
	}
}

impl fmt::Display for EventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.as_type())
	}
}

/// One tracked occurrence, ready for delivery.
///
/// Serialized as a flat JSON object: identifying fields, then the optional
/// metadata block, then the payload entries at the top level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
	pub event_id: EventId,
	pub event_type: String,
	#[serde(serialize_with = "serialize_millis")]
	pub timestamp: DateTime<Utc>,
	pub session_id: SessionId,
	pub page_view_id: PageViewId,
	pub url: String,
	pub pathname: String,
	pub referrer: Option<String>,
	#[serde(flatten)]
	pub metadata: Option<SessionMetadata>,
	#[serde(flatten)]
	pub payload: Map<String, Value>,
}

impl EventRecord {
	/// Returns a payload field by key.
	pub fn field(&self, key: &str) -> Option<&Value> {
		self.payload.get(key)
	}

	pub fn has_metadata(&self) -> bool {
		self.metadata.is_some()
	}
}

fn serialize_millis<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_i64(ts.timestamp_millis())
}
