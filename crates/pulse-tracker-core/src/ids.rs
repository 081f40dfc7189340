// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier newtypes for sessions, page views and individual events.
//!
//! Session and page-view ids are prefixed strings (`session_…`, `pageview_…`)
//! around a UUIDv7, so they sort by creation time and carry enough randomness
//! to make collisions within one browsing session negligible.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

const SESSION_PREFIX: &str = "session_";
const PAGE_VIEW_PREFIX: &str = "pageview_";

/// Browsing-session scoped identifier, shared by every page load in a tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
	#[must_use]
	pub fn generate() -> Self {
		Self(format!("{SESSION_PREFIX}{}", Uuid::now_v7().simple()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Accepts any non-blank token without whitespace. Stored tokens written by
/// older tracker builds used a different suffix format, so the prefix is not
/// enforced here.
impl FromStr for SessionId {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();
		if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
			return Err(CoreError::InvalidId {
				kind: "session",
				value: s.to_string(),
			});
		}
		Ok(Self(trimmed.to_string()))
	}
}

/// Identifier for a single document load. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageViewId(String);

impl PageViewId {
	#[must_use]
	pub fn generate() -> Self {
		Self(format!("{PAGE_VIEW_PREFIX}{}", Uuid::now_v7().simple()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PageViewId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Per-record identifier. Redelivered records keep their id so the collector
/// can de-duplicate the at-least-once stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::now_v7())
	}
}

impl Default for EventId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for EventId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_generated_session_ids_are_prefixed_and_unique() {
		let a = SessionId::generate();
		let b = SessionId::generate();
		assert!(a.as_str().starts_with("session_"));
		assert_ne!(a, b);
	}

	#[test]
	fn test_generated_page_view_ids_are_prefixed_and_unique() {
		let a = PageViewId::generate();
		let b = PageViewId::generate();
		assert!(a.as_str().starts_with("pageview_"));
		assert_ne!(a, b);
	}

	#[test]
	fn test_session_id_parses_legacy_tokens() {
		let id: SessionId = "session_1700000000000_k3j9x0a1b".parse().unwrap();
		assert_eq!(id.as_str(), "session_1700000000000_k3j9x0a1b");
	}

	#[test]
	fn test_session_id_rejects_blank_and_whitespace() {
		assert!("".parse::<SessionId>().is_err());
		assert!("   ".parse::<SessionId>().is_err());
		assert!("session a".parse::<SessionId>().is_err());
	}

	#[test]
	fn test_session_id_serializes_as_plain_string() {
		let id: SessionId = "session_abc".parse().unwrap();
		assert_eq!(serde_json::to_value(&id).unwrap(), "session_abc");
	}
}
