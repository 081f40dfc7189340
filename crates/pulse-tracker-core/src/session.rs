// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session and page-view identity records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{PageViewId, SessionId};

/// A browsing session spanning every page load until session storage is cleared.
///
/// Immutable once created. The tracker never destroys a session; the host's
/// session-storage lifecycle does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	pub session_id: SessionId,
	#[serde(with = "chrono::serde::ts_milliseconds")]
	pub started_at: DateTime<Utc>,
	/// True when storage was unavailable and the session lives only in memory.
	#[serde(skip)]
	pub ephemeral: bool,
}

impl Session {
	/// Starts a new session at `now`.
	pub fn start(now: DateTime<Utc>) -> Self {
		Self {
			session_id: SessionId::generate(),
			started_at: now,
			ephemeral: false,
		}
	}

	/// Marks the session as memory-only (builder pattern).
	pub fn into_ephemeral(mut self) -> Self {
		self.ephemeral = true;
		self
	}

	/// Milliseconds elapsed since the session started.
	pub fn duration_ms(&self, now: DateTime<Utc>) -> i64 {
		(now - self.started_at).num_milliseconds().max(0)
	}
}

/// A single document load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
	pub page_view_id: PageViewId,
	#[serde(with = "chrono::serde::ts_milliseconds")]
	pub loaded_at: DateTime<Utc>,
}

impl PageView {
	pub fn new(loaded_at: DateTime<Utc>) -> Self {
		Self {
			page_view_id: PageViewId::generate(),
			loaded_at,
		}
	}

	/// Milliseconds elapsed since the page loaded.
	pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
		(now - self.loaded_at).num_milliseconds().max(0)
	}
}
