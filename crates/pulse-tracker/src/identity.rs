// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session and page-view identity.

use chrono::{DateTime, Utc};
use pulse_tracker_core::{PageView, Session, SessionId};
use tracing::{debug, warn};

use crate::env::{KeyValueStore, SESSION_STORAGE_KEY};

/// Resolves the browsing session and mints page-view ids.
///
/// Never fails: if session storage cannot be read or written, the session
/// lives only in memory for this page load.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProvider;

impl IdentityProvider {
	/// Returns the stored session, creating and persisting one if absent.
	pub fn session(&self, store: &dyn KeyValueStore, now: DateTime<Utc>) -> Session {
		match store.get(SESSION_STORAGE_KEY) {
			Ok(Some(raw)) => {
				if let Some(session) = parse_stored(&raw, now) {
					debug!(session_id = %session.session_id, "Reusing stored session");
					return session;
				}
				warn!("Discarding unreadable stored session token");
			}
			Ok(None) => {}
			Err(e) => {
				warn!(error = %e, "Session storage unavailable, using in-memory session");
				return Session::start(now).into_ephemeral();
			}
		}

		let session = Session::start(now);
		match serde_json::to_string(&session) {
			Ok(encoded) => {
				if let Err(e) = store.set(SESSION_STORAGE_KEY, &encoded) {
					warn!(error = %e, "Failed to persist session, using in-memory session");
					return session.into_ephemeral();
				}
			}
			Err(e) => {
				warn!(error = %e, "Failed to encode session, using in-memory session");
				return session.into_ephemeral();
			}
		}
		debug!(session_id = %session.session_id, "Started new session");
		session
	}

	/// Mints a fresh page view. Never persisted.
	pub fn new_page_view(&self, now: DateTime<Utc>) -> PageView {
		PageView::new(now)
	}
}

/// Accepts the JSON form written by [`IdentityProvider::session`] and the
/// bare-string token written by earlier tracker builds.
fn parse_stored(raw: &str, now: DateTime<Utc>) -> Option<Session> {
	if let Ok(session) = serde_json::from_str::<Session>(raw) {
		return Some(session);
	}
	if raw.trim_start().starts_with('{') {
		return None;
	}
	let session_id: SessionId = raw.parse().ok()?;
	Some(Session {
		session_id,
		started_at: now,
		ephemeral: false,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::env::{MemoryStore, UnavailableStore};
	use crate::error::{Result, TrackerError};
	use chrono::{Duration, TimeZone};

	fn t0() -> DateTime<Utc> {
		Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
	}

	#[test]
	fn test_creates_and_persists_session() {
		let store = MemoryStore::new();
		let session = IdentityProvider.session(&store, t0());
		assert!(!session.ephemeral);
		let stored = store.get(SESSION_STORAGE_KEY).unwrap().unwrap();
		assert!(stored.contains(session.session_id.as_str()));
	}

	#[test]
	fn test_sequential_page_loads_share_session_but_not_page_view() {
		let store = MemoryStore::new();
		let provider = IdentityProvider;

		let first = provider.session(&store, t0());
		let first_view = provider.new_page_view(t0());

		let later = t0() + Duration::seconds(30);
		let second = provider.session(&store, later);
		let second_view = provider.new_page_view(later);

		assert_eq!(first.session_id, second.session_id);
		assert_eq!(second.started_at, t0());
		assert_ne!(first_view.page_view_id, second_view.page_view_id);
	}

	#[test]
	fn test_legacy_plain_token_is_reused() {
		let store = MemoryStore::new();
		store
			.set(SESSION_STORAGE_KEY, "session_1700000000000_abc123def")
			.unwrap();
		let session = IdentityProvider.session(&store, t0());
		assert_eq!(session.session_id.as_str(), "session_1700000000000_abc123def");
		assert_eq!(session.started_at, t0());
	}

	#[test]
	fn test_garbage_token_is_replaced() {
		let store = MemoryStore::new();
		store.set(SESSION_STORAGE_KEY, "   ").unwrap();
		let session = IdentityProvider.session(&store, t0());
		assert!(session.session_id.as_str().starts_with("session_"));
		let stored = store.get(SESSION_STORAGE_KEY).unwrap().unwrap();
		assert!(stored.contains(session.session_id.as_str()));
	}

	#[test]
	fn test_unavailable_storage_degrades_to_ephemeral() {
		let session = IdentityProvider.session(&UnavailableStore, t0());
		assert!(session.ephemeral);
	}

	struct ReadOnlyStore;

	impl KeyValueStore for ReadOnlyStore {
		fn get(&self, _key: &str) -> Result<Option<String>> {
			Ok(None)
		}

		fn set(&self, _key: &str, _value: &str) -> Result<()> {
			Err(TrackerError::StorageUnavailable("quota exceeded".to_string()))
		}
	}

	#[test]
	fn test_failed_write_degrades_to_ephemeral() {
		let session = IdentityProvider.session(&ReadOnlyStore, t0());
		assert!(session.ephemeral);
	}
}
