// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builds canonical [`EventRecord`]s from an event kind and caller payload.

use chrono::{DateTime, Utc};
use pulse_tracker_core::{
	EventId, EventKind, EventRecord, PageContext, PageView, Payload, Session, SessionMetadata,
	RESERVED_KEYS,
};
use tracing::debug;

/// Stamps identity and page context onto payloads.
///
/// Pure construction: the caller decides what to do with the record.
#[derive(Debug, Clone)]
pub struct EventNormalizer {
	session: Session,
	page_view: PageView,
	metadata: Option<SessionMetadata>,
}

impl EventNormalizer {
	/// `metadata` is attached to the first record produced and then dropped.
	pub fn new(session: Session, page_view: PageView, metadata: SessionMetadata) -> Self {
		Self {
			session,
			page_view,
			metadata: Some(metadata),
		}
	}

	pub fn session(&self) -> &Session {
		&self.session
	}

	pub fn page_view(&self) -> &PageView {
		&self.page_view
	}

	/// True until the first record of this page view has been produced.
	pub fn metadata_pending(&self) -> bool {
		self.metadata.is_some()
	}

	pub fn normalize(
		&mut self,
		kind: &EventKind,
		payload: Payload,
		now: DateTime<Utc>,
		page: PageContext,
	) -> EventRecord {
		let mut payload = payload;
		for key in RESERVED_KEYS {
			if payload.remove(key).is_some() {
				debug!(event_type = %kind, key, "Dropped reserved key from event payload");
			}
		}

		EventRecord {
			event_id: EventId::new(),
			event_type: kind.as_type(),
			timestamp: now,
			session_id: self.session.session_id.clone(),
			page_view_id: self.page_view.page_view_id.clone(),
			url: page.url,
			pathname: page.pathname,
			referrer: page.referrer,
			metadata: self.metadata.take(),
			payload: payload.into_map(),
		}
	}
}
