// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Pulse behavioral telemetry tracker.
//!
//! This crate holds the data model shared by the runtime tracker and any
//! tooling that produces or inspects its output:
//!
//! - [`Session`] / [`PageView`] identity records and their id newtypes
//! - [`EventRecord`], the canonical wire record, and [`EventKind`]
//! - [`SessionMetadata`] and [`PageContext`] attached during normalization
//! - [`Payload`], the free-form caller data builder
//! - [`TrackerConfig`] and its layered loader
//! - [`scroll_percent`], the guarded scroll-depth computation

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod ids;
pub mod payload;
pub mod scroll;
pub mod session;

pub use config::{ScrollMode, TrackerConfig, TrackerConfigLayer};
pub use context::{pathname_of, Dimensions, PageContext, SessionMetadata};
pub use error::{CoreError, Result};
pub use event::{EventKind, EventRecord, CUSTOM_EVENT_PREFIX, RESERVED_KEYS};
pub use ids::{EventId, PageViewId, SessionId};
pub use payload::Payload;
pub use scroll::{scroll_percent, ScrollMetrics};
pub use session::{PageView, Session};
