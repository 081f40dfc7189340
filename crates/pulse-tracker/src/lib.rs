// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pulse behavioral telemetry tracker.
//!
//! Observes page interactions forwarded by a host environment, normalizes them
//! into [`EventRecord`]s and delivers them in batches with at-least-once
//! semantics.
//!
//! # Architecture
//!
//! - [`identity`]: session and page-view ids
//! - [`normalizer`]: canonical record construction
//! - [`observers`]: click, scroll, visibility, rage-click and lifecycle detectors
//! - [`dispatcher`]: buffer leases, flush triggers and reconciliation
//! - [`transport`]: HTTP delivery and the unload beacon
//! - [`tracker`]: the public handle tying it together
//!
//! The host implements [`Environment`] and forwards DOM events as
//! [`DomSignal`]s; every time-based decision reads the injected [`Clock`].

pub mod buffer;
pub mod clock;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod identity;
pub mod mirror;
pub mod normalizer;
pub mod observers;
pub mod signal;
pub mod tracker;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use buffer::{EventBuffer, FlushId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{
	DispatchPolicy, DispatchState, Dispatcher, FlushOutcome, FlushRequest, FlushTrigger,
	Reconciliation,
};
pub use env::{
	Environment, KeyValueStore, ListenOptions, MemoryStore, SignalKind, StaticEnvironment,
	UnavailableStore, MIRROR_STORAGE_KEY, SESSION_STORAGE_KEY,
};
pub use error::{Result, TrackerError};
pub use identity::IdentityProvider;
pub use mirror::DebugMirror;
pub use normalizer::EventNormalizer;
pub use signal::{ClickSignal, DomSignal, ElementInfo, TargetId};
pub use tracker::{SessionInfo, Tracker, TrackerBuilder};
pub use transport::{HttpTransport, HttpTransportBuilder, NoopTransport, Transport};

pub use pulse_tracker_core::{
	EventKind, EventRecord, Payload, ScrollMetrics, ScrollMode, TrackerConfig, TrackerConfigLayer,
};
