// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the tracker runtime.
//!
//! None of these reach the host page through the tracking API: `track`,
//! `handle_signal` and `tick` log and absorb them. They surface only from
//! construction (`TrackerBuilder::build`) and from explicit awaited calls
//! such as `Tracker::flush`.

use pulse_tracker_core::CoreError;
use thiserror::Error;

/// Tracker runtime errors.
#[derive(Debug, Error)]
pub enum TrackerError {
	/// Configuration could not be loaded or failed validation.
	#[error("configuration error: {0}")]
	Config(#[from] CoreError),

	/// A required builder component was not supplied.
	#[error("missing tracker component: {0}")]
	MissingComponent(&'static str),

	/// HTTP request failed before a response arrived.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// The collector answered with a non-success status.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	/// Session or local storage could not be read or written.
	#[error("storage unavailable: {0}")]
	StorageUnavailable(String),

	/// A send was requested outside a tokio runtime.
	#[error("no async runtime available to perform the send")]
	NoRuntime,

	/// Serialization error.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// The tracker has been shut down.
	#[error("tracker has been shut down")]
	Shutdown,
}

impl TrackerError {
	/// Transport-level failure: the records stay buffered for the next flush.
	pub fn is_transport_failure(&self) -> bool {
		matches!(
			self,
			Self::RequestFailed(_) | Self::ServerError { .. } | Self::NoRuntime
		)
	}
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
