// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the tracker core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building tracker configuration or parsing identifiers.
#[derive(Debug, Error)]
pub enum CoreError {
	/// I/O error reading a config file.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// TOML parsing error.
	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// An environment variable held a value that could not be parsed.
	#[error("invalid value in environment variable {var}: {value}")]
	Env { var: String, value: String },

	/// A configuration value is out of range.
	#[error("invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },

	/// An identifier did not have the expected shape.
	#[error("invalid {kind} identifier: {value}")]
	InvalidId { kind: &'static str, value: String },
}

impl CoreError {
	/// Create an invalid value error.
	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
