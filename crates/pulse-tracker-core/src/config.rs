// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracker configuration.
//!
//! Configuration is assembled from layers in increasing precedence:
//! built-in defaults, an optional TOML file, `PULSE_TRACKER_*` environment
//! variables, then explicit overrides supplied by the embedding application.
//! Keys accept snake_case as well as the camelCase names used by the
//! browser-side bootstrap (`trackClicks`, `scrollThrottle`, ...).

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "PULSE_TRACKER_";

pub const DEFAULT_ENDPOINT: &str = "/analytics/events";
pub const DEFAULT_FLUSH_THRESHOLD: usize = 20;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_SCROLL_THROTTLE_MS: u64 = 500;
pub const DEFAULT_RAGE_CLICK_THRESHOLD: u32 = 3;
pub const DEFAULT_RAGE_CLICK_WINDOW_MS: u64 = 1_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// How the scroll observer reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollMode {
	/// Track max depth only; report one `scroll_depth` summary at unload.
	#[default]
	Summary,
	/// Additionally emit throttled `scroll` events.
	Throttled,
}

impl FromStr for ScrollMode {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"summary" => Ok(Self::Summary),
			"throttled" => Ok(Self::Throttled),
			other => Err(CoreError::invalid_value(
				"scroll_mode",
				format!("expected 'summary' or 'throttled', got '{other}'"),
			)),
		}
	}
}

/// A partial configuration; unset fields defer to lower layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerConfigLayer {
	#[serde(alias = "trackClicks")]
	pub track_clicks: Option<bool>,
	#[serde(alias = "trackScrolls")]
	pub track_scrolls: Option<bool>,
	#[serde(alias = "trackPageViews")]
	pub track_page_views: Option<bool>,
	#[serde(alias = "trackVisibility")]
	pub track_visibility: Option<bool>,
	#[serde(alias = "trackRageClicks")]
	pub track_rage_clicks: Option<bool>,
	#[serde(alias = "scrollThrottle")]
	pub scroll_throttle_ms: Option<u64>,
	#[serde(alias = "scrollMode")]
	pub scroll_mode: Option<ScrollMode>,
	pub debug: Option<bool>,
	pub endpoint: Option<String>,
	#[serde(alias = "flushThreshold")]
	pub flush_threshold: Option<usize>,
	#[serde(alias = "flushInterval")]
	pub flush_interval_ms: Option<u64>,
	#[serde(alias = "rageClickThreshold")]
	pub rage_click_threshold: Option<u32>,
	#[serde(alias = "rageClickWindow")]
	pub rage_click_window_ms: Option<u64>,
	#[serde(alias = "requestTimeout")]
	pub request_timeout_ms: Option<u64>,
}

impl TrackerConfigLayer {
	/// Overlays `other` on top of `self`.
	pub fn merge(&mut self, other: Self) {
		if other.track_clicks.is_some() {
			self.track_clicks = other.track_clicks;
		}
		if other.track_scrolls.is_some() {
			self.track_scrolls = other.track_scrolls;
		}
		if other.track_page_views.is_some() {
			self.track_page_views = other.track_page_views;
		}
		if other.track_visibility.is_some() {
			self.track_visibility = other.track_visibility;
		}
		if other.track_rage_clicks.is_some() {
			self.track_rage_clicks = other.track_rage_clicks;
		}
		if other.scroll_throttle_ms.is_some() {
			self.scroll_throttle_ms = other.scroll_throttle_ms;
		}
		if other.scroll_mode.is_some() {
			self.scroll_mode = other.scroll_mode;
		}
		if other.debug.is_some() {
			self.debug = other.debug;
		}
		if other.endpoint.is_some() {
			self.endpoint = other.endpoint;
		}
		if other.flush_threshold.is_some() {
			self.flush_threshold = other.flush_threshold;
		}
		if other.flush_interval_ms.is_some() {
			self.flush_interval_ms = other.flush_interval_ms;
		}
		if other.rage_click_threshold.is_some() {
			self.rage_click_threshold = other.rage_click_threshold;
		}
		if other.rage_click_window_ms.is_some() {
			self.rage_click_window_ms = other.rage_click_window_ms;
		}
		if other.request_timeout_ms.is_some() {
			self.request_timeout_ms = other.request_timeout_ms;
		}
	}

	/// Parses a layer from TOML text. `path` is only used in error messages.
	pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self> {
		toml::from_str(contents).map_err(|source| CoreError::TomlParse {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Reads a layer from a TOML file.
	pub fn from_toml_file(path: &Path) -> Result<Self> {
		let contents = std::fs::read_to_string(path)?;
		Self::from_toml_str(&contents, path)
	}

	/// Builds a layer from `PULSE_TRACKER_*` variables using `lookup`.
	pub fn from_env_with<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

		Ok(Self {
			track_clicks: parse_env(&var, "TRACK_CLICKS", parse_bool)?,
			track_scrolls: parse_env(&var, "TRACK_SCROLLS", parse_bool)?,
			track_page_views: parse_env(&var, "TRACK_PAGE_VIEWS", parse_bool)?,
			track_visibility: parse_env(&var, "TRACK_VISIBILITY", parse_bool)?,
			track_rage_clicks: parse_env(&var, "TRACK_RAGE_CLICKS", parse_bool)?,
			scroll_throttle_ms: parse_env(&var, "SCROLL_THROTTLE_MS", |s| s.parse().ok())?,
			scroll_mode: parse_env(&var, "SCROLL_MODE", |s| s.parse().ok())?,
			debug: parse_env(&var, "DEBUG", parse_bool)?,
			endpoint: var("ENDPOINT").filter(|s| !s.trim().is_empty()),
			flush_threshold: parse_env(&var, "FLUSH_THRESHOLD", |s| s.parse().ok())?,
			flush_interval_ms: parse_env(&var, "FLUSH_INTERVAL_MS", |s| s.parse().ok())?,
			rage_click_threshold: parse_env(&var, "RAGE_CLICK_THRESHOLD", |s| s.parse().ok())?,
			rage_click_window_ms: parse_env(&var, "RAGE_CLICK_WINDOW_MS", |s| s.parse().ok())?,
			request_timeout_ms: parse_env(&var, "REQUEST_TIMEOUT_MS", |s| s.parse().ok())?,
		})
	}

	/// Builds a layer from the process environment.
	pub fn from_env() -> Result<Self> {
		Self::from_env_with(|name| std::env::var(name).ok())
	}

	/// Resolves defaults and validates the result.
	pub fn finalize(self) -> Result<TrackerConfig> {
		let config = TrackerConfig {
			track_clicks: self.track_clicks.unwrap_or(true),
			track_scrolls: self.track_scrolls.unwrap_or(true),
			track_page_views: self.track_page_views.unwrap_or(true),
			track_visibility: self.track_visibility.unwrap_or(true),
			track_rage_clicks: self.track_rage_clicks.unwrap_or(true),
			scroll_throttle_ms: self.scroll_throttle_ms.unwrap_or(DEFAULT_SCROLL_THROTTLE_MS),
			scroll_mode: self.scroll_mode.unwrap_or_default(),
			debug: self.debug.unwrap_or(false),
			endpoint: self
				.endpoint
				.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
			flush_threshold: self.flush_threshold.unwrap_or(DEFAULT_FLUSH_THRESHOLD),
			flush_interval_ms: self.flush_interval_ms.unwrap_or(DEFAULT_FLUSH_INTERVAL_MS),
			rage_click_threshold: self
				.rage_click_threshold
				.unwrap_or(DEFAULT_RAGE_CLICK_THRESHOLD),
			rage_click_window_ms: self
				.rage_click_window_ms
				.unwrap_or(DEFAULT_RAGE_CLICK_WINDOW_MS),
			request_timeout_ms: self.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
		};
		config.validate()?;
		Ok(config)
	}
}

fn parse_env<T, V, P>(var: &V, name: &str, parse: P) -> Result<Option<T>>
where
	V: Fn(&str) -> Option<String>,
	P: Fn(&str) -> Option<T>,
{
	match var(name) {
		None => Ok(None),
		Some(raw) => parse(raw.trim()).map(Some).ok_or_else(|| CoreError::Env {
			var: format!("{ENV_PREFIX}{name}"),
			value: raw,
		}),
	}
}

fn parse_bool(s: &str) -> Option<bool> {
	match s.to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}

/// Fully resolved tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerConfig {
	pub track_clicks: bool,
	pub track_scrolls: bool,
	pub track_page_views: bool,
	pub track_visibility: bool,
	pub track_rage_clicks: bool,
	/// Minimum spacing between `scroll` events in throttled mode.
	pub scroll_throttle_ms: u64,
	pub scroll_mode: ScrollMode,
	/// Verbose diagnostics and local mirroring of sent events. Never affects delivery.
	pub debug: bool,
	pub endpoint: String,
	/// Number of unsent records that triggers an immediate flush.
	pub flush_threshold: usize,
	pub flush_interval_ms: u64,
	/// Clicks on one target needed to count as a rage click.
	pub rage_click_threshold: u32,
	/// Inter-click silence that closes a rage-click window.
	pub rage_click_window_ms: u64,
	pub request_timeout_ms: u64,
}

impl Default for TrackerConfig {
	fn default() -> Self {
		Self {
			track_clicks: true,
			track_scrolls: true,
			track_page_views: true,
			track_visibility: true,
			track_rage_clicks: true,
			scroll_throttle_ms: DEFAULT_SCROLL_THROTTLE_MS,
			scroll_mode: ScrollMode::Summary,
			debug: false,
			endpoint: DEFAULT_ENDPOINT.to_string(),
			flush_threshold: DEFAULT_FLUSH_THRESHOLD,
			flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
			rage_click_threshold: DEFAULT_RAGE_CLICK_THRESHOLD,
			rage_click_window_ms: DEFAULT_RAGE_CLICK_WINDOW_MS,
			request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
		}
	}
}

impl TrackerConfig {
	/// Loads defaults, then `path` (if given), then `PULSE_TRACKER_*` variables.
	pub fn load(path: Option<&Path>) -> Result<Self> {
		Self::load_with_overrides(path, TrackerConfigLayer::default())
	}

	/// Like [`TrackerConfig::load`] with a final layer of explicit overrides.
	pub fn load_with_overrides(path: Option<&Path>, overrides: TrackerConfigLayer) -> Result<Self> {
		let mut layer = TrackerConfigLayer::default();
		if let Some(path) = path {
			debug!(path = %path.display(), "Loading tracker config file");
			layer.merge(TrackerConfigLayer::from_toml_file(path)?);
		}
		layer.merge(TrackerConfigLayer::from_env()?);
		layer.merge(overrides);
		layer.finalize()
	}

	pub fn validate(&self) -> Result<()> {
		if self.flush_threshold == 0 {
			return Err(CoreError::invalid_value(
				"flush_threshold",
				"must be at least 1",
			));
		}
		if self.flush_interval_ms == 0 {
			return Err(CoreError::invalid_value(
				"flush_interval_ms",
				"must be greater than zero",
			));
		}
		if self.rage_click_threshold < 2 {
			return Err(CoreError::invalid_value(
				"rage_click_threshold",
				"must be at least 2",
			));
		}
		if self.rage_click_window_ms == 0 {
			return Err(CoreError::invalid_value(
				"rage_click_window_ms",
				"must be greater than zero",
			));
		}
		if self.request_timeout_ms == 0 {
			return Err(CoreError::invalid_value(
				"request_timeout_ms",
				"must be greater than zero",
			));
		}
		if self.endpoint.trim().is_empty() {
			return Err(CoreError::invalid_value("endpoint", "must not be empty"));
		}
		Ok(())
	}

	pub fn flush_interval(&self) -> Duration {
		Duration::from_millis(self.flush_interval_ms)
	}

	pub fn scroll_throttle(&self) -> Duration {
		Duration::from_millis(self.scroll_throttle_ms)
	}

	pub fn rage_click_window(&self) -> Duration {
		Duration::from_millis(self.rage_click_window_ms)
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}
}
