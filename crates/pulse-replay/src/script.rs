// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Replay script format.
//!
//! One JSON object per line, each with a millisecond offset `at` and exactly
//! one action:
//!
//! ```text
//! {"at": 0,    "signal": {"type": "click", "target": 1, "element": {"tagName": "BUTTON"}}}
//! {"at": 120,  "track": {"name": "add_to_cart", "data": {"productId": "sku-42"}}}
//! {"at": 900,  "navigate": {"url": "https://shop.example/cart"}}
//! {"at": 4000, "reload": {"url": "https://shop.example/checkout"}}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Offsets must not
//! decrease.

use std::path::Path;

use anyhow::{bail, Context, Result};
use pulse_tracker::DomSignal;
use serde::Deserialize;
use serde_json::Value;

/// One replay action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
	/// Forward a DOM signal to the current page's tracker.
	Signal(DomSignal),
	/// Call `track` on the current page's tracker.
	Track { name: String, data: Value },
	/// Client-side navigation: new URL, same page view.
	Navigate { url: String },
	/// Unload the current page and load `url` in the same browsing session.
	Reload { url: String },
}

/// An action at an offset from the start of the replay.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
	pub at_ms: u64,
	pub action: Action,
	pub line: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLine {
	at: u64,
	signal: Option<DomSignal>,
	track: Option<RawTrack>,
	navigate: Option<RawUrl>,
	reload: Option<RawUrl>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
	name: String,
	#[serde(default)]
	data: Value,
}

#[derive(Debug, Deserialize)]
struct RawUrl {
	url: String,
}

impl RawLine {
	fn into_action(self) -> Result<Action> {
		let mut actions = Vec::with_capacity(1);
		if let Some(signal) = self.signal {
			actions.push(Action::Signal(signal));
		}
		if let Some(track) = self.track {
			actions.push(Action::Track {
				name: track.name,
				data: track.data,
			});
		}
		if let Some(nav) = self.navigate {
			actions.push(Action::Navigate { url: nav.url });
		}
		if let Some(reload) = self.reload {
			actions.push(Action::Reload { url: reload.url });
		}
		match actions.len() {
			1 => Ok(actions.remove(0)),
			0 => bail!("expected one of signal, track, navigate or reload"),
			n => bail!("expected exactly one action, found {n}"),
		}
	}
}

/// Parses script text.
pub fn parse(contents: &str) -> Result<Vec<Step>> {
	let mut steps = Vec::new();
	let mut last_at = 0u64;

	for (idx, raw) in contents.lines().enumerate() {
		let line = idx + 1;
		let trimmed = raw.trim();
		if trimmed.is_empty() || trimmed.starts_with('#') {
			continue;
		}

		let parsed: RawLine =
			serde_json::from_str(trimmed).with_context(|| format!("line {line}: invalid JSON"))?;
		let at_ms = parsed.at;
		if at_ms < last_at {
			bail!("line {line}: offset {at_ms} ms is earlier than previous offset {last_at} ms");
		}
		last_at = at_ms;

		let action = parsed
			.into_action()
			.with_context(|| format!("line {line}"))?;
		steps.push(Step {
			at_ms,
			action,
			line,
		});
	}

	Ok(steps)
}

/// Reads and parses a script file.
pub fn load(path: &Path) -> Result<Vec<Step>> {
	let contents = std::fs::read_to_string(path)
		.with_context(|| format!("failed to read script {}", path.display()))?;
	parse(&contents).with_context(|| format!("invalid script {}", path.display()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use pulse_tracker::{ScrollMetrics, TargetId};
	use serde_json::json;
	use std::io::Write;

	#[test]
	fn test_parses_every_action_kind() {
		let script = r#"
# a comment
{"at": 0, "signal": {"type": "click", "target": 3, "element": {"tagName": "A", "href": "/p/1"}}}
{"at": 10, "signal": {"type": "scroll", "scrollTop": 500, "scrollHeight": 2000, "clientHeight": 1000}}
{"at": 20, "track": {"name": "add_to_cart", "data": {"productId": "sku-42"}}}
{"at": 20, "track": {"name": "ping"}}

{"at": 30, "navigate": {"url": "https://shop.example/cart"}}
{"at": 40, "signal": {"type": "visibility", "hidden": true}}
{"at": 50, "reload": {"url": "https://shop.example/checkout"}}
{"at": 60, "signal": {"type": "unload"}}
"#;
		let steps = parse(script).unwrap();
		assert_eq!(steps.len(), 8);

		match &steps[0].action {
			Action::Signal(DomSignal::Click(click)) => assert_eq!(click.target, TargetId(3)),
			other => panic!("unexpected {other:?}"),
		}
		assert_eq!(
			steps[1].action,
			Action::Signal(DomSignal::Scroll(ScrollMetrics::new(500.0, 2000.0, 1000.0)))
		);
		assert_eq!(
			steps[2].action,
			Action::Track {
				name: "add_to_cart".to_string(),
				data: json!({"productId": "sku-42"}),
			}
		);
		assert_eq!(
			steps[3].action,
			Action::Track {
				name: "ping".to_string(),
				data: Value::Null,
			}
		);
		assert_eq!(steps[4].line, 8);
		assert_eq!(
			steps[6].action,
			Action::Reload {
				url: "https://shop.example/checkout".to_string()
			}
		);
		assert_eq!(steps[7].action, Action::Signal(DomSignal::Unload));
	}

	#[test]
	fn test_rejects_lines_without_exactly_one_action() {
		let err = parse(r#"{"at": 0}"#).unwrap_err();
		assert!(format!("{err:#}").contains("line 1"));

		let err = parse(r#"{"at": 0, "navigate": {"url": "a"}, "reload": {"url": "b"}}"#).unwrap_err();
		assert!(format!("{err:#}").contains("exactly one"));
	}

	#[test]
	fn test_rejects_unknown_fields_and_bad_json() {
		assert!(parse(r#"{"at": 0, "teleport": {}}"#).is_err());
		assert!(parse("{not json").is_err());
	}

	#[test]
	fn test_rejects_decreasing_offsets() {
		let script = "{\"at\": 100, \"track\": {\"name\": \"a\"}}\n{\"at\": 50, \"track\": {\"name\": \"b\"}}";
		let err = parse(script).unwrap_err();
		assert!(format!("{err:#}").contains("line 2"));
	}

	#[test]
	fn test_loads_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, r#"{{"at": 5, "track": {{"name": "x"}}}}"#).unwrap();
		let steps = load(file.path()).unwrap();
		assert_eq!(steps.len(), 1);
		assert_eq!(steps[0].at_ms, 5);
	}

	#[test]
	fn test_missing_file_names_the_path() {
		let err = load(Path::new("/nonexistent/script.jsonl")).unwrap_err();
		assert!(err.to_string().contains("/nonexistent/script.jsonl"));
	}
}
