// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Click classification.

use std::fmt;

use pulse_tracker_core::{EventKind, Payload};
use serde_json::{json, Value};

use super::{present, Observation};
use crate::signal::{ClickSignal, ElementInfo};

/// Longest element text copied into a click payload, in characters.
pub const MAX_ELEMENT_TEXT: usize = 100;

const FORM_FIELD_ROLES: &[&str] = &[
	"textbox",
	"searchbox",
	"combobox",
	"listbox",
	"checkbox",
	"radio",
	"switch",
	"slider",
	"spinbutton",
];

/// What kind of element was clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickType {
	Link,
	Button,
	FormField,
	Element,
}

impl ClickType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Link => "link",
			Self::Button => "button",
			Self::FormField => "form_field",
			Self::Element => "element",
		}
	}
}

impl fmt::Display for ClickType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Classifies by tag first, then `type=submit`, then ARIA role.
pub fn classify(element: &ElementInfo) -> ClickType {
	let tag = element.tag();
	let role = element
		.role
		.as_deref()
		.map(|r| r.trim().to_ascii_lowercase());
	let input_type = element
		.input_type
		.as_deref()
		.map(|t| t.trim().to_ascii_lowercase());

	match tag.as_deref() {
		Some("A") => return ClickType::Link,
		Some("BUTTON") => return ClickType::Button,
		_ => {}
	}
	if input_type.as_deref() == Some("submit") {
		return ClickType::Button;
	}
	if matches!(tag.as_deref(), Some("INPUT" | "TEXTAREA" | "SELECT")) {
		return ClickType::FormField;
	}

	match role.as_deref() {
		Some("link") => ClickType::Link,
		Some("button") => ClickType::Button,
		Some(r) if FORM_FIELD_ROLES.contains(&r) => ClickType::FormField,
		_ => ClickType::Element,
	}
}

/// Truncates to at most `max` characters without splitting a code point.
pub fn truncate_text(text: &str, max: usize) -> String {
	match text.char_indices().nth(max) {
		Some((idx, _)) => text[..idx].to_string(),
		None => text.to_string(),
	}
}

/// Emits one `click` record per physical click.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickObserver;

impl ClickObserver {
	pub fn observe(&self, click: &ClickSignal) -> Observation {
		let element = &click.element;
		let click_type = classify(element);
		let text = present(element.text.as_deref()).map(|t| truncate_text(&t, MAX_ELEMENT_TEXT));

		let descriptor = json!({
			"tagName": element.tag(),
			"id": present(element.id.as_deref()),
			"className": present(element.class_name.as_deref()),
			"text": text.clone(),
			"href": present(element.href.as_deref()),
		});

		let payload = Payload::new()
			.insert("x", click.x)
			.insert("y", click.y)
			.insert("pageX", click.page_x)
			.insert("pageY", click.page_y)
			.insert("element", descriptor)
			.insert("clickType", click_type.as_str());

		let payload = match click_type {
			ClickType::Link => payload
				.insert_opt("linkUrl", present(element.href.as_deref()))
				.insert_opt("linkText", text),
			ClickType::Button => payload.insert_opt("buttonText", text),
			ClickType::FormField => payload
				.insert_opt("inputType", present(element.input_type.as_deref()))
				.insert_opt("inputName", present(element.name.as_deref())),
			ClickType::Element => payload,
		};

		Observation::new(EventKind::Click, payload)
	}
}

/// Element descriptor shared with the rage-click payload.
pub(crate) fn descriptor(element: &ElementInfo, text_limit: usize) -> Value {
	json!({
		"tagName": element.tag(),
		"id": present(element.id.as_deref()),
		"className": present(element.class_name.as_deref()),
		"text": present(element.text.as_deref()).map(|t| truncate_text(&t, text_limit)),
	})
}
