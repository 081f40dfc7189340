// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Page and device context attached to event records.

use serde::{Deserialize, Serialize};
use url::Url;

/// Stands in for the document location when resolving relative URLs.
const RELATIVE_BASE: &str = "http://localhost/";

/// Width/height pair in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
	pub width: u32,
	pub height: u32,
}

impl Dimensions {
	pub fn new(width: u32, height: u32) -> Self {
		Self { width, height }
	}
}

/// Device information captured once per page load.
///
/// Only the first record of a page view carries this block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
	pub viewport: Dimensions,
	pub screen: Dimensions,
	pub user_agent: Option<String>,
}

/// Where the document currently is. Re-read for every record because
/// client-side routing can change the URL without a new page load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
	pub url: String,
	pub pathname: String,
	pub referrer: Option<String>,
}

impl PageContext {
	/// Builds a context from a full URL, deriving the pathname.
	pub fn from_url(url: impl Into<String>, referrer: Option<String>) -> Self {
		let url = url.into();
		let pathname = pathname_of(&url);
		Self {
			url,
			pathname,
			referrer: referrer.filter(|r| !r.is_empty()),
		}
	}
}

/// Path component of an absolute, scheme-relative or relative URL, as
/// `location.pathname` reports it: dot-segments resolved, query and fragment
/// dropped, `/` when there is no path. Unparseable input yields `/`.
pub fn pathname_of(url: &str) -> String {
	let parsed = match Url::parse(url) {
		Ok(parsed) => Ok(parsed),
		Err(url::ParseError::RelativeUrlWithoutBase) => {
			Url::parse(RELATIVE_BASE).and_then(|base| base.join(url))
		}
		Err(e) => Err(e),
	};
	match parsed {
		Ok(parsed) if parsed.path().starts_with('/') => parsed.path().to_string(),
		Ok(parsed) => format!("/{}", parsed.path()),
		Err(_) => "/".to_string(),
	}
}
