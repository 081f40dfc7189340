// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery transports.

use std::time::Duration;

use async_trait::async_trait;
use pulse_tracker_core::{CoreError, EventRecord, TrackerConfig};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, TrackerError};

/// Sends batches of records to the collector.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Sends one batch and waits for the collector's answer. `Ok` means the
	/// batch was acknowledged and may be dropped from the buffer.
	async fn send(&self, records: &[EventRecord]) -> Result<()>;

	/// Hands a batch off for best-effort delivery during page teardown.
	///
	/// Returns once the batch is queued, not delivered. `Ok` means the
	/// transport accepted responsibility; the caller will not retry.
	fn send_beacon(&self, records: Vec<EventRecord>) -> Result<()>;
}

/// POSTs JSON arrays to the collector endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	client: Client,
	url: Url,
}

impl HttpTransport {
	pub fn builder() -> HttpTransportBuilder {
		HttpTransportBuilder::default()
	}

	/// Builds a transport for `config.endpoint`, resolved against `base_url`
	/// when the endpoint is a path.
	pub fn from_config(config: &TrackerConfig, base_url: Option<&str>) -> Result<Self> {
		let mut builder = Self::builder()
			.endpoint(&config.endpoint)
			.request_timeout(config.request_timeout());
		if let Some(base) = base_url {
			builder = builder.base_url(base);
		}
		builder.build()
	}

	/// Fully-qualified collector URL.
	pub fn url(&self) -> &str {
		self.url.as_str()
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn send(&self, records: &[EventRecord]) -> Result<()> {
		post_batch(&self.client, &self.url, records).await
	}

	fn send_beacon(&self, records: Vec<EventRecord>) -> Result<()> {
		let handle = tokio::runtime::Handle::try_current().map_err(|_| TrackerError::NoRuntime)?;
		let client = self.client.clone();
		let url = self.url.clone();
		let count = records.len();
		handle.spawn(async move {
			if let Err(e) = post_batch(&client, &url, &records).await {
				warn!(error = %e, count, "Unload beacon failed");
			}
		});
		debug!(count, "Queued unload beacon");
		Ok(())
	}
}

async fn post_batch(client: &Client, url: &Url, records: &[EventRecord]) -> Result<()> {
	debug!(url = %url, count = records.len(), "Sending event batch");

	let response = client.post(url.clone()).json(records).send().await?;

	if !response.status().is_success() {
		let status = response.status().as_u16();
		let message = response.text().await.unwrap_or_default();
		return Err(TrackerError::ServerError { status, message });
	}

	debug!(count = records.len(), "Event batch accepted");
	Ok(())
}

/// Builder for [`HttpTransport`].
#[derive(Debug, Default)]
pub struct HttpTransportBuilder {
	base_url: Option<String>,
	endpoint: Option<String>,
	request_timeout: Option<Duration>,
	user_agent: Option<String>,
}

impl HttpTransportBuilder {
	/// Page URL or origin that relative endpoints are resolved against, the
	/// way a browser resolves a `fetch` path against the document.
	pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = Some(base_url.into());
		self
	}

	/// Collector path or absolute URL.
	pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = Some(endpoint.into());
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = Some(timeout);
		self
	}

	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());
		self
	}

	pub fn build(self) -> Result<HttpTransport> {
		let endpoint = self
			.endpoint
			.unwrap_or_else(|| pulse_tracker_core::config::DEFAULT_ENDPOINT.to_string());
		let url = resolve_url(self.base_url.as_deref(), &endpoint)?;

		// Cookies carry the collector's session correlation.
		let client = Client::builder()
			.user_agent(self.user_agent.unwrap_or_else(default_user_agent))
			.timeout(
				self.request_timeout
					.unwrap_or(Duration::from_millis(pulse_tracker_core::config::DEFAULT_REQUEST_TIMEOUT_MS)),
			)
			.cookie_store(true)
			.build()?;

		Ok(HttpTransport { client, url })
	}
}

/// `pulse-tracker/<version>`.
pub fn default_user_agent() -> String {
	format!("pulse-tracker/{}", env!("CARGO_PKG_VERSION"))
}

fn resolve_url(base_url: Option<&str>, endpoint: &str) -> Result<Url> {
	let endpoint = endpoint.trim();
	let url = match Url::parse(endpoint) {
		Ok(url) => url,
		Err(url::ParseError::RelativeUrlWithoutBase) => {
			let Some(base) = base_url.map(str::trim).filter(|b| !b.is_empty()) else {
				return Err(CoreError::invalid_value(
					"endpoint",
					format!("relative endpoint '{endpoint}' needs a base URL"),
				)
				.into());
			};
			Url::parse(base)
				.map_err(|e| CoreError::invalid_value("base_url", format!("'{base}': {e}")))?
				.join(endpoint)
				.map_err(|e| CoreError::invalid_value("endpoint", format!("'{endpoint}': {e}")))?
		}
		Err(e) => {
			return Err(CoreError::invalid_value("endpoint", format!("'{endpoint}': {e}")).into());
		}
	};
	if !matches!(url.scheme(), "http" | "https") {
		return Err(CoreError::invalid_value(
			"endpoint",
			format!("'{url}' is not an http(s) URL"),
		)
		.into());
	}
	Ok(url)
}

/// Accepts everything and delivers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransport;

#[async_trait]
impl Transport for NoopTransport {
	async fn send(&self, _records: &[EventRecord]) -> Result<()> {
		Ok(())
	}

	fn send_beacon(&self, _records: Vec<EventRecord>) -> Result<()> {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_absolute_endpoint_is_used_verbatim() {
		let url = resolve_url(Some("https://ignored.example"), "https://c.example/in").unwrap();
		assert_eq!(url.as_str(), "https://c.example/in");
	}

	#[test]
	fn test_relative_endpoint_joins_base() {
		assert_eq!(
			resolve_url(Some("https://shop.example/"), "/analytics/events")
				.unwrap()
				.as_str(),
			"https://shop.example/analytics/events"
		);
		assert_eq!(
			resolve_url(Some("https://shop.example"), "analytics/events")
				.unwrap()
				.as_str(),
			"https://shop.example/analytics/events"
		);
	}

	#[test]
	fn test_root_relative_endpoint_ignores_the_base_path() {
		let transport = HttpTransport::builder()
			.base_url("https://shop.example/app/")
			.endpoint("/analytics/events")
			.build()
			.unwrap();
		assert_eq!(transport.url(), "https://shop.example/analytics/events");

		let url = resolve_url(Some("https://shop.example/app/page"), "events").unwrap();
		assert_eq!(url.as_str(), "https://shop.example/app/events");
	}

	#[test]
	fn test_unusable_endpoints_are_config_errors() {
		assert!(matches!(
			resolve_url(Some("not a url"), "/events"),
			Err(TrackerError::Config(_))
		));
		assert!(matches!(
			resolve_url(None, "ftp://files.example/events"),
			Err(TrackerError::Config(_))
		));
	}

	#[test]
	fn test_relative_endpoint_without_base_is_a_config_error() {
		let err = resolve_url(None, "/analytics/events").unwrap_err();
		assert!(matches!(err, TrackerError::Config(_)));
	}

	#[test]
	fn test_builder_defaults() {
		let transport = HttpTransport::builder()
			.base_url("http://localhost:8080")
			.build()
			.unwrap();
		assert_eq!(transport.url(), "http://localhost:8080/analytics/events");
	}

	#[test]
	fn test_user_agent_names_the_crate() {
		assert!(default_user_agent().starts_with("pulse-tracker/"));
	}

	#[test]
	fn test_beacon_outside_runtime_is_rejected() {
		let transport = HttpTransport::builder()
			.endpoint("http://127.0.0.1:9/events")
			.build()
			.unwrap();
		assert!(matches!(
			transport.send_beacon(Vec::new()),
			Err(TrackerError::NoRuntime)
		));
	}

	#[tokio::test]
	async fn test_noop_accepts_everything() {
		assert!(NoopTransport.send(&[]).await.is_ok());
		assert!(NoopTransport.send_beacon(Vec::new()).is_ok());
	}
}
