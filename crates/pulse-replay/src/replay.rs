// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Drives trackers through a parsed script on a manual clock.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_tracker::{
	Clock, DispatchState, DomSignal, EventRecord, ManualClock, MemoryStore, SessionInfo,
	StaticEnvironment, Tracker, TrackerConfig, Transport,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::script::{Action, Step};

type ReplayEnvironment = StaticEnvironment<Arc<MemoryStore>, Arc<MemoryStore>>;

/// How long to wait for outstanding sends before moving on.
const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of a replay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
	pub steps: usize,
	/// One entry per page load, in order, taken just before it ended.
	pub page_loads: Vec<SessionInfo>,
	/// Records still undelivered when the replay finished.
	pub undelivered: usize,
}

/// Replays scripts against one simulated browsing session.
pub struct Replayer<T: Transport + 'static> {
	config: TrackerConfig,
	transport: Arc<T>,
	clock: Arc<ManualClock>,
	start: DateTime<Utc>,
	session_storage: Arc<MemoryStore>,
	local_storage: Arc<MemoryStore>,
	settle_timeout: Duration,
}

impl<T: Transport + 'static> Replayer<T> {
	pub fn new(config: TrackerConfig, transport: Arc<T>, start: DateTime<Utc>) -> Self {
		Self {
			config,
			transport,
			clock: Arc::new(ManualClock::new(start)),
			start,
			session_storage: Arc::new(MemoryStore::new()),
			local_storage: Arc::new(MemoryStore::new()),
			settle_timeout: DEFAULT_SETTLE_TIMEOUT,
		}
	}

	pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
		self.settle_timeout = timeout;
		self
	}

	/// Local storage shared by every page load; holds the debug mirror.
	pub fn local_storage(&self) -> &Arc<MemoryStore> {
		&self.local_storage
	}

	pub async fn run(&self, initial_url: &str, steps: &[Step]) -> Result<ReplaySummary> {
		let (mut tracker, mut environment) = self.load_page(initial_url)?;
		let mut page_loads = Vec::new();

		for step in steps {
			let at = pulse_tracker::clock::add(self.start, Duration::from_millis(step.at_ms));
			self.advance_to(&tracker, at).await;
			debug!(line = step.line, at_ms = step.at_ms, action = ?step.action, "Replaying step");

			match &step.action {
				Action::Signal(signal) => tracker.handle_signal(signal.clone()),
				Action::Track { name, data } => tracker.track(name, data.clone()),
				Action::Navigate { url } => environment.navigate(url.clone()),
				Action::Reload { url } => {
					tracker.handle_signal(DomSignal::Unload);
					self.settle(&tracker).await;
					page_loads.push(tracker.session_info());
					if let Err(e) = tracker.shutdown().await {
						warn!(error = %e, "Final flush of unloaded page failed");
					}
					(tracker, environment) = self.load_page(url)?;
				}
			}
			self.settle(&tracker).await;
		}

		if let Err(e) = tracker.shutdown().await {
			warn!(error = %e, "Final flush failed");
		}
		let last = tracker.session_info();
		let undelivered = last.pending_events;
		page_loads.push(last);

		info!(
			steps = steps.len(),
			page_loads = page_loads.len(),
			undelivered,
			"Replay finished"
		);
		Ok(ReplaySummary {
			steps: steps.len(),
			page_loads,
			undelivered,
		})
	}

	fn load_page(&self, url: &str) -> Result<(Tracker, Arc<ReplayEnvironment>)> {
		let environment = Arc::new(
			StaticEnvironment::with_storage(
				url,
				self.session_storage.clone(),
				self.local_storage.clone(),
			)
			.with_user_agent(pulse_tracker::transport::default_user_agent()),
		);
		let tracker = Tracker::builder()
			.config(self.config.clone())
			.environment(environment.clone())
			.transport(self.transport.clone())
			.clock(self.clock.clone())
			.build()
			.with_context(|| format!("failed to start tracker for {url}"))?;
		info!(url, "Loaded page");
		Ok((tracker, environment))
	}

	/// Moves the clock to `target`, stopping at every tracker deadline on
	/// the way so timers and debounce windows fire at their own instants.
	async fn advance_to(&self, tracker: &Tracker, target: DateTime<Utc>) {
		loop {
			let due = tracker.next_deadline();
			if due > target {
				break;
			}
			if due > self.clock.now() {
				self.clock.set(due);
			}
			tracker.tick();
			self.settle(tracker).await;
		}
		if target > self.clock.now() {
			self.clock.set(target);
		}
	}

	async fn settle(&self, tracker: &Tracker) {
		let deadline = tokio::time::Instant::now() + self.settle_timeout;
		while tracker.dispatch_state() != DispatchState::Idle {
			if tokio::time::Instant::now() >= deadline {
				warn!(state = ?tracker.dispatch_state(), "Sends still outstanding, continuing");
				return;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	}
}

/// `scheme://host[:port]` of an absolute URL; `None` for relative URLs and
/// opaque origins.
pub fn origin_of(url: &str) -> Option<String> {
	let origin = Url::parse(url).ok()?.origin();
	origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Prints batches as JSON lines instead of sending them.
#[derive(Debug, Default)]
pub struct StdoutTransport {
	batches: Mutex<usize>,
}

impl StdoutTransport {
	pub fn new() -> Self {
		Self::default()
	}

	fn print(&self, records: &[EventRecord], beacon: bool) -> pulse_tracker::Result<()> {
		let line = serde_json::to_string(&serde_json::json!({
			"beacon": beacon,
			"records": records,
		}))?;
		println!("{line}");
		*self.batches.lock().unwrap_or_else(PoisonError::into_inner) += 1;
		Ok(())
	}

	pub fn batches(&self) -> usize {
		*self.batches.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

#[async_trait]
impl Transport for StdoutTransport {
	async fn send(&self, records: &[EventRecord]) -> pulse_tracker::Result<()> {
		self.print(records, false)
	}

	fn send_beacon(&self, records: Vec<EventRecord>) -> pulse_tracker::Result<()> {
		self.print(&records, true)
	}
}
