// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The tracker: one explicit instance per page load.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pulse_tracker::{HttpTransport, StaticEnvironment, Tracker};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), pulse_tracker::TrackerError> {
//! let environment = Arc::new(StaticEnvironment::new("https://shop.example/cart"));
//! let transport = HttpTransport::builder()
//!     .base_url("https://shop.example")
//!     .build()?;
//!
//! let tracker = Tracker::builder()
//!     .environment(environment)
//!     .transport(Arc::new(transport))
//!     .build()?;
//!
//! // Hand `tracker.clone()` to integrations; they call `track`.
//! tracker.track("add_to_cart", json!({"productId": "sku-42", "quantity": 1}));
//!
//! let background = tracker.clone();
//! tokio::spawn(async move { background.run().await });
//!
//! tracker.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use pulse_tracker_core::{
	EventKind, EventRecord, PageViewId, Payload, SessionId, TrackerConfig,
};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, trace, warn};

use crate::clock::{self, Clock, SystemClock};
use crate::dispatcher::{
	DispatchPolicy, DispatchState, Dispatcher, FlushOutcome, FlushRequest, FlushTrigger,
};
use crate::env::{Environment, ListenOptions, SignalKind};
use crate::error::{Result, TrackerError};
use crate::identity::IdentityProvider;
use crate::mirror::DebugMirror;
use crate::normalizer::EventNormalizer;
use crate::observers::{
	self, ClickObserver, Observation, PageViewDetails, RageClickDetector, ScrollObserver,
	VisibilityObserver,
};
use crate::signal::{ClickSignal, DomSignal};
use crate::transport::Transport;

/// Shortest sleep of the background loop, so a deadline that is already due
/// never turns `run` into a busy loop.
const MIN_LOOP_SLEEP: Duration = Duration::from_millis(10);

/// Snapshot of the tracker's identity and counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
	pub session_id: SessionId,
	pub page_view_id: PageViewId,
	/// The session lives only in memory because storage was unavailable.
	pub ephemeral_session: bool,
	pub session_duration_ms: u64,
	pub page_view_duration_ms: u64,
	/// Records produced during this page view.
	pub events_count: u64,
	/// Records not yet confirmed delivered.
	pub pending_events: usize,
	pub max_scroll_depth: u8,
}

/// Builder for [`Tracker`].
#[derive(Default)]
pub struct TrackerBuilder {
	config: Option<TrackerConfig>,
	environment: Option<Arc<dyn Environment>>,
	transport: Option<Arc<dyn Transport>>,
	clock: Option<Arc<dyn Clock>>,
}

impl TrackerBuilder {
	pub fn config(mut self, config: TrackerConfig) -> Self {
		self.config = Some(config);
		self
	}

	pub fn environment<E: Environment + 'static>(mut self, environment: Arc<E>) -> Self {
		self.environment = Some(environment);
		self
	}

	pub fn transport<T: Transport + 'static>(mut self, transport: Arc<T>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Defaults to [`SystemClock`].
	pub fn clock<C: Clock + 'static>(mut self, clock: Arc<C>) -> Self {
		self.clock = Some(clock);
		self
	}

	/// Resolves identity, subscribes the enabled observers and records the
	/// initial `page_view`.
	pub fn build(self) -> Result<Tracker> {
		let config = self.config.unwrap_or_default();
		config.validate()?;
		let environment = self
			.environment
			.ok_or(TrackerError::MissingComponent("environment"))?;
		let transport = self
			.transport
			.ok_or(TrackerError::MissingComponent("transport"))?;
		let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

		let now = clock.now();
		let identity = IdentityProvider;
		let session = identity.session(environment.session_storage(), now);
		let page_view = identity.new_page_view(now);
		let normalizer = EventNormalizer::new(session, page_view, environment.metadata());

		let dispatcher = Dispatcher::new(
			DispatchPolicy {
				flush_threshold: config.flush_threshold,
				flush_interval: config.flush_interval(),
			},
			now,
		);

		let state = TrackerState {
			normalizer,
			dispatcher,
			click: config.track_clicks.then_some(ClickObserver),
			scroll: config
				.track_scrolls
				.then(|| ScrollObserver::new(config.scroll_mode, config.scroll_throttle())),
			visibility: config.track_visibility.then(VisibilityObserver::new),
			rage: config.track_rage_clicks.then(|| {
				RageClickDetector::new(config.rage_click_threshold, config.rage_click_window())
			}),
			tracked: 0,
		};

		let tracker = Tracker {
			inner: Arc::new(TrackerInner {
				mirror: config.debug.then(DebugMirror::default),
				config,
				environment,
				transport,
				clock,
				state: Mutex::new(state),
				wake: Notify::new(),
				shutdown: AtomicBool::new(false),
				unloaded: AtomicBool::new(false),
			}),
		};
		tracker.start(now);
		Ok(tracker)
	}
}

struct TrackerState {
	normalizer: EventNormalizer,
	dispatcher: Dispatcher,
	click: Option<ClickObserver>,
	scroll: Option<ScrollObserver>,
	visibility: Option<VisibilityObserver>,
	rage: Option<RageClickDetector>,
	tracked: u64,
}

struct TrackerInner {
	config: TrackerConfig,
	environment: Arc<dyn Environment>,
	transport: Arc<dyn Transport>,
	clock: Arc<dyn Clock>,
	mirror: Option<DebugMirror>,
	state: Mutex<TrackerState>,
	wake: Notify,
	shutdown: AtomicBool,
	unloaded: AtomicBool,
}

impl TrackerInner {
	fn lock(&self) -> MutexGuard<'_, TrackerState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn complete(&self, request: &FlushRequest, outcome: FlushOutcome) {
		let reconciliation = self.lock().dispatcher.complete(request.id, outcome);
		if let Some(r) = reconciliation {
			if outcome == FlushOutcome::Failed {
				warn!(
					flush_id = %r.flush,
					trigger = %request.trigger,
					retained = r.released,
					"Event batch not delivered, keeping records for retry"
				);
			} else {
				debug!(
					flush_id = %r.flush,
					trigger = %request.trigger,
					removed = r.removed,
					remaining = r.remaining,
					"Event batch reconciled"
				);
			}
		}
	}

	fn mirror(&self, records: &[EventRecord]) {
		if self.config.debug {
			match serde_json::to_string(records) {
				Ok(body) => debug!(count = records.len(), body = %body, "Event batch payload"),
				Err(e) => warn!(error = %e, "Failed to render event batch payload"),
			}
		}
		if let Some(mirror) = &self.mirror {
			mirror.record(self.environment.local_storage(), records);
		}
	}
}

/// Handle to a running tracker. Cheap to clone; every clone drives the same
/// instance.
#[derive(Clone)]
pub struct Tracker {
	inner: Arc<TrackerInner>,
}

impl Tracker {
	pub fn builder() -> TrackerBuilder {
		TrackerBuilder::default()
	}

	pub fn config(&self) -> &TrackerConfig {
		&self.inner.config
	}

	/// Records a custom business event as `custom_<name>`.
	///
	/// Never fails: blank names become `custom_unnamed`, non-object data is
	/// wrapped under `value`, and reserved keys are dropped.
	pub fn track(&self, name: &str, data: impl Into<Payload>) {
		if self.is_shutdown() {
			warn!(name, "Ignoring track call after shutdown");
			return;
		}
		let observation = Observation::new(EventKind::custom(name), data.into());
		let now = self.inner.clock.now();
		let requests = {
			let mut state = self.inner.lock();
			self.record(&mut state, observation, now).into_iter().collect()
		};
		self.dispatch_all(requests);
	}

	/// Feeds one DOM signal forwarded by the host.
	pub fn handle_signal(&self, signal: DomSignal) {
		if self.is_shutdown() {
			trace!(kind = ?signal.kind(), "Ignoring signal after shutdown");
			return;
		}
		let now = self.inner.clock.now();
		match signal {
			DomSignal::Click(click) => self.on_click(&click, now),
			DomSignal::Scroll(metrics) => {
				let sample_pending = {
					let mut state = self.inner.lock();
					match state.scroll.as_mut() {
						Some(scroll) => {
							scroll.on_scroll(&metrics, now);
							scroll.deadline().is_some()
						}
						None => false,
					}
				};
				if sample_pending {
					self.inner.wake.notify_one();
				}
			}
			DomSignal::Visibility { hidden } => {
				let requests: Vec<FlushRequest> = {
					let mut state = self.inner.lock();
					let loaded_at = state.normalizer.page_view().loaded_at;
					let observation = match state.visibility.as_mut() {
						Some(visibility) => visibility.on_change(hidden, now, loaded_at),
						None => None,
					};
					observation
						.and_then(|o| self.record(&mut state, o, now))
						.into_iter()
						.collect()
				};
				self.dispatch_all(requests);
			}
			DomSignal::Unload => self.unload(now),
		}
	}

	/// Fires whatever is due: closed rage-click windows, settled scroll
	/// samples and the periodic flush.
	pub fn tick(&self) {
		if self.is_shutdown() {
			return;
		}
		let now = self.inner.clock.now();
		let requests = {
			let mut state = self.inner.lock();
			let mut requests = Vec::new();
			let fired = state.rage.as_mut().and_then(|r| r.poll(now));
			if let Some(fired) = fired {
				requests.extend(self.record(&mut state, fired, now));
			}
			let sampled = state.scroll.as_mut().and_then(|s| s.poll(now));
			if let Some(sampled) = sampled {
				requests.extend(self.record(&mut state, sampled, now));
			}
			requests.extend(state.dispatcher.poll_timer(now));
			requests
		};
		self.dispatch_all(requests);
	}

	/// Earliest instant at which [`Tracker::tick`] has work to do.
	pub fn next_deadline(&self) -> DateTime<Utc> {
		let state = self.inner.lock();
		[
			state.rage.as_ref().and_then(RageClickDetector::deadline),
			state.scroll.as_ref().and_then(ScrollObserver::deadline),
		]
		.into_iter()
		.flatten()
		.fold(state.dispatcher.next_timer_at(), |earliest, due| earliest.min(due))
	}

	/// Sends everything not already in flight and waits for the answer.
	///
	/// On failure the records stay buffered and the transport error is
	/// returned.
	pub async fn flush(&self) -> Result<()> {
		if self.is_shutdown() {
			return Err(TrackerError::Shutdown);
		}
		self.flush_now(FlushTrigger::Manual).await
	}

	/// Drives [`Tracker::tick`] until [`Tracker::shutdown`] is called.
	pub async fn run(&self) {
		info!(
			flush_interval_ms = self.inner.config.flush_interval_ms,
			flush_threshold = self.inner.config.flush_threshold,
			"Starting tracker loop"
		);

		loop {
			if self.is_shutdown() {
				break;
			}
			let wait = clock::elapsed(self.inner.clock.now(), self.next_deadline()).max(MIN_LOOP_SLEEP);

			tokio::select! {
				_ = tokio::time::sleep(wait) => self.tick(),
				_ = self.inner.wake.notified() => {}
			}
		}

		info!("Tracker loop stopped");
	}

	/// Stops tracking and makes one final awaited flush.
	pub async fn shutdown(&self) -> Result<()> {
		if self.inner.shutdown.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		self.inner.wake.notify_one();
		info!(pending = self.pending_len(), "Shutting down tracker");
		self.flush_now(FlushTrigger::Manual).await
	}

	pub fn is_shutdown(&self) -> bool {
		self.inner.shutdown.load(Ordering::SeqCst)
	}

	pub fn session_info(&self) -> SessionInfo {
		let now = self.inner.clock.now();
		let state = self.inner.lock();
		let session = state.normalizer.session();
		let page_view = state.normalizer.page_view();
		SessionInfo {
			session_id: session.session_id.clone(),
			page_view_id: page_view.page_view_id.clone(),
			ephemeral_session: session.ephemeral,
			session_duration_ms: non_negative(session.duration_ms(now)),
			page_view_duration_ms: non_negative(page_view.elapsed_ms(now)),
			events_count: state.tracked,
			pending_events: state.dispatcher.pending_len(),
			max_scroll_depth: state.scroll.as_ref().map_or(0, ScrollObserver::max_depth),
		}
	}

	/// Copies of every buffered record, in order, including those in flight.
	pub fn pending_events(&self) -> Vec<EventRecord> {
		self.inner.lock().dispatcher.pending_records()
	}

	pub fn pending_len(&self) -> usize {
		self.inner.lock().dispatcher.pending_len()
	}

	pub fn dispatch_state(&self) -> DispatchState {
		self.inner.lock().dispatcher.state()
	}

	fn start(&self, now: DateTime<Utc>) {
		let config = &self.inner.config;
		let environment = &self.inner.environment;

		if config.track_clicks || config.track_rage_clicks {
			environment.listen(
				SignalKind::Click,
				ListenOptions {
					capture: true,
					passive: true,
				},
			);
		}
		if config.track_scrolls {
			environment.listen(
				SignalKind::Scroll,
				ListenOptions {
					capture: false,
					passive: true,
				},
			);
		}
		if config.track_visibility {
			environment.listen(SignalKind::VisibilityChange, ListenOptions::default());
		}
		environment.listen(SignalKind::Unload, ListenOptions::default());

		let requests: Vec<FlushRequest> = {
			let mut state = self.inner.lock();
			info!(
				session_id = %state.normalizer.session().session_id,
				page_view_id = %state.normalizer.page_view().page_view_id,
				ephemeral = state.normalizer.session().ephemeral,
				"Tracker started"
			);
			if config.track_page_views {
				let details = PageViewDetails {
					title: environment.title(),
					load_time_ms: environment.load_time_ms(),
					session_started_at: Some(state.normalizer.session().started_at),
				};
				self.record(&mut state, observers::page_view(details), now)
					.into_iter()
					.collect()
			} else {
				Vec::new()
			}
		};
		self.dispatch_all(requests);
	}

	fn on_click(&self, click: &ClickSignal, now: DateTime<Utc>) {
		let (requests, window_open) = {
			let mut state = self.inner.lock();
			let mut requests = Vec::new();
			let observation = state.click.as_ref().map(|c| c.observe(click));
			if let Some(observation) = observation {
				requests.extend(self.record(&mut state, observation, now));
			}
			let rage = state
				.rage
				.as_mut()
				.and_then(|r| r.on_click(click.target, &click.element, now));
			if let Some(fired) = rage {
				requests.extend(self.record(&mut state, fired, now));
			}
			let window_open = state.rage.as_ref().and_then(RageClickDetector::deadline).is_some();
			(requests, window_open)
		};
		if window_open {
			// The background loop may be sleeping past the new deadline.
			self.inner.wake.notify_one();
		}
		self.dispatch_all(requests);
	}

	fn unload(&self, now: DateTime<Utc>) {
		if self.inner.unloaded.swap(true, Ordering::SeqCst) {
			debug!("Ignoring repeated unload signal");
			return;
		}

		let request = {
			let mut state = self.inner.lock();

			let rage = state.rage.as_mut().and_then(RageClickDetector::finish);
			if let Some(fired) = rage {
				let record = self.normalize(&mut state, fired, now);
				state.dispatcher.append(record);
			}
			let on_page = non_negative(state.normalizer.page_view().elapsed_ms(now));
			if self.inner.config.track_page_views {
				let record = self.normalize(&mut state, observers::page_time(on_page), now);
				state.dispatcher.append(record);
			}
			let scroll = state.scroll.as_ref().map(|s| (s.summary(), s.max_depth()));
			let max_depth = match scroll {
				Some((summary, depth)) => {
					let record = self.normalize(&mut state, summary, now);
					state.dispatcher.append(record);
					depth
				}
				None => 0,
			};
			let summary = observers::page_unload(on_page, state.tracked, max_depth);
			let record = self.normalize(&mut state, summary, now);
			state.dispatcher.append(record);

			state.dispatcher.begin_unload()
		};

		let Some(request) = request else {
			return;
		};
		self.inner.mirror(&request.records);

		let count = request.records.len();
		match self.inner.transport.send_beacon(request.records.clone()) {
			Ok(()) => {
				debug!(count, "Unload beacon handed off");
				self.inner.complete(&request, FlushOutcome::Abandoned);
			}
			Err(e) => {
				warn!(error = %e, count, "Unload beacon rejected, keeping records");
				self.inner.complete(&request, FlushOutcome::Failed);
			}
		}
	}

	/// Normalizes and buffers one observation. Returns a threshold flush if
	/// the append triggered one.
	fn record(
		&self,
		state: &mut TrackerState,
		observation: Observation,
		now: DateTime<Utc>,
	) -> Option<FlushRequest> {
		let record = self.normalize(state, observation, now);
		state.dispatcher.push(record)
	}

	fn normalize(
		&self,
		state: &mut TrackerState,
		observation: Observation,
		now: DateTime<Utc>,
	) -> EventRecord {
		let page = self.inner.environment.page();
		let record = state
			.normalizer
			.normalize(&observation.kind, observation.payload, now, page);
		state.tracked += 1;

		if self.inner.config.debug {
			debug!(
				event_type = %record.event_type,
				event_id = %record.event_id,
				pending = state.dispatcher.pending_len() + 1,
				"Tracked event"
			);
		} else {
			trace!(event_type = %record.event_type, "Tracked event");
		}
		record
	}

	fn dispatch_all(&self, requests: Vec<FlushRequest>) {
		for request in requests {
			self.dispatch(request);
		}
	}

	/// Sends in the background; the buffer is reconciled when the send ends.
	fn dispatch(&self, request: FlushRequest) {
		self.inner.mirror(&request.records);

		let handle = match tokio::runtime::Handle::try_current() {
			Ok(handle) => handle,
			Err(_) => {
				warn!(flush_id = %request.id, "No async runtime for event send");
				self.inner.complete(&request, FlushOutcome::Failed);
				return;
			}
		};

		let inner = Arc::clone(&self.inner);
		handle.spawn(async move {
			let outcome = match inner.transport.send(&request.records).await {
				Ok(()) => FlushOutcome::Delivered,
				Err(e) => {
					debug!(flush_id = %request.id, error = %e, "Event send failed");
					FlushOutcome::Failed
				}
			};
			inner.complete(&request, outcome);
		});
	}

	async fn flush_now(&self, trigger: FlushTrigger) -> Result<()> {
		let request = self.inner.lock().dispatcher.begin_flush(trigger);
		let Some(request) = request else {
			return Ok(());
		};
		self.inner.mirror(&request.records);

		let result = self.inner.transport.send(&request.records).await;
		let outcome = if result.is_ok() {
			FlushOutcome::Delivered
		} else {
			FlushOutcome::Failed
		};
		self.inner.complete(&request, outcome);
		result
	}
}

impl std::fmt::Debug for Tracker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Tracker")
			.field("config", &self.inner.config)
			.field("shutdown", &self.is_shutdown())
			.finish_non_exhaustive()
	}
}

fn non_negative(ms: i64) -> u64 {
	u64::try_from(ms).unwrap_or(0)
}
