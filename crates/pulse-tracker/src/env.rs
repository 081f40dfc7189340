// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The environment adapter: everything the tracker needs from the host page.
//!
//! The tracker never touches browser globals. A host (a wasm shim, a test, the
//! replay tool) implements [`Environment`] and forwards DOM events as
//! [`crate::signal::DomSignal`] values.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use pulse_tracker_core::{Dimensions, PageContext, SessionMetadata};

use crate::error::{Result, TrackerError};

/// Session storage key holding the persisted session token.
pub const SESSION_STORAGE_KEY: &str = "tracker_session_id";

/// Local storage key used by the debug mirror.
pub const MIRROR_STORAGE_KEY: &str = "tracker_events";

/// Kinds of DOM signal an observer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
	Click,
	Scroll,
	VisibilityChange,
	Unload,
}

/// How a listener should be registered with the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenOptions {
	/// Register in the capture phase at the document root, ahead of page handlers.
	pub capture: bool,
	/// The listener never cancels the event.
	pub passive: bool,
}

/// A string key-value store. Implementations may fail (disabled storage,
/// quota, privacy mode); callers degrade rather than propagate.
pub trait KeyValueStore: Send + Sync {
	fn get(&self, key: &str) -> Result<Option<String>>;
	fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Minimal capability set the tracker needs from the host page.
pub trait Environment: Send + Sync {
	/// Current URL, pathname and referrer.
	fn page(&self) -> PageContext;

	/// Document title, if any.
	fn title(&self) -> Option<String> {
		None
	}

	fn viewport(&self) -> Dimensions;

	fn screen(&self) -> Dimensions;

	fn user_agent(&self) -> Option<String>;

	/// Navigation-timing page load duration, when the host can measure it.
	fn load_time_ms(&self) -> Option<u64> {
		None
	}

	/// Storage scoped to the browsing session (survives navigation, not tab close).
	fn session_storage(&self) -> &dyn KeyValueStore;

	/// Storage that outlives the session; only the debug mirror writes here.
	fn local_storage(&self) -> &dyn KeyValueStore;

	/// Asks the host to start forwarding signals of `kind`.
	fn listen(&self, kind: SignalKind, options: ListenOptions);

	/// Snapshot of device metadata for the first record of a page view.
	fn metadata(&self) -> SessionMetadata {
		SessionMetadata {
			viewport: self.viewport(),
			screen: self.screen(),
			user_agent: self.user_agent(),
		}
	}
}

/// In-memory store. Also the fallback when host storage is unavailable.
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl KeyValueStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<String>> {
		let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		Ok(entries.get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
		entries.insert(key.to_string(), value.to_string());
		Ok(())
	}
}

/// A store that always fails, modelling disabled storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
	fn get(&self, _key: &str) -> Result<Option<String>> {
		Err(TrackerError::StorageUnavailable("storage is disabled".to_string()))
	}

	fn set(&self, _key: &str, _value: &str) -> Result<()> {
		Err(TrackerError::StorageUnavailable("storage is disabled".to_string()))
	}
}

#[derive(Debug, Clone)]
struct PageState {
	url: String,
	referrer: Option<String>,
	title: Option<String>,
	viewport: Dimensions,
	screen: Dimensions,
	user_agent: Option<String>,
	load_time_ms: Option<u64>,
}

/// A settable environment for hosts that replay recorded sessions and for tests.
///
/// Storage is shared by reference so several page loads can be simulated
/// against the same session storage.
pub struct StaticEnvironment<S: KeyValueStore = MemoryStore, L: KeyValueStore = MemoryStore> {
	state: RwLock<PageState>,
	session_storage: S,
	local_storage: L,
	subscriptions: Mutex<Vec<(SignalKind, ListenOptions)>>,
}

impl StaticEnvironment {
	/// Creates an environment at `url` with fresh in-memory storage.
	pub fn new(url: impl Into<String>) -> Self {
		Self::with_storage(url, MemoryStore::new(), MemoryStore::new())
	}
}

impl<S: KeyValueStore, L: KeyValueStore> StaticEnvironment<S, L> {
	pub fn with_storage(url: impl Into<String>, session_storage: S, local_storage: L) -> Self {
		Self {
			state: RwLock::new(PageState {
				url: url.into(),
				referrer: None,
				title: None,
				viewport: Dimensions::new(1280, 720),
				screen: Dimensions::new(1920, 1080),
				user_agent: None,
				load_time_ms: None,
			}),
			session_storage,
			local_storage,
			subscriptions: Mutex::new(Vec::new()),
		}
	}

	pub fn with_referrer(self, referrer: impl Into<String>) -> Self {
		self.write(|s| s.referrer = Some(referrer.into()));
		self
	}

	pub fn with_title(self, title: impl Into<String>) -> Self {
		self.write(|s| s.title = Some(title.into()));
		self
	}

	pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
		self.write(|s| s.user_agent = Some(user_agent.into()));
		self
	}

	pub fn with_viewport(self, viewport: Dimensions) -> Self {
		self.write(|s| s.viewport = viewport);
		self
	}

	pub fn with_screen(self, screen: Dimensions) -> Self {
		self.write(|s| s.screen = screen);
		self
	}

	pub fn with_load_time_ms(self, load_time_ms: u64) -> Self {
		self.write(|s| s.load_time_ms = Some(load_time_ms));
		self
	}

	/// Client-side navigation: the URL changes, the page view does not.
	pub fn navigate(&self, url: impl Into<String>) {
		self.write(|s| s.url = url.into());
	}

	pub fn resize(&self, viewport: Dimensions) {
		self.write(|s| s.viewport = viewport);
	}

	/// Signal kinds the tracker has subscribed to, in registration order.
	pub fn subscriptions(&self) -> Vec<(SignalKind, ListenOptions)> {
		self.subscriptions
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	pub fn is_listening(&self, kind: SignalKind) -> bool {
		self.subscriptions().iter().any(|(k, _)| *k == kind)
	}

	fn write(&self, f: impl FnOnce(&mut PageState)) {
		let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
		f(&mut state);
	}

	fn read(&self) -> PageState {
		self.state
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}
}

impl<S: KeyValueStore, L: KeyValueStore> Environment for StaticEnvironment<S, L> {
	fn page(&self) -> PageContext {
		let state = self.read();
		PageContext::from_url(state.url, state.referrer)
	}

	fn title(&self) -> Option<String> {
		self.read().title
	}

	fn viewport(&self) -> Dimensions {
		self.read().viewport
	}

	fn screen(&self) -> Dimensions {
		self.read().screen
	}

	fn user_agent(&self) -> Option<String> {
		self.read().user_agent
	}

	fn load_time_ms(&self) -> Option<u64> {
		self.read().load_time_ms
	}

	fn session_storage(&self) -> &dyn KeyValueStore {
		&self.session_storage
	}

	fn local_storage(&self) -> &dyn KeyValueStore {
		&self.local_storage
	}

	fn listen(&self, kind: SignalKind, options: ListenOptions) {
		self.subscriptions
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push((kind, options));
	}
}

/// Lets several environments share one store, e.g. consecutive page loads
/// sharing session storage.
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
	fn get(&self, key: &str) -> Result<Option<String>> {
		(**self).get(key)
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		(**self).set(key, value)
	}
}
