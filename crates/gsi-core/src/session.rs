//! Per-source session: cumulative state plus a scoped event channel.
//!
//! A [`Session`] exists for every address that ever delivered an accepted
//! snapshot and lives for the rest of the process. It is shared as
//! `Arc<Session>`; application code receives that handle through the
//! `newclient` event and subscribes to change events on it with
//! [`Session::on`].

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::detect::{ChangeEvent, PATH_DELIMITER};
use crate::dispatch::{EventBus, SubscriptionId};
use crate::merge::merge;
use crate::snapshot::AUTH_KEY;

/// State and subscriptions for one snapshot source.
#[derive(Debug)]
pub struct Session {
    address: String,
    auth_token: Option<String>,
    connected_at: DateTime<Utc>,
    state: RwLock<Map<String, Value>>,
    snapshots: AtomicU64,
    events: EventBus<Option<Value>>,
    /// Serializes merge, detection, and dispatch of one snapshot at a time.
    ingest: Mutex<()>,
}

impl Session {
    /// Create an empty session for `address`.
    pub fn new(address: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            address: address.into(),
            auth_token,
            connected_at: Utc::now(),
            state: RwLock::new(Map::new()),
            snapshots: AtomicU64::new(0),
            events: EventBus::new(),
            ingest: Mutex::new(()),
        }
    }

    /// Source address this session is keyed by.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Credential presented by the request that created the session.
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// When the session was created.
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Number of snapshots merged into this session.
    pub fn snapshots(&self) -> u64 {
        self.snapshots.load(Ordering::Acquire)
    }

    /// A copy of the cumulative state tree.
    pub fn state(&self) -> Value {
        Value::Object(self.state.read().clone())
    }

    /// A copy of the cumulative state tree without the `auth` block.
    ///
    /// The merged `auth` block carries the client's credential and must
    /// not leave the process.
    pub fn public_state(&self) -> Value {
        self.read_state(|state| {
            Value::Object(
                state
                    .iter()
                    .filter(|(key, _)| key.as_str() != AUTH_KEY)
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            )
        })
    }

    /// Run `f` against the live state tree without copying it.
    ///
    /// The read lock is held for the duration of `f`.
    pub fn read_state<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> R {
        f(&self.state.read())
    }

    /// Look up a value in the state by colon-delimited path, e.g.
    /// `hero:level`.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.read_state(|state| {
            let mut segments = path.split(PATH_DELIMITER);
            let mut current = state.get(segments.next()?)?;
            for segment in segments {
                current = current.as_object()?.get(segment)?;
            }
            Some(current.clone())
        })
    }

    /// Subscribe to change events named `path` (e.g. `hero:level`).
    ///
    /// The handler receives the new value, or `None` when the snapshot
    /// flagged the field as changed without carrying it.
    pub fn on<F>(&self, path: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        self.events
            .on(path, move |value: &Option<Value>| handler(value.as_ref()))
    }

    /// Remove a subscription made with [`on`](Self::on).
    pub fn off(&self, path: &str, id: SubscriptionId) -> bool {
        self.events.off(path, id)
    }

    /// The session's event bus.
    pub const fn events(&self) -> &EventBus<Option<Value>> {
        &self.events
    }

    /// Lightweight description for listings.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            address: self.address.clone(),
            connected_at: self.connected_at,
            snapshots: self.snapshots(),
            sections: self.read_state(|state| {
                state
                    .keys()
                    .filter(|key| key.as_str() != AUTH_KEY)
                    .cloned()
                    .collect()
            }),
        }
    }

    pub(crate) fn lock_ingest(&self) -> MutexGuard<'_, ()> {
        self.ingest.lock()
    }

    /// Fold a snapshot body into the state. The write lock is released
    /// before returning so change handlers can read the new state.
    pub(crate) fn fold(&self, fragment: &Map<String, Value>) {
        merge(&mut self.state.write(), fragment);
        self.snapshots.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn emit_change(&self, change: &ChangeEvent) -> usize {
        self.events.emit(&change.path, &change.value)
    }
}

/// Serializable overview of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Source address.
    pub address: String,
    /// Creation time.
    pub connected_at: DateTime<Utc>,
    /// Snapshots merged so far.
    pub snapshots: u64,
    /// Top-level keys currently present in the state, `auth` excluded.
    pub sections: Vec<String>,
}
