//! Ingestion pipeline: the context object owned by one server instance.
//!
//! Every accepted snapshot moves through the same stages:
//!
//! 1. **Auth check** against the configured [`TokenPolicy`]. A rejected
//!    snapshot stops here; no session is touched and nothing is emitted.
//! 2. **Identify** the session by address. First contact creates it and
//!    fires `newclient` before anything else happens for that request.
//! 3. **Merge** the whole body into the session state.
//! 4. **Detect and emit** per configured section, in configured order.
//!    Each change goes to the session's bus and to the change tap.
//! 5. **Complete**: `all:gamestate` fires with the raw snapshot.
//!
//! Stages 2 to 5 run under the session's ingest lock, so snapshots from
//! one address are processed strictly one after another, `all:gamestate`
//! included. Handlers run
//! synchronously on the ingesting thread and must not ingest for the same
//! session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::config::{GsiConfig, TokenPolicy};
use crate::detect::{SectionPath, detect_changes};
use crate::dispatch::{EventBus, SubscriptionId};
use crate::error::IngestError;
use crate::registry::ClientRegistry;
use crate::session::Session;
use crate::snapshot::Snapshot;

/// Name of the process-wide event fired once per new session.
pub const NEW_CLIENT: &str = "newclient";

/// Name of the process-wide event fired after every accepted snapshot.
pub const GAMESTATE: &str = "all:gamestate";

/// Capacity of the change tap.
///
/// A tap receiver that falls behind by more than this many changes gets
/// [`broadcast::error::RecvError::Lagged`] and skips ahead.
const TAP_CAPACITY: usize = 256;

/// Payload of the process-wide events.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A session was created (`newclient`).
    NewClient(Arc<Session>),
    /// A snapshot finished processing (`all:gamestate`).
    Gamestate {
        /// The session the snapshot was merged into.
        session: Arc<Session>,
        /// The raw snapshot body.
        snapshot: Arc<Value>,
    },
}

impl ServerEvent {
    /// The event name this payload is emitted under.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NewClient(_) => NEW_CLIENT,
            Self::Gamestate { .. } => GAMESTATE,
        }
    }

    /// The session the event concerns.
    pub const fn session(&self) -> &Arc<Session> {
        match self {
            Self::NewClient(session) | Self::Gamestate { session, .. } => session,
        }
    }
}

/// One change as seen on the tap, across all sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Address of the session that changed.
    pub address: String,
    /// Event name, e.g. `hero:level`.
    pub path: String,
    /// New value, `null` when the snapshot omitted it.
    pub value: Option<Value>,
    /// When the change was dispatched.
    pub at: DateTime<Utc>,
}

/// Result of a successfully ingested snapshot.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The session the snapshot was merged into.
    pub session: Arc<Session>,
    /// Whether this snapshot created the session.
    pub new_client: bool,
    /// Number of change events emitted.
    pub changes: usize,
}

/// Registry, event namespaces, and policy for one server instance.
#[derive(Debug)]
pub struct Pipeline {
    tokens: TokenPolicy,
    sections: Vec<SectionPath>,
    registry: ClientRegistry,
    events: EventBus<ServerEvent>,
    tap: broadcast::Sender<ChangeRecord>,
}

impl Pipeline {
    /// Build a pipeline from configuration.
    ///
    /// Section entries that are not valid paths are skipped with a
    /// warning.
    pub fn new(config: &GsiConfig) -> Self {
        Self::from_parts(config.tokens.clone(), config.sections.iter().map(String::as_str))
    }

    /// Build a pipeline from a token policy and section names.
    pub fn from_parts<'a, I>(tokens: TokenPolicy, sections: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let sections = sections
            .into_iter()
            .filter_map(|raw| {
                let parsed = SectionPath::parse(raw);
                if parsed.is_none() {
                    warn!(section = raw, "Ignoring invalid section path");
                }
                parsed
            })
            .collect();
        let (tap, _) = broadcast::channel(TAP_CAPACITY);
        Self {
            tokens,
            sections,
            registry: ClientRegistry::new(),
            events: EventBus::new(),
            tap,
        }
    }

    /// Parse `body` and ingest it as a snapshot from `address`.
    pub fn ingest(&self, address: &str, body: Value) -> Result<IngestOutcome, IngestError> {
        self.ingest_snapshot(address, Snapshot::from_value(body)?)
    }

    /// Run one snapshot through auth, identify, merge, detect, and emit.
    pub fn ingest_snapshot(
        &self,
        address: &str,
        snapshot: Snapshot,
    ) -> Result<IngestOutcome, IngestError> {
        let token = snapshot.auth_token().map(str::to_owned);
        let token = token.as_deref();
        if !self.tokens.accepts(token) {
            warn!(address, presented = token.is_some(), "Rejected snapshot: bad credential");
            return Err(IngestError::AuthRejected {
                address: address.to_owned(),
            });
        }

        let (session, new_client, changes) =
            self.registry
                .with_identified(address, token, |session, created| {
                    if created {
                        self.events
                            .emit(NEW_CLIENT, &ServerEvent::NewClient(Arc::clone(session)));
                    }
                    session.fold(snapshot.body());
                    let changes = self.detect_and_emit(session, &snapshot);

                    debug!(
                        address,
                        new_client = created,
                        changes,
                        snapshots = session.snapshots(),
                        "Snapshot ingested"
                    );

                    let gamestate = ServerEvent::Gamestate {
                        session: Arc::clone(session),
                        snapshot: Arc::new(snapshot.into_value()),
                    };
                    self.events.emit(GAMESTATE, &gamestate);

                    (Arc::clone(session), created, changes)
                });

        Ok(IngestOutcome {
            session,
            new_client,
            changes,
        })
    }

    fn detect_and_emit(&self, session: &Session, snapshot: &Snapshot) -> usize {
        let previously = snapshot.previously();
        if previously.is_none() {
            return 0;
        }

        let mut emitted: usize = 0;
        for section in &self.sections {
            for change in detect_changes(section, snapshot.body(), previously) {
                let handlers = session.emit_change(&change);
                trace!(
                    address = session.address(),
                    path = change.path.as_str(),
                    handlers,
                    "Change emitted"
                );
                // Err only means nobody is listening on the tap.
                let _ = self.tap.send(ChangeRecord {
                    address: session.address().to_owned(),
                    path: change.path,
                    value: change.value,
                    at: Utc::now(),
                });
                emitted = emitted.saturating_add(1);
            }
        }
        emitted
    }

    /// Subscribe to a process-wide event by name (`newclient`,
    /// `all:gamestate`).
    pub fn on<F>(&self, name: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.events.on(name, handler)
    }

    /// Subscribe to `newclient`.
    pub fn on_new_client<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        self.events.on(NEW_CLIENT, move |event: &ServerEvent| {
            if let ServerEvent::NewClient(session) = event {
                handler(session);
            }
        })
    }

    /// Subscribe to `all:gamestate`.
    pub fn on_gamestate<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Arc<Session>, &Value) + Send + Sync + 'static,
    {
        self.events.on(GAMESTATE, move |event: &ServerEvent| {
            if let ServerEvent::Gamestate { session, snapshot } = event {
                handler(session, snapshot);
            }
        })
    }

    /// Remove a process-wide subscription.
    pub fn off(&self, name: &str, id: SubscriptionId) -> bool {
        self.events.off(name, id)
    }

    /// Receive every change dispatched from now on, across all sessions.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeRecord> {
        self.tap.subscribe()
    }

    /// The process-wide event bus.
    pub const fn events(&self) -> &EventBus<ServerEvent> {
        &self.events
    }

    /// The session registry.
    pub const fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Sections inspected for changes, in emission order.
    pub fn sections(&self) -> &[SectionPath] {
        &self.sections
    }

    /// The credential policy.
    pub const fn tokens(&self) -> &TokenPolicy {
        &self.tokens
    }
}
