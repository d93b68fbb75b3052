//! Synchronous, in-process publish/subscribe keyed by event name.
//!
//! [`EventBus`] is the building block for both event namespaces: the
//! process-wide one owned by the [`Pipeline`](crate::pipeline::Pipeline)
//! (`newclient`, `all:gamestate`) and the per-session one every
//! [`Session`](crate::session::Session) carries for change events.
//!
//! Handlers run on the emitting thread, in registration order. The
//! handler list is copied when [`emit`](EventBus::emit) starts, so a
//! handler may subscribe or unsubscribe from inside a callback; the change
//! takes effect from the next emit.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// A registered callback.
pub type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Identifies one subscription so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Named event channels carrying payloads of type `P`.
pub struct EventBus<P> {
    handlers: RwLock<BTreeMap<String, Vec<(SubscriptionId, Handler<P>)>>>,
    next_id: AtomicU64,
}

impl<P> EventBus<P> {
    /// Create a bus with no subscribers.
    pub const fn new() -> Self {
        Self {
            handlers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Subscribe `handler` to events named `name`.
    pub fn on<F>(&self, name: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(name.into())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription. Returns `false` if it was not registered
    /// under `name`.
    pub fn off(&self, name: &str, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(name);
        }
        removed
    }

    /// Invoke every handler subscribed to `name` with `payload`.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, name: &str, payload: &P) -> usize {
        let snapshot: Vec<Handler<P>> = self
            .handlers
            .read()
            .get(name)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in &snapshot {
            handler(payload);
        }
        snapshot.len()
    }

    /// Number of handlers subscribed to `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.handlers.read().get(name).map_or(0, Vec::len)
    }

    /// Names with at least one subscriber, sorted.
    pub fn event_names(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }
}

impl<P> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let counts: BTreeMap<&str, usize> = handlers
            .iter()
            .map(|(name, list)| (name.as_str(), list.len()))
            .collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}
