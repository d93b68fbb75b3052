//! Address-keyed registry of client sessions.
//!
//! Only a handful of game clients ever talk to one server, so sessions are
//! kept in a registration-ordered list and looked up by linear scan.
//! Sessions are never evicted.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::session::Session;

/// All sessions known to one server instance.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    sessions: RwLock<Vec<Arc<Session>>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            sessions: RwLock::new(Vec::new()),
        }
    }

    /// Return the session for `address`, creating it if this is the
    /// first contact. The boolean is `true` when the session was created
    /// by this call.
    ///
    /// `auth_token` is recorded only on creation.
    pub fn identify(&self, address: &str, auth_token: Option<&str>) -> (Arc<Session>, bool) {
        self.with_identified(address, auth_token, |session, created| {
            (Arc::clone(session), created)
        })
    }

    /// Like [`identify`](Self::identify), but runs `f` while holding the
    /// session's ingest lock.
    ///
    /// A newly created session is locked before it becomes visible to
    /// other callers, so no concurrent snapshot for the same address can
    /// be merged before `f` has run for the creating request.
    pub(crate) fn with_identified<R>(
        &self,
        address: &str,
        auth_token: Option<&str>,
        f: impl FnOnce(&Arc<Session>, bool) -> R,
    ) -> R {
        if let Some(session) = self.get(address) {
            let _guard = session.lock_ingest();
            return f(&session, false);
        }

        let mut sessions = self.sessions.write();
        if let Some(existing) = find(&sessions, address) {
            drop(sessions);
            let _guard = existing.lock_ingest();
            return f(&existing, false);
        }

        let session = Arc::new(Session::new(address, auth_token.map(str::to_owned)));
        let _guard = session.lock_ingest();
        sessions.push(Arc::clone(&session));
        info!(
            address,
            authenticated = auth_token.is_some(),
            total_clients = sessions.len(),
            "Registered new client"
        );
        drop(sessions);

        f(&session, true)
    }

    /// The session for `address`, if one exists.
    pub fn get(&self, address: &str) -> Option<Arc<Session>> {
        find(&self.sessions.read(), address)
    }

    /// All sessions in registration order.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().clone()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no session has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

fn find(sessions: &[Arc<Session>], address: &str) -> Option<Arc<Session>> {
    sessions
        .iter()
        .find(|s| s.address() == address)
        .map(Arc::clone)
}
