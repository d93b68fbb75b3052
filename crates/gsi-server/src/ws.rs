//! `WebSocket` handler for the live change stream.
//!
//! Clients connect to `GET /ws/events` and receive the changes the
//! pipeline dispatches as JSON-encoded
//! [`ChangeRecord`](gsi_core::ChangeRecord) text frames. Two optional query
//! parameters narrow the stream:
//!
//! - `address` keeps only changes from one game client
//! - `prefix` keeps only changes under a colon-delimited path, so
//!   `prefix=hero` matches `hero:level` but not `heroes:count`
//!
//! The tap subscription is taken before the upgrade completes, so every
//! change dispatched after the handshake response is delivered.
//!
//! A client that falls behind receives `{"lagged": n}` and the stream
//! resumes from the most recent change.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use gsi_core::ChangeRecord;
use gsi_core::detect::PATH_DELIMITER;
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::state::AppState;

/// Query parameters for `GET /ws/events`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeFilter {
    /// Only forward changes from this client address.
    pub address: Option<String>,
    /// Only forward changes at or below this path.
    pub prefix: Option<String>,
}

impl ChangeFilter {
    /// Whether `record` passes both constraints.
    pub fn matches(&self, record: &ChangeRecord) -> bool {
        self.address
            .as_deref()
            .is_none_or(|address| address == record.address)
            && self
                .prefix
                .as_deref()
                .is_none_or(|prefix| path_within(&record.path, prefix))
    }
}

fn path_within(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(PATH_DELIMITER))
}

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming changes.
///
/// # Route
///
/// `GET /ws/events?address=..&prefix=..`
pub async fn ws_events(
    ws: WebSocketUpgrade,
    Query(filter): Query<ChangeFilter>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let rx = state.pipeline.subscribe_changes();
    ws.on_upgrade(move |socket| handle_ws(socket, rx, filter))
}

async fn handle_ws(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<ChangeRecord>,
    filter: ChangeFilter,
) {
    debug!(
        address = filter.address.as_deref(),
        prefix = filter.prefix.as_deref(),
        "Change stream opened"
    );

    loop {
        tokio::select! {
            result = rx.recv() => {
                let frame = match result {
                    Ok(record) if filter.matches(&record) => {
                        match serde_json::to_string(&record) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!(path = record.path.as_str(), "Failed to serialize change record: {e}");
                                continue;
                            }
                        }
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Change stream lagged");
                        serde_json::json!({ "lagged": skipped }).to_string()
                    }
                    Err(RecvError::Closed) => {
                        debug!("Change tap closed");
                        return;
                    }
                };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    debug!("Change stream client gone");
                    return;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Change stream closed by client");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("Change stream socket error: {e}");
                        return;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
