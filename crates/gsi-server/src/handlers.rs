//! HTTP endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/` | Ingest a snapshot from the game client |
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/health` | Liveness probe |
//! | `GET` | `/api/clients` | List known clients |
//! | `GET` | `/api/clients/{address}` | One client with its state tree |

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::response::{Html, IntoResponse};
use gsi_core::Snapshot;
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Largest snapshot body accepted. Full Dota 2 snapshots are a few tens of
/// kilobytes.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Address used when the connection's peer is not known.
const UNKNOWN_ADDRESS: &str = "unknown";

/// Response body for `POST /`.
#[derive(Debug, Serialize)]
struct IngestResponse {
    ok: bool,
    new_client: bool,
    changes: usize,
}

// ---------------------------------------------------------------------------
// POST / -- snapshot ingest
// ---------------------------------------------------------------------------

/// Accept one snapshot.
///
/// The client is identified by the peer IP (port excluded) so that a game
/// client reconnecting from a new ephemeral port keeps its session. The
/// pipeline runs on the blocking pool because it takes locks and calls
/// subscriber code.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let address = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_ADDRESS.to_owned(), |info| info.0.ip().to_string());

    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;

    let snapshot = Snapshot::from_slice(&bytes)?;

    let pipeline = Arc::clone(&state.pipeline);
    let peer = address.clone();
    let outcome = tokio::task::spawn_blocking(move || pipeline.ingest_snapshot(&peer, snapshot))
        .await
        .map_err(|e| ApiError::Internal(format!("ingest task failed: {e}")))??;

    debug!(
        address = address.as_str(),
        bytes = bytes.len(),
        changes = outcome.changes,
        "Snapshot accepted"
    );

    Ok(Json(IngestResponse {
        ok: true,
        new_client: outcome.new_client,
        changes: outcome.changes,
    }))
}

// ---------------------------------------------------------------------------
// GET / -- status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page listing connected clients.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sessions = state.pipeline.registry().sessions();
    let started = state.started_at.to_rfc3339();

    let mut rows = String::new();
    for session in &sessions {
        let _ = writeln!(
            rows,
            "<li><a href=\"/api/clients/{addr}\">{addr}</a> -- {count} snapshots</li>",
            addr = session.address(),
            count = session.snapshots(),
        );
    }
    if rows.is_empty() {
        rows.push_str("<li>No clients yet</li>\n");
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>GSI Server</title>
    <style>
        body {{ font-family: monospace; padding: 2rem; max-width: 800px; margin: 0 auto; }}
        ul {{ padding-left: 1rem; }}
    </style>
</head>
<body>
    <h1>GSI Server</h1>
    <p>Running since {started}. {count} client(s).</p>
    <ul>
{rows}    </ul>
    <p>POST snapshots to <code>/</code>. Live changes on <code>/ws/events</code>.</p>
</body>
</html>"#,
        count = sessions.len(),
    ))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "clients": state.pipeline.registry().len(),
    }))
}

// ---------------------------------------------------------------------------
// GET /api/clients
// ---------------------------------------------------------------------------

/// List every known client in registration order.
pub async fn list_clients(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let clients: Vec<_> = state
        .pipeline
        .registry()
        .sessions()
        .iter()
        .map(|s| s.summary())
        .collect();

    Json(serde_json::json!({
        "count": clients.len(),
        "clients": clients,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/clients/{address}
// ---------------------------------------------------------------------------

/// Return one client's summary and cumulative state, minus the `auth`
/// block.
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .pipeline
        .registry()
        .get(&address)
        .ok_or_else(|| ApiError::NotFound(format!("client {address} not found")))?;

    Ok(Json(serde_json::json!({
        "client": serde_json::to_value(session.summary())?,
        "state": session.public_state(),
    })))
}
