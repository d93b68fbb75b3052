//! Axum router construction.
//!
//! Assembles the ingest endpoint, the read-only inspection API, and the
//! `WebSocket` change stream into a single [`Router`].

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `POST /` -- snapshot ingest (the game client's endpoint)
/// - `GET /` -- minimal HTML status page
/// - `GET /health` -- liveness probe
/// - `GET /api/clients` -- list clients
/// - `GET /api/clients/{address}` -- single client with state
/// - `GET /ws/events` -- `WebSocket` change stream
///
/// CORS allows any origin so browser overlays can read the API.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index).post(handlers::ingest))
        .route("/health", get(handlers::health))
        .route("/api/clients", get(handlers::list_clients))
        .route("/api/clients/{address}", get(handlers::get_client))
        .route("/ws/events", get(ws::ws_events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
