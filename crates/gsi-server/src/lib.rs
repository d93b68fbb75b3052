//! HTTP ingest server for Game State Integration snapshots.
//!
//! This crate puts an Axum server in front of a [`gsi_core::Pipeline`]:
//!
//! - **Ingest** (`POST /`) where the game client posts snapshots
//! - **REST endpoints** for inspecting known clients and their state
//! - **`WebSocket` endpoint** (`/ws/events`) streaming every change
//!   dispatched by the pipeline
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! All session state and event subscriptions live in the pipeline. The
//! HTTP layer only identifies the peer, reads the body, and hands both to
//! [`Pipeline::ingest_snapshot`](gsi_core::Pipeline::ingest_snapshot).
//! Application code subscribes on the same `Arc<Pipeline>` it passes to
//! [`AppState::new`].

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
