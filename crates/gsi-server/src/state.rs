//! Shared application state for the HTTP server.
//!
//! [`AppState`] wraps the [`Pipeline`] that owns every session and event
//! namespace for this server instance. Handlers only ever reach sessions
//! through it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gsi_core::{GsiConfig, Pipeline};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The ingestion pipeline.
    pub pipeline: Arc<Pipeline>,
    /// When this server instance started.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wrap an existing pipeline.
    ///
    /// Application code keeps its own `Arc` to subscribe to `newclient`.
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            started_at: Utc::now(),
        }
    }

    /// Build a fresh pipeline from configuration.
    pub fn from_config(config: &GsiConfig) -> Self {
        Self::new(Arc::new(Pipeline::new(config)))
    }
}
