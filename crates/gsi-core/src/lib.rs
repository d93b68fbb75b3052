//! State merge, change detection, and event dispatch for Game State
//! Integration snapshots.
//!
//! A game client periodically posts a JSON snapshot of its state. This
//! crate turns that stream into per-client state trees and named change
//! events that application code can subscribe to.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration, token policy, environment overrides.
//! - [`detect`] -- Reads the `previously` companion and produces
//!   [`ChangeEvent`]s named like `hero:level`.
//! - [`dispatch`] -- Synchronous name-keyed [`EventBus`].
//! - [`error`] -- [`IngestError`].
//! - [`merge`] -- Additive deep merge of snapshot fragments.
//! - [`pipeline`] -- The per-server context: auth, identify, merge,
//!   detect, emit.
//! - [`registry`] -- Address-keyed [`ClientRegistry`].
//! - [`session`] -- [`Session`]: cumulative state plus a scoped event bus.
//! - [`snapshot`] -- [`Snapshot`] accessors for `auth` and `previously`.
//!
//! # Example
//!
//! ```rust,ignore
//! use gsi_core::{GsiConfig, Pipeline};
//!
//! let pipeline = Pipeline::new(&GsiConfig::default());
//! pipeline.on_new_client(|client| {
//!     client.on("hero:level", |level| tracing::info!(?level, "level up"));
//! });
//! pipeline.ingest("127.0.0.1", body)?;
//! ```

pub mod config;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod registry;
pub mod session;
pub mod snapshot;

pub use config::{ConfigError, GsiConfig, TokenPolicy};
pub use detect::{ChangeEvent, SectionPath, detect_changes};
pub use dispatch::{EventBus, SubscriptionId};
pub use error::IngestError;
pub use merge::merge;
pub use pipeline::{ChangeRecord, IngestOutcome, Pipeline, ServerEvent};
pub use registry::ClientRegistry;
pub use session::{Session, SessionSummary};
pub use snapshot::Snapshot;
