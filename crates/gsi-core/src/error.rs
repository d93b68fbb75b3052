//! Error types for snapshot ingestion.
//!
//! Every failure is scoped to a single request. Nothing here is fatal to
//! the process: an [`IngestError`] only ever means "drop this snapshot".
//! Sections that are configured but missing, or referenced by the
//! `previously` companion without being configured, are not errors at all
//! and degrade to "no changes".

/// Errors that can reject a snapshot before it touches any session.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The request's credential was missing or did not match the
    /// configured token policy. No session was created or mutated and no
    /// events fired.
    #[error("auth rejected for {address}")]
    AuthRejected {
        /// Source address of the rejected request.
        address: String,
    },

    /// The body was valid JSON but not a JSON object.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl IngestError {
    /// Whether this error is a credential rejection.
    pub const fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::AuthRejected { .. })
    }
}
