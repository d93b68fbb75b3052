//! The incoming payload as the ingest pipeline sees it.
//!
//! A snapshot is a JSON object whose top-level keys are sections
//! (`provider`, `map`, `player`, `hero`, ...) plus two keys with special
//! meaning:
//!
//! - `auth`: the client's credential, either `{"token": "..."}` as the
//!   Dota 2 client sends it or a bare string
//! - `previously`: per-section change companion, see [`crate::detect`]
//!
//! No schema validation happens here; anything that is a JSON object is a
//! valid snapshot.

use serde_json::{Map, Value};

use crate::error::IngestError;

/// Top-level key carrying the credential.
pub const AUTH_KEY: &str = "auth";

/// Key inside the `auth` object holding the token string.
pub const TOKEN_KEY: &str = "token";

/// Top-level key carrying the change companion.
pub const PREVIOUSLY_KEY: &str = "previously";

/// A parsed snapshot body.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    body: Map<String, Value>,
}

impl Snapshot {
    /// Wrap a JSON value, rejecting anything that is not an object.
    pub fn from_value(value: Value) -> Result<Self, IngestError> {
        match value {
            Value::Object(body) => Ok(Self { body }),
            other => Err(IngestError::MalformedPayload(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Parse a snapshot from raw request bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IngestError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| IngestError::MalformedPayload(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// The credential the client presented, if any.
    pub fn auth_token(&self) -> Option<&str> {
        match self.body.get(AUTH_KEY)? {
            Value::String(token) => Some(token),
            Value::Object(auth) => auth.get(TOKEN_KEY).and_then(Value::as_str),
            _ => None,
        }
    }

    /// The `previously` companion, if present and an object.
    pub fn previously(&self) -> Option<&Map<String, Value>> {
        self.body.get(PREVIOUSLY_KEY).and_then(Value::as_object)
    }

    /// The full body.
    pub const fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Consume the snapshot, returning the body as a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

impl From<Map<String, Value>> for Snapshot {
    fn from(body: Map<String, Value>) -> Self {
        Self { body }
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
