//! Error model for the reconciliation pipeline.
//!
//! Fatal errors ([`ReconError`]) abort a run. [`FieldParseWarning`] and
//! [`WriteBatchError`] are non-fatal: they are collected into reports and
//! never returned as `Err` from a pipeline stage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::{ItemIdentifier, RecordId, StoreId};

/// Structured failure reported by the remote store (or the transport to it).
///
/// `field_errors` carries the per-field validation detail the platform
/// attaches to rejected queries and writes (field code → messages).
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error(
    "remote store error{}: {message}{}",
    origin(.status, .code),
    field_detail(.field_errors)
)]
pub struct RemoteError {
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    /// Platform error code (e.g. `CB_VA01`).
    pub code: Option<String>,
    /// Platform error id, useful when raising a support ticket.
    pub id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            id: None,
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    /// Transport-level failure (connection refused, timeout, TLS, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_field_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.field_errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }
}

/// ` (status 400, code CB_VA01)`, or nothing when neither is known.
fn origin(status: &Option<u16>, code: &Option<String>) -> String {
    match (status, code) {
        (Some(status), Some(code)) => format!(" (status {status}, code {code})"),
        (Some(status), None) => format!(" (status {status})"),
        (None, Some(code)) => format!(" (code {code})"),
        (None, None) => String::new(),
    }
}

/// `; field: msg1, msg2` per field, in field order.
fn field_detail(field_errors: &BTreeMap<String, Vec<String>>) -> String {
    field_errors
        .iter()
        .map(|(field, messages)| format!("; {field}: {}", messages.join(", ")))
        .collect()
}

/// A page of records could not be retrieved. Fatal to the whole run: a
/// partial transaction scan cannot produce a correct balance.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
pub enum RetrievalError {
    #[error("failed to fetch page from store {store} at offset {offset}: {source}")]
    Page {
        store: StoreId,
        offset: usize,
        source: RemoteError,
    },

    #[error("store {store} still returned full pages after {max_pages} requests")]
    PageLimitExceeded { store: StoreId, max_pages: usize },
}

impl RetrievalError {
    pub fn store(&self) -> &StoreId {
        match self {
            RetrievalError::Page { store, .. } => store,
            RetrievalError::PageLimitExceeded { store, .. } => store,
        }
    }

    /// Remote detail, when the failure came from the store itself.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            RetrievalError::Page { source, .. } => Some(source),
            RetrievalError::PageLimitExceeded { .. } => None,
        }
    }
}

/// Required configuration is absent, a placeholder, or out of range.
/// Raised before any remote call is made.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
pub enum ConfigurationError {
    #[error("missing configuration value: {key}")]
    Missing { key: String },

    #[error("configuration value {key} is still a placeholder ({value:?})")]
    Placeholder { key: String, value: String },

    #[error("invalid configuration value {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigurationError {
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }

    pub fn placeholder(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Placeholder {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// A single transaction could not be used. The record is skipped and the
/// run continues.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldParseWarning {
    #[error("record {record_id}: missing item identifier")]
    MissingIdentifier { record_id: RecordId },

    #[error("record {record_id}: missing quantity for item {identifier}")]
    MissingQuantity {
        record_id: RecordId,
        identifier: ItemIdentifier,
    },

    #[error("record {record_id}: invalid quantity {raw:?} for item {identifier}")]
    InvalidQuantity {
        record_id: RecordId,
        identifier: ItemIdentifier,
        raw: String,
    },

    #[error("record {record_id}: unrecognized transaction type {raw:?} for item {identifier}")]
    UnrecognizedType {
        record_id: RecordId,
        identifier: ItemIdentifier,
        raw: Option<String>,
    },
}

impl FieldParseWarning {
    pub fn record_id(&self) -> &RecordId {
        match self {
            FieldParseWarning::MissingIdentifier { record_id }
            | FieldParseWarning::MissingQuantity { record_id, .. }
            | FieldParseWarning::InvalidQuantity { record_id, .. }
            | FieldParseWarning::UnrecognizedType { record_id, .. } => record_id,
        }
    }
}

/// One upsert batch was rejected. Later batches are still attempted.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[error("write batch {batch} ({} items) failed: {source}", .identifiers.len())]
pub struct WriteBatchError {
    /// Zero-based position of the batch in issue order.
    pub batch: usize,
    /// Items the batch would have updated.
    pub identifiers: Vec<ItemIdentifier>,
    pub source: RemoteError,
}

/// Fatal pipeline error.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ReconError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

/// Result type of fatal pipeline stages.
pub type ReconResult<T> = Result<T, ReconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_display_includes_field_detail() {
        let err = RemoteError::new("invalid query")
            .with_status(400)
            .with_code("CB_VA01")
            .with_field_error("query", "unknown field status2");

        let text = err.to_string();
        assert!(text.contains("status 400"));
        assert!(text.contains("CB_VA01"));
        assert!(text.contains("query: unknown field status2"));
    }

    #[test]
    fn remote_error_display_format() {
        assert_eq!(
            RemoteError::new("connection refused").to_string(),
            "remote store error: connection refused"
        );
        assert_eq!(
            RemoteError::new("not found")
                .with_code("GAIA_RE01")
                .with_field_error("records[0].updateKey", "record not found")
                .with_field_error("records[0].updateKey", "key is required")
                .to_string(),
            "remote store error (code GAIA_RE01): not found; records[0].updateKey: record not found, key is required"
        );
        let err: &dyn std::error::Error = &RemoteError::new("x").with_status(502);
        assert_eq!(err.to_string(), "remote store error (status 502): x");
    }

    #[test]
    fn retrieval_error_exposes_remote_detail() {
        let err = RetrievalError::Page {
            store: StoreId::new("13"),
            offset: 500,
            source: RemoteError::new("boom").with_status(503),
        };

        assert_eq!(err.store().as_str(), "13");
        assert_eq!(err.remote().and_then(|r| r.status), Some(503));
        assert!(err.to_string().contains("offset 500"));
    }

    #[test]
    fn recon_error_wraps_configuration_transparently() {
        let err: ReconError = ConfigurationError::missing("catalog.store").into();
        assert_eq!(err.to_string(), "missing configuration value: catalog.store");
    }
}
