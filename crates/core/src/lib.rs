//! Shared building blocks for `stockrecon`.
//!
//! Identifiers, the remote record model, and the error taxonomy. This crate
//! contains no IO.

pub mod error;
pub mod id;
pub mod record;

pub use error::{
    ConfigurationError, FieldParseWarning, ReconError, ReconResult, RemoteError, RetrievalError,
    WriteBatchError,
};
pub use id::{ItemIdentifier, RecordId, RunId, StoreId};
pub use record::{FieldValue, Record};
