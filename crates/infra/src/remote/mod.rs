//! Remote record store boundary.
//!
//! The pipeline talks to the hosted store only through [`RecordStore`]. The
//! HTTP implementation speaks the platform's REST dialect; the in-memory one
//! is for tests and local runs.

pub mod http;
pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use http::HttpRecordStore;
pub use in_memory::{InMemoryRecordStore, StoreCall};
pub use query::{Query, SortOrder};
pub use r#trait::{
    MAX_PAGE_SIZE, MAX_UPSERT_BATCH, QueryPage, QueryRequest, RecordStore, UpsertInstruction,
};
