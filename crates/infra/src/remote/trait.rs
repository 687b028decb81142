use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use stockrecon_core::{FieldValue, Record, RemoteError, StoreId};

use super::query::Query;

/// Largest page the store will return for one query.
pub const MAX_PAGE_SIZE: usize = 500;

/// Largest number of records the store accepts in one write call.
pub const MAX_UPSERT_BATCH: usize = 100;

/// One bounded-page query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub store: StoreId,
    pub filter: Query,
    /// Field projection. Empty means every field.
    pub fields: Vec<String>,
    pub limit: usize,
    pub offset: usize,
    /// Ask the store to report the total number of matching records.
    pub total_count: bool,
}

impl QueryRequest {
    /// The query string, pagination clause included.
    pub fn render(&self) -> String {
        self.filter.render_page(self.limit, self.offset)
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub records: Vec<Record>,
    /// Total matching records, when requested and reported.
    pub total_count: Option<u64>,
}

/// Update-in-place of the record whose `match_field` equals `match_value`.
///
/// Never creates a record: an unmatched key is a store error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertInstruction {
    pub match_field: String,
    pub match_value: String,
    pub patch: BTreeMap<String, FieldValue>,
}

impl UpsertInstruction {
    pub fn new(match_field: impl Into<String>, match_value: impl Into<String>) -> Self {
        Self {
            match_field: match_field.into(),
            match_value: match_value.into(),
            patch: BTreeMap::new(),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.patch.insert(field.into(), value);
        self
    }
}

/// Remote record store boundary.
///
/// Implementations are collaborators: they do not retry, cache, or reorder
/// calls. Callers issue calls strictly one at a time.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one page.
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, RemoteError>;

    /// Apply up to [`MAX_UPSERT_BATCH`] updates in one call. Returns the
    /// number of records updated.
    async fn batch_upsert(
        &self,
        store: &StoreId,
        instructions: &[UpsertInstruction],
    ) -> Result<usize, RemoteError>;
}

#[async_trait::async_trait]
impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, RemoteError> {
        (**self).query(request).await
    }

    async fn batch_upsert(
        &self,
        store: &StoreId,
        instructions: &[UpsertInstruction],
    ) -> Result<usize, RemoteError> {
        (**self).batch_upsert(store, instructions).await
    }
}
