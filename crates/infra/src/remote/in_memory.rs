use std::collections::HashMap;
use std::sync::RwLock;

use stockrecon_core::{Record, RemoteError, StoreId};

use super::r#trait::{
    MAX_PAGE_SIZE, MAX_UPSERT_BATCH, QueryPage, QueryRequest, RecordStore, UpsertInstruction,
};

/// A call observed by [`InMemoryRecordStore`], in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Query {
        store: StoreId,
        /// Requested projection; empty means every field.
        fields: Vec<String>,
        /// Rendered filter and ordering, without the pagination clause.
        filter: String,
        limit: usize,
        offset: usize,
        returned: usize,
    },
    Upsert {
        store: StoreId,
        size: usize,
    },
}

#[derive(Debug, Clone)]
enum Failure {
    QueryAtOffset { store: StoreId, offset: usize },
    UpsertCall { index: usize },
}

#[derive(Debug, Default)]
struct Inner {
    stores: HashMap<StoreId, Vec<Record>>,
    calls: Vec<StoreCall>,
    upserts_issued: usize,
    failures: Vec<(Failure, RemoteError)>,
}

/// In-memory record store.
///
/// Intended for tests/dev. Mirrors the platform's observable behaviour:
/// page and batch ceilings, upsert-by-key without creation, and
/// all-or-nothing batches. Every call is logged for inspection.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: RwLock<Inner>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records to a store (created on first use).
    pub fn insert_records(&self, store: &StoreId, records: impl IntoIterator<Item = Record>) {
        if let Ok(mut inner) = self.inner.write() {
            inner
                .stores
                .entry(store.clone())
                .or_default()
                .extend(records);
        }
    }

    /// Snapshot of a store's records in insertion order.
    pub fn records(&self, store: &StoreId) -> Vec<Record> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.stores.get(store).cloned())
            .unwrap_or_default()
    }

    /// Every call issued so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner
            .read()
            .map(|inner| inner.calls.clone())
            .unwrap_or_default()
    }

    pub fn query_calls(&self, store: &StoreId) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, StoreCall::Query { store: s, .. } if s == store))
            .collect()
    }

    /// Sizes of the upsert calls, in issue order.
    pub fn upsert_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Upsert { size, .. } => Some(size),
                StoreCall::Query { .. } => None,
            })
            .collect()
    }

    /// Fail the query against `store` that starts at `offset`.
    pub fn fail_query_at(&self, store: &StoreId, offset: usize, error: RemoteError) {
        if let Ok(mut inner) = self.inner.write() {
            inner.failures.push((
                Failure::QueryAtOffset {
                    store: store.clone(),
                    offset,
                },
                error,
            ));
        }
    }

    /// Fail the `index`-th (zero-based) upsert call.
    pub fn fail_upsert_call(&self, index: usize, error: RemoteError) {
        if let Ok(mut inner) = self.inner.write() {
            inner.failures.push((Failure::UpsertCall { index }, error));
        }
    }

    fn poisoned() -> RemoteError {
        RemoteError::transport("in-memory store lock poisoned")
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, RemoteError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;

        if request.limit > MAX_PAGE_SIZE {
            return Err(RemoteError::new(format!(
                "limit must be at most {MAX_PAGE_SIZE}"
            ))
            .with_status(400)
            .with_code("CB_VA01")
            .with_field_error("query", "limit too large"));
        }

        let injected = inner.failures.iter().find_map(|(f, e)| match f {
            Failure::QueryAtOffset { store, offset }
                if *store == request.store && *offset == request.offset =>
            {
                Some(e.clone())
            }
            _ => None,
        });
        if let Some(err) = injected {
            return Err(err);
        }

        let mut matching: Vec<Record> = inner
            .stores
            .get(&request.store)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| request.filter.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        request.filter.sort(&mut matching);

        let total = matching.len() as u64;
        let page: Vec<Record> = matching
            .iter()
            .skip(request.offset)
            .take(request.limit)
            .map(|r| r.project(&request.fields))
            .collect();

        inner.calls.push(StoreCall::Query {
            store: request.store.clone(),
            fields: request.fields.clone(),
            filter: request.filter.render(),
            limit: request.limit,
            offset: request.offset,
            returned: page.len(),
        });

        Ok(QueryPage {
            records: page,
            total_count: request.total_count.then_some(total),
        })
    }

    async fn batch_upsert(
        &self,
        store: &StoreId,
        instructions: &[UpsertInstruction],
    ) -> Result<usize, RemoteError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;

        let index = inner.upserts_issued;
        inner.upserts_issued += 1;
        inner.calls.push(StoreCall::Upsert {
            store: store.clone(),
            size: instructions.len(),
        });

        let injected = inner.failures.iter().find_map(|(f, e)| match f {
            Failure::UpsertCall { index: i } if *i == index => Some(e.clone()),
            _ => None,
        });
        if let Some(err) = injected {
            return Err(err);
        }

        if instructions.len() > MAX_UPSERT_BATCH {
            return Err(RemoteError::new(format!(
                "at most {MAX_UPSERT_BATCH} records per request"
            ))
            .with_status(400)
            .with_code("CB_VA01")
            .with_field_error("records", "too many records"));
        }

        let records = inner.stores.entry(store.clone()).or_default();

        // All-or-nothing: resolve every key before touching anything.
        let mut targets = Vec::with_capacity(instructions.len());
        for (i, ins) in instructions.iter().enumerate() {
            let position = records.iter().position(|r| {
                r.text(&ins.match_field).as_deref() == Some(ins.match_value.as_str())
            });
            match position {
                Some(p) => targets.push(p),
                None => {
                    return Err(RemoteError::new(format!(
                        "no record matches {} = {:?}",
                        ins.match_field, ins.match_value
                    ))
                    .with_status(400)
                    .with_code("GAIA_RE01")
                    .with_field_error(format!("records[{i}].updateKey"), "record not found"));
                }
            }
        }

        for (ins, position) in instructions.iter().zip(targets) {
            for (field, value) in &ins.patch {
                records[position].insert(field.clone(), value.clone());
            }
        }

        Ok(instructions.len())
    }
}
