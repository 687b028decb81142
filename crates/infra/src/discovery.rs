//! Key discovery against the reference catalog.

use std::collections::BTreeSet;

use tracing::{debug, info};

use stockrecon_core::{ItemIdentifier, RetrievalError, StoreId};

use crate::fetcher::PaginatedFetcher;
use crate::remote::{Query, RecordStore};

/// Every distinct, non-empty identifier in `store`.
///
/// Full scan with a single-field projection. Records without an identifier
/// are skipped silently; an empty catalog yields an empty set.
pub async fn discover_keys<S>(
    fetcher: &PaginatedFetcher<'_, S>,
    store: &StoreId,
    identifier_field: &str,
) -> Result<BTreeSet<ItemIdentifier>, RetrievalError>
where
    S: RecordStore + ?Sized,
{
    let records = fetcher
        .fetch_all(store, &Query::all(), &[identifier_field.to_string()])
        .await?;

    let total = records.len();
    let keys: BTreeSet<ItemIdentifier> = records
        .iter()
        .filter_map(|r| r.text(identifier_field))
        .filter_map(|v| ItemIdentifier::new(v.into_owned()))
        .collect();

    let blank = total - records.iter().filter(|r| r.text(identifier_field).is_some()).count();
    if blank > 0 {
        debug!(store = %store, blank, "catalog records without identifier skipped");
    }
    info!(store = %store, records = total, keys = keys.len(), "discovered catalog keys");

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{InMemoryRecordStore, StoreCall};
    use stockrecon_core::{Record, RemoteError};

    fn catalog() -> StoreId {
        StoreId::new("14")
    }

    #[tokio::test]
    async fn deduplicates_and_skips_blank_identifiers() {
        let store = InMemoryRecordStore::new();
        store.insert_records(
            &catalog(),
            vec![
                Record::new().with_text("item_code", "0001"),
                Record::new().with_text("item_code", "0002"),
                Record::new().with_text("item_code", "0001"),
                Record::new().with_text("item_code", "   "),
                Record::new().with_text("other", "x"),
            ],
        );

        let fetcher = PaginatedFetcher::new(&store);
        let keys = discover_keys(&fetcher, &catalog(), "item_code").await.unwrap();

        let keys: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["0001", "0002"]);
    }

    #[tokio::test]
    async fn empty_catalog_is_not_an_error() {
        let store = InMemoryRecordStore::new();
        let fetcher = PaginatedFetcher::new(&store);
        let keys = discover_keys(&fetcher, &catalog(), "item_code").await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn requests_only_the_identifier_field() {
        let store = InMemoryRecordStore::new();
        store.insert_records(
            &catalog(),
            vec![Record::new().with_text("item_code", "A").with_text("stock", "3")],
        );
        let fetcher = PaginatedFetcher::new(&store);
        discover_keys(&fetcher, &catalog(), "item_code").await.unwrap();

        match store.calls().as_slice() {
            [StoreCall::Query { fields, filter, offset: 0, returned: 1, .. }] => {
                assert_eq!(fields, &vec!["item_code".to_string()]);
                assert_eq!(filter, "");
            }
            other => panic!("unexpected calls: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retrieval_failure_propagates() {
        let store = InMemoryRecordStore::new();
        store.fail_query_at(&catalog(), 0, RemoteError::new("unauthorized").with_status(401));
        let fetcher = PaginatedFetcher::new(&store);

        let err = discover_keys(&fetcher, &catalog(), "item_code").await.unwrap_err();
        assert_eq!(err.remote().and_then(|r| r.status), Some(401));
    }
}
