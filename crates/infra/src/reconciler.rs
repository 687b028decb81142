//! Batched write-back of ledger balances.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use stockrecon_core::{FieldValue, ItemIdentifier, StoreId, WriteBatchError};
use stockrecon_inventory::{SkippedEntry, StockLedger, UpdateInstruction};

use crate::remote::{MAX_UPSERT_BATCH, RecordStore, UpsertInstruction};

/// Where balances are written: `value_field` of the record whose
/// `match_field` equals the item identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    pub store: StoreId,
    pub match_field: String,
    pub value_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    Applied { updated: usize },
    Failed { error: WriteBatchError },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub batch: usize,
    pub identifiers: Vec<ItemIdentifier>,
    #[serde(flatten)]
    pub status: BatchStatus,
}

/// Per-batch result of a write-back, in issue order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batches: Vec<BatchOutcome>,
    /// Ledger entries never sent because the catalog does not know them.
    pub skipped: Vec<SkippedEntry>,
    /// Eligible entries never sent because the balance does not fit `i64`.
    pub out_of_range: Vec<SkippedEntry>,
}

impl BatchReport {
    pub fn updated_identifiers(&self) -> impl Iterator<Item = &ItemIdentifier> {
        self.batches
            .iter()
            .filter(|b| matches!(b.status, BatchStatus::Applied { .. }))
            .flat_map(|b| b.identifiers.iter())
    }

    pub fn failed_identifiers(&self) -> impl Iterator<Item = &ItemIdentifier> {
        self.batches
            .iter()
            .filter(|b| matches!(b.status, BatchStatus::Failed { .. }))
            .flat_map(|b| b.identifiers.iter())
    }

    pub fn errors(&self) -> impl Iterator<Item = &WriteBatchError> {
        self.batches.iter().filter_map(|b| match &b.status {
            BatchStatus::Failed { error } => Some(error),
            BatchStatus::Applied { .. } => None,
        })
    }

    /// True when no batch failed.
    pub fn is_complete(&self) -> bool {
        self.errors().next().is_none()
    }
}

/// Writes ledger balances back in bounded upsert batches.
///
/// Batches go out one at a time. A failed batch is recorded and the
/// remaining batches are still attempted; nothing is retried.
#[derive(Debug)]
pub struct BatchReconciler<'a, S: ?Sized> {
    remote: &'a S,
    batch_size: usize,
}

impl<'a, S> BatchReconciler<'a, S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(remote: &'a S) -> Self {
        Self {
            remote,
            batch_size: MAX_UPSERT_BATCH,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_UPSERT_BATCH);
        self
    }

    /// Write every eligible balance of `ledger`.
    ///
    /// The ledger is only read: the caller keeps it for its own report, and
    /// nothing here mutates or retains it past the call.
    pub async fn reconcile(
        &self,
        target: &WriteTarget,
        ledger: &StockLedger,
        eligible: &BTreeSet<ItemIdentifier>,
    ) -> BatchReport {
        if eligible.is_empty() {
            warn!(store = %target.store, "no eligible catalog keys; nothing to write");
            return BatchReport::default();
        }

        let plan = ledger.plan_write_back(eligible);
        let mut report = BatchReport {
            batches: Vec::new(),
            skipped: plan.skipped,
            out_of_range: plan.out_of_range,
        };

        for (batch, chunk) in plan.instructions.chunks(self.batch_size).enumerate() {
            let identifiers: Vec<ItemIdentifier> =
                chunk.iter().map(|i| i.match_key.clone()).collect();
            let upserts: Vec<UpsertInstruction> =
                chunk.iter().map(|i| to_upsert(target, i)).collect();

            let status = match self.remote.batch_upsert(&target.store, &upserts).await {
                Ok(updated) => {
                    info!(store = %target.store, batch, updated, "batch applied");
                    BatchStatus::Applied { updated }
                }
                Err(source) => {
                    let error = WriteBatchError {
                        batch,
                        identifiers: identifiers.clone(),
                        source,
                    };
                    warn!(store = %target.store, batch, error = %error, "batch failed");
                    BatchStatus::Failed { error }
                }
            };

            report.batches.push(BatchOutcome {
                batch,
                identifiers,
                status,
            });
        }

        report
    }
}

fn to_upsert(target: &WriteTarget, instruction: &UpdateInstruction) -> UpsertInstruction {
    UpsertInstruction::new(target.match_field.clone(), instruction.match_key.as_str())
        .set(
            target.value_field.clone(),
            FieldValue::text(instruction.new_balance.to_string()),
        )
}
