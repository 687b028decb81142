//! One reconciliation pass, end to end.
//!
//! discover keys -> fetch transactions -> aggregate -> write back.
//! Retrieval failures abort the pass before anything is written; write
//! failures are per batch and end up in the report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};

use stockrecon_core::{ConfigurationError, ReconError, RunId};
use stockrecon_inventory::{
    LedgerDiagnostic, SkippedEntry, StockLedger, TransactionRecord, UpdateInstruction, aggregate,
};

use crate::config::ReconcileConfig;
use crate::discovery::discover_keys;
use crate::fetcher::PaginatedFetcher;
use crate::reconciler::{BatchReconciler, BatchReport, WriteTarget};
use crate::remote::RecordStore;

/// Per-run overrides on top of [`ReconcileConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
}

/// Everything a pass computed and did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub transactions_fetched: usize,
    pub catalog_keys: usize,
    pub ledger: StockLedger,
    pub diagnostics: Vec<LedgerDiagnostic>,
    /// Balances that are (or, in a dry run, would be) written.
    pub planned: Vec<UpdateInstruction>,
    /// Balances withheld because the catalog does not know the item.
    pub skipped: Vec<SkippedEntry>,
    /// Balances withheld because they do not fit the stock field.
    pub out_of_range: Vec<SkippedEntry>,
    /// `None` for a dry run.
    pub write: Option<BatchReport>,
}

impl RunReport {
    /// True when every planned balance was written.
    pub fn is_complete(&self) -> bool {
        self.write.as_ref().is_none_or(BatchReport::is_complete)
    }
}

/// Runs reconciliation passes against one [`RecordStore`].
#[derive(Debug)]
pub struct StockReconciler<S> {
    remote: S,
    config: ReconcileConfig,
}

impl<S> StockReconciler<S>
where
    S: RecordStore,
{
    /// Validates `config` once; every pass reuses it unchanged.
    pub fn new(remote: S, config: ReconcileConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { remote, config })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn remote(&self) -> &S {
        &self.remote
    }

    pub async fn run(&self) -> Result<RunReport, ReconError> {
        self.run_with(RunOptions {
            dry_run: self.config.dry_run,
        })
        .await
    }

    pub async fn run_with(&self, options: RunOptions) -> Result<RunReport, ReconError> {
        let run_id = RunId::new();
        let span = info_span!("reconcile", %run_id, dry_run = options.dry_run);
        self.pass(run_id, options).instrument(span).await
    }

    async fn pass(&self, run_id: RunId, options: RunOptions) -> Result<RunReport, ReconError> {
        let started_at = Utc::now();
        let cfg = &self.config;
        info!("reconciliation started");

        let fetcher = PaginatedFetcher::new(&self.remote)
            .with_page_size(cfg.page_size)
            .with_max_pages(cfg.max_pages);

        let keys =
            discover_keys(&fetcher, &cfg.catalog.store, &cfg.catalog.identifier_field).await?;
        if keys.is_empty() {
            warn!(store = %cfg.catalog.store, "reference catalog has no keys");
        }

        let schema = cfg.transactions.schema();
        let records = fetcher
            .fetch_all(
                &cfg.transactions.store,
                &cfg.transactions.filter(),
                &schema.fields(),
            )
            .await?;
        info!(store = %cfg.transactions.store, count = records.len(), "fetched transactions");

        let transactions: Vec<TransactionRecord> = records
            .iter()
            .map(|r| TransactionRecord::from_record(r, &schema))
            .collect();
        for tx in &transactions {
            debug!(
                record_id = %tx.record_id,
                identifier = tx.identifier.as_ref().map(|i| i.as_str()),
                item_name = tx.item_name.as_deref(),
                status = tx.status.as_deref(),
                kind = ?tx.kind,
                quantity = ?tx.quantity,
                "transaction"
            );
        }

        let aggregation = aggregate(&transactions, &keys);
        for (identifier, balance) in aggregation.ledger.iter() {
            info!(%identifier, balance, "stock");
        }

        let plan = aggregation.ledger.plan_write_back(&keys);
        if !plan.skipped.is_empty() {
            let orphans: Vec<&str> = plan.skipped.iter().map(|s| s.identifier.as_str()).collect();
            warn!(
                count = orphans.len(),
                identifiers = ?orphans,
                "balances for items missing from the catalog will not be written"
            );
        }

        let write = if options.dry_run {
            info!(planned = plan.instructions.len(), "dry run; skipping write-back");
            None
        } else {
            let target = WriteTarget {
                store: cfg.catalog.store.clone(),
                match_field: cfg.catalog.identifier_field.clone(),
                value_field: cfg.catalog.stock_field.clone(),
            };
            let report = BatchReconciler::new(&self.remote)
                .with_batch_size(cfg.write_batch_size)
                .reconcile(&target, &aggregation.ledger, &keys)
                .await;
            Some(report)
        };

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            dry_run: options.dry_run,
            transactions_fetched: transactions.len(),
            catalog_keys: keys.len(),
            ledger: aggregation.ledger,
            diagnostics: aggregation.diagnostics,
            planned: plan.instructions,
            skipped: plan.skipped,
            out_of_range: plan.out_of_range,
            write,
        };

        if report.is_complete() {
            info!(planned = report.planned.len(), "reconciliation finished");
        } else {
            warn!("reconciliation finished with failed write batches");
        }
        Ok(report)
    }
}
