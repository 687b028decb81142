//! Infrastructure layer: remote record stores, configuration, and the
//! fetch / discover / write-back pipeline built on top of them.

pub mod config;
pub mod discovery;
pub mod fetcher;
pub mod pipeline;
pub mod reconciler;
pub mod remote;

pub use config::{CatalogTarget, HttpStoreConfig, ReconcileConfig, TransactionSource};
pub use discovery::discover_keys;
pub use fetcher::PaginatedFetcher;
pub use pipeline::{RunOptions, RunReport, StockReconciler};
pub use reconciler::{BatchOutcome, BatchReconciler, BatchReport, BatchStatus, WriteTarget};
