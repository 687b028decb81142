//! Inventory stock domain.
//!
//! Transaction parsing and stock ledger aggregation, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod ledger;
pub mod transaction;

pub use ledger::{
    Aggregation, Balance, LedgerDiagnostic, SkippedEntry, StockLedger, UpdateInstruction, WriteBackPlan,
    aggregate,
};
pub use transaction::{Quantity, TransactionRecord, TransactionSchema, TransactionType, TypeLabels};
