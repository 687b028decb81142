//! Stock ledger: signed balance per item, folded from transactions.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::warn;

use stockrecon_core::{FieldParseWarning, ItemIdentifier, RecordId};

use crate::transaction::{Quantity, TransactionRecord, TransactionType};

/// Signed stock balance. Wider than a single quantity so that folding any
/// realistic number of `i64` deltas is exact in every order.
pub type Balance = i128;

/// Running balance per item, ordered by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StockLedger {
    balances: BTreeMap<ItemIdentifier, Balance>,
}

/// Non-fatal observation made while folding transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "diagnostic", rename_all = "snake_case")]
pub enum LedgerDiagnostic {
    /// The transaction was skipped or left the balance untouched.
    Parse { warning: FieldParseWarning },
    /// The identifier was not part of the seed set and was added at zero.
    UnseededIdentifier {
        record_id: RecordId,
        identifier: ItemIdentifier,
    },
}

impl core::fmt::Display for LedgerDiagnostic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LedgerDiagnostic::Parse { warning } => core::fmt::Display::fmt(warning, f),
            LedgerDiagnostic::UnseededIdentifier {
                record_id,
                identifier,
            } => write!(
                f,
                "record {record_id}: item {identifier} is not in the reference catalog"
            ),
        }
    }
}

/// Result of [`aggregate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub ledger: StockLedger,
    /// In transaction input order.
    pub diagnostics: Vec<LedgerDiagnostic>,
}

/// One write-back target: set `match_key`'s stock to `new_balance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateInstruction {
    pub match_key: ItemIdentifier,
    pub new_balance: i64,
}

/// Ledger entry withheld from write-back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub identifier: ItemIdentifier,
    pub balance: Balance,
}

/// Ledger split into what may be written and what may not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteBackPlan {
    pub instructions: Vec<UpdateInstruction>,
    /// Keys the catalog does not know.
    pub skipped: Vec<SkippedEntry>,
    /// Eligible keys whose balance does not fit the stock field (`i64`).
    pub out_of_range: Vec<SkippedEntry>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger with one zero balance per key.
    pub fn seeded<'a>(keys: impl IntoIterator<Item = &'a ItemIdentifier>) -> Self {
        Self {
            balances: keys.into_iter().map(|k| (k.clone(), 0)).collect(),
        }
    }

    pub fn balance(&self, identifier: &ItemIdentifier) -> Option<Balance> {
        self.balances.get(identifier).copied()
    }

    pub fn contains(&self, identifier: &ItemIdentifier) -> bool {
        self.balances.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemIdentifier, Balance)> {
        self.balances.iter().map(|(k, v)| (k, *v))
    }

    pub fn balances(&self) -> &BTreeMap<ItemIdentifier, Balance> {
        &self.balances
    }

    /// Fold one transaction into the ledger, returning what was observed.
    ///
    /// Skips (without mutation) records with a missing identifier, a missing
    /// quantity, or a quantity that is not an integer. Unknown identifiers
    /// are added at zero. Only `Sale` and `Purchase` move the balance.
    pub fn apply(&mut self, tx: &TransactionRecord) -> Vec<LedgerDiagnostic> {
        let mut diagnostics = Vec::new();
        let record_id = tx.record_id.clone();

        let Some(identifier) = tx.identifier.clone() else {
            diagnostics.push(LedgerDiagnostic::Parse {
                warning: FieldParseWarning::MissingIdentifier { record_id },
            });
            return diagnostics;
        };

        let quantity = match &tx.quantity {
            Quantity::Value(q) => Balance::from(*q),
            Quantity::Missing => {
                diagnostics.push(LedgerDiagnostic::Parse {
                    warning: FieldParseWarning::MissingQuantity {
                        record_id,
                        identifier,
                    },
                });
                return diagnostics;
            }
            Quantity::Invalid(raw) => {
                diagnostics.push(LedgerDiagnostic::Parse {
                    warning: FieldParseWarning::InvalidQuantity {
                        record_id,
                        identifier,
                        raw: raw.clone(),
                    },
                });
                return diagnostics;
            }
        };

        if !self.balances.contains_key(&identifier) {
            self.balances.insert(identifier.clone(), 0);
            diagnostics.push(LedgerDiagnostic::UnseededIdentifier {
                record_id: record_id.clone(),
                identifier: identifier.clone(),
            });
        }

        let delta = match &tx.kind {
            TransactionType::Purchase => quantity,
            TransactionType::Sale => -quantity,
            TransactionType::Unrecognized(raw) => {
                diagnostics.push(LedgerDiagnostic::Parse {
                    warning: FieldParseWarning::UnrecognizedType {
                        record_id,
                        identifier,
                        raw: raw.clone(),
                    },
                });
                return diagnostics;
            }
        };

        // Exact below 2^64 transactions per key; saturation past that is unreachable.
        if let Some(balance) = self.balances.get_mut(&identifier) {
            *balance = balance.saturating_add(delta);
        }

        diagnostics
    }

    /// Split the ledger against the set of keys known to the catalog.
    ///
    /// Never produces an instruction for a key outside `eligible`; those
    /// entries are returned in `skipped` instead. Eligible balances outside
    /// the `i64` range are returned in `out_of_range` and not written.
    pub fn plan_write_back(&self, eligible: &BTreeSet<ItemIdentifier>) -> WriteBackPlan {
        let mut plan = WriteBackPlan::default();
        for (identifier, balance) in &self.balances {
            let entry = || SkippedEntry {
                identifier: identifier.clone(),
                balance: *balance,
            };
            if !eligible.contains(identifier) {
                plan.skipped.push(entry());
                continue;
            }
            match i64::try_from(*balance) {
                Ok(new_balance) => plan.instructions.push(UpdateInstruction {
                    match_key: identifier.clone(),
                    new_balance,
                }),
                Err(_) => {
                    warn!(
                        %identifier,
                        balance = *balance,
                        "balance exceeds the stock field range; not written"
                    );
                    plan.out_of_range.push(entry());
                }
            }
        }
        plan
    }
}

/// Fold `transactions` (in order) into a ledger seeded with `seed_keys`.
///
/// Every diagnostic is also emitted as a `warn` event.
pub fn aggregate<'a>(
    transactions: impl IntoIterator<Item = &'a TransactionRecord>,
    seed_keys: &BTreeSet<ItemIdentifier>,
) -> Aggregation {
    let mut ledger = StockLedger::seeded(seed_keys);
    let mut diagnostics = Vec::new();

    for tx in transactions {
        for diagnostic in ledger.apply(tx) {
            warn!(record_id = %tx.record_id, "{diagnostic}");
            diagnostics.push(diagnostic);
        }
    }

    Aggregation {
        ledger,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(s: &str) -> ItemIdentifier {
        ItemIdentifier::new(s).unwrap()
    }

    fn keys(ids: &[&str]) -> BTreeSet<ItemIdentifier> {
        ids.iter().map(|s| id(s)).collect()
    }

    fn purchase(item: &str, qty: i64) -> TransactionRecord {
        TransactionRecord::new(item, TransactionType::Purchase, Quantity::Value(qty))
    }

    fn sale(item: &str, qty: i64) -> TransactionRecord {
        TransactionRecord::new(item, TransactionType::Sale, Quantity::Value(qty))
    }

    #[test]
    fn no_transactions_yields_seed_keys_at_zero() {
        let agg = aggregate(&[], &keys(&["A", "B", "C"]));
        assert_eq!(agg.ledger.len(), 3);
        assert!(agg.ledger.iter().all(|(_, b)| b == 0));
        assert!(agg.diagnostics.is_empty());
    }

    #[test]
    fn purchase_adds_and_sale_subtracts_exactly() {
        let seeds = keys(&["A"]);

        let agg = aggregate(&[purchase("A", 5)], &seeds);
        assert_eq!(agg.ledger.balance(&id("A")), Some(5));

        let agg = aggregate(&[sale("A", 5)], &seeds);
        assert_eq!(agg.ledger.balance(&id("A")), Some(-5));
    }

    #[test]
    fn unrecognized_type_leaves_balance_unchanged() {
        let tx = TransactionRecord::new(
            "A",
            TransactionType::Unrecognized(Some("Return".to_string())),
            Quantity::Value(5),
        )
        .with_record_id("9");

        let agg = aggregate(&[purchase("A", 2), tx], &keys(&["A"]));
        assert_eq!(agg.ledger.balance(&id("A")), Some(2));
        assert_eq!(agg.diagnostics.len(), 1);
        match &agg.diagnostics[0] {
            LedgerDiagnostic::Parse {
                warning: FieldParseWarning::UnrecognizedType { record_id, raw, .. },
            } => {
                assert_eq!(record_id.as_str(), "9");
                assert_eq!(raw.as_deref(), Some("Return"));
            }
            other => panic!("unexpected diagnostic: {other:?}"),
        }
    }

    #[test]
    fn malformed_quantity_is_recorded_not_applied() {
        let bad = TransactionRecord::new(
            "A",
            TransactionType::Purchase,
            Quantity::Invalid("abc".to_string()),
        );

        let agg = aggregate(&[bad], &keys(&["A"]));
        assert_eq!(agg.ledger.balance(&id("A")), Some(0));
        assert!(matches!(
            agg.diagnostics.as_slice(),
            [LedgerDiagnostic::Parse {
                warning: FieldParseWarning::InvalidQuantity { .. }
            }]
        ));
    }

    #[test]
    fn malformed_quantity_for_unknown_item_adds_no_key() {
        let bad = TransactionRecord::new(
            "Z",
            TransactionType::Purchase,
            Quantity::Invalid("abc".to_string()),
        );
        let agg = aggregate(&[bad], &keys(&["A"]));
        assert!(!agg.ledger.contains(&id("Z")));
    }

    #[test]
    fn missing_identifier_or_quantity_is_skipped() {
        let no_id = TransactionRecord::new("", TransactionType::Purchase, Quantity::Value(3));
        let no_qty = TransactionRecord::new("A", TransactionType::Purchase, Quantity::Missing);

        let agg = aggregate(&[no_id, no_qty], &keys(&["A"]));
        assert_eq!(agg.ledger.balance(&id("A")), Some(0));
        assert_eq!(agg.ledger.len(), 1);
        assert!(matches!(
            agg.diagnostics.as_slice(),
            [
                LedgerDiagnostic::Parse {
                    warning: FieldParseWarning::MissingIdentifier { .. }
                },
                LedgerDiagnostic::Parse {
                    warning: FieldParseWarning::MissingQuantity { .. }
                },
            ]
        ));
    }

    #[test]
    fn unseeded_identifier_is_added_and_reported() {
        let agg = aggregate(&[purchase("C", 99)], &keys(&["A"]));
        assert_eq!(agg.ledger.balance(&id("C")), Some(99));
        assert!(matches!(
            agg.diagnostics.as_slice(),
            [LedgerDiagnostic::UnseededIdentifier { .. }]
        ));
    }

    #[test]
    fn reference_scenario() {
        let txs = vec![
            purchase("A", 10),
            sale("A", 3),
            purchase("B", 7),
            purchase("C", 99),
        ];
        let seeds = keys(&["A", "B"]);

        let agg = aggregate(&txs, &seeds);
        assert_eq!(agg.ledger.balance(&id("A")), Some(7));
        assert_eq!(agg.ledger.balance(&id("B")), Some(7));
        assert_eq!(agg.ledger.balance(&id("C")), Some(99));

        let plan = agg.ledger.plan_write_back(&seeds);
        assert_eq!(
            plan.instructions,
            vec![
                UpdateInstruction {
                    match_key: id("A"),
                    new_balance: 7
                },
                UpdateInstruction {
                    match_key: id("B"),
                    new_balance: 7
                },
            ]
        );
        assert_eq!(
            plan.skipped,
            vec![SkippedEntry {
                identifier: id("C"),
                balance: 99
            }]
        );
    }

    #[test]
    fn order_does_not_matter_at_the_i64_bounds() {
        let seeds = keys(&["A"]);
        let a = aggregate(
            &[purchase("A", i64::MAX), purchase("A", 1), sale("A", 1)],
            &seeds,
        );
        let b = aggregate(
            &[purchase("A", i64::MAX), sale("A", 1), purchase("A", 1)],
            &seeds,
        );

        assert_eq!(a.ledger, b.ledger);
        assert_eq!(a.ledger.balance(&id("A")), Some(i64::MAX as Balance));
    }

    #[test]
    fn sale_of_i64_min_is_exact() {
        let agg = aggregate(&[sale("A", i64::MIN)], &keys(&["A"]));
        assert_eq!(agg.ledger.balance(&id("A")), Some(-(i64::MIN as Balance)));
    }

    #[test]
    fn out_of_range_balance_is_withheld_from_write_back() {
        let seeds = keys(&["A", "B"]);
        let agg = aggregate(
            &[purchase("A", i64::MAX), purchase("A", 1), purchase("B", 4)],
            &seeds,
        );

        let plan = agg.ledger.plan_write_back(&seeds);
        assert_eq!(
            plan.instructions,
            vec![UpdateInstruction {
                match_key: id("B"),
                new_balance: 4
            }]
        );
        assert_eq!(
            plan.out_of_range,
            vec![SkippedEntry {
                identifier: id("A"),
                balance: i64::MAX as Balance + 1
            }]
        );
        assert!(plan.skipped.is_empty());
    }

    fn arb_transaction() -> impl Strategy<Value = TransactionRecord> {
        let item = prop::sample::select(vec!["A", "B", "C", "D", ""]);
        let kind = prop_oneof![
            Just(TransactionType::Sale),
            Just(TransactionType::Purchase),
            Just(TransactionType::Unrecognized(Some("Transfer".to_string()))),
        ];
        let quantity = prop_oneof![
            8 => (-1_000i64..1_000).prop_map(Quantity::Value),
            1 => prop_oneof![Just(i64::MAX), Just(i64::MIN), Just(i64::MAX - 1)].prop_map(Quantity::Value),
            1 => Just(Quantity::Missing),
            1 => Just(Quantity::Invalid("abc".to_string())),
        ];
        (item, kind, quantity).prop_map(|(i, k, q)| TransactionRecord::new(i, k, q))
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: any permutation of the transactions yields the same ledger.
        #[test]
        fn aggregation_is_order_independent(
            (original, shuffled) in prop::collection::vec(arb_transaction(), 0..40)
                .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
        ) {
            let seeds = keys(&["A", "B"]);
            let a = aggregate(&original, &seeds);
            let b = aggregate(&shuffled, &seeds);
            prop_assert_eq!(a.ledger, b.ledger);
        }

        /// Property: write-back never targets a key outside the eligible set.
        #[test]
        fn write_back_only_targets_eligible_keys(
            txs in prop::collection::vec(arb_transaction(), 0..40),
            eligible in prop::collection::btree_set(prop::sample::select(vec!["A", "B", "C", "X"]), 0..4)
        ) {
            let eligible: BTreeSet<ItemIdentifier> = eligible.into_iter().map(id).collect();
            let agg = aggregate(&txs, &eligible);
            let plan = agg.ledger.plan_write_back(&eligible);

            for instruction in &plan.instructions {
                prop_assert!(eligible.contains(&instruction.match_key));
            }
            for skipped in &plan.skipped {
                prop_assert!(!eligible.contains(&skipped.identifier));
            }
            prop_assert_eq!(
                plan.instructions.len() + plan.skipped.len() + plan.out_of_range.len(),
                agg.ledger.len()
            );
        }
    }
}
