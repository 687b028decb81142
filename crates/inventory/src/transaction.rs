use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use stockrecon_core::{ItemIdentifier, Record, RecordId};

/// Transaction kind, resolved once from the raw type label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "raw", rename_all = "snake_case")]
pub enum TransactionType {
    /// Stock leaves: the quantity is subtracted.
    Sale,
    /// Stock arrives: the quantity is added.
    Purchase,
    /// Any other label (or none). Never moves the balance.
    Unrecognized(Option<String>),
}

/// Raw labels the store uses for the two recognised transaction types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeLabels {
    pub sale: String,
    pub purchase: String,
}

impl TypeLabels {
    pub fn new(sale: impl Into<String>, purchase: impl Into<String>) -> Self {
        Self {
            sale: sale.into(),
            purchase: purchase.into(),
        }
    }

    /// Match is exact after trimming surrounding whitespace.
    pub fn resolve(&self, raw: Option<&str>) -> TransactionType {
        match raw.map(str::trim) {
            Some(label) if label == self.sale.trim() => TransactionType::Sale,
            Some(label) if label == self.purchase.trim() => TransactionType::Purchase,
            other => TransactionType::Unrecognized(other.map(str::to_string)),
        }
    }
}

/// Quantity as parsed from its textual field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Quantity {
    Missing,
    Invalid(String),
    Value(i64),
}

impl Quantity {
    /// Parse a base-10 integer, allowing surrounding whitespace and a sign.
    ///
    /// Anything else (`"abc"`, `"1.5"`, `"12abc"`) is `Invalid`. This is
    /// stricter than a leading-digits parse, which would read `"1.5"` as 1
    /// and `"12abc"` as 12; such rows are reported instead of being counted
    /// with a truncated quantity.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Quantity::Missing;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Quantity::Missing;
        }
        match trimmed.parse::<i64>() {
            Ok(v) => Quantity::Value(v),
            Err(_) => Quantity::Invalid(raw.to_string()),
        }
    }
}

/// Field codes used to read a transaction out of a remote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSchema {
    pub record_id_field: String,
    pub identifier_field: String,
    pub type_field: String,
    pub quantity_field: String,
    /// Read for diagnostics only.
    pub status_field: Option<String>,
    /// Read for diagnostics only.
    pub item_name_field: Option<String>,
    pub labels: TypeLabels,
}

impl TransactionSchema {
    /// Field projection to request from the store.
    pub fn fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.record_id_field.clone(),
            self.identifier_field.clone(),
            self.type_field.clone(),
            self.quantity_field.clone(),
        ];
        fields.extend(self.status_field.iter().cloned());
        fields.extend(self.item_name_field.iter().cloned());
        let mut seen = BTreeSet::new();
        fields.retain(|f| seen.insert(f.clone()));
        fields
    }
}

/// A parsed transaction. Read-only for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub record_id: RecordId,
    pub identifier: Option<ItemIdentifier>,
    pub kind: TransactionType,
    pub quantity: Quantity,
    pub status: Option<String>,
    pub item_name: Option<String>,
}

impl TransactionRecord {
    /// Build a transaction directly (fixtures, tests).
    pub fn new(identifier: &str, kind: TransactionType, quantity: Quantity) -> Self {
        Self {
            record_id: RecordId::unknown(),
            identifier: ItemIdentifier::new(identifier),
            kind,
            quantity,
            status: None,
            item_name: None,
        }
    }

    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = RecordId::new(record_id);
        self
    }

    /// Parse a remote record. Never fails: missing or malformed fields are
    /// kept as such and dealt with during aggregation.
    pub fn from_record(record: &Record, schema: &TransactionSchema) -> Self {
        let text = |field: &str| record.text(field).map(|v| v.into_owned());

        Self {
            record_id: text(&schema.record_id_field)
                .map(RecordId::new)
                .unwrap_or_else(RecordId::unknown),
            identifier: text(&schema.identifier_field).and_then(ItemIdentifier::new),
            kind: schema.labels.resolve(text(&schema.type_field).as_deref()),
            quantity: Quantity::parse(text(&schema.quantity_field).as_deref()),
            status: schema.status_field.as_deref().and_then(text),
            item_name: schema.item_name_field.as_deref().and_then(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TransactionSchema {
        TransactionSchema {
            record_id_field: "order_id".to_string(),
            identifier_field: "item_lookup".to_string(),
            type_field: "order_type".to_string(),
            quantity_field: "quantity".to_string(),
            status_field: Some("status".to_string()),
            item_name_field: Some("item_name".to_string()),
            labels: TypeLabels::new("Sales", "Purchase"),
        }
    }

    #[test]
    fn quantity_parses_signed_base10() {
        assert_eq!(Quantity::parse(Some("10")), Quantity::Value(10));
        assert_eq!(Quantity::parse(Some(" -3 ")), Quantity::Value(-3));
        assert_eq!(Quantity::parse(Some("+4")), Quantity::Value(4));
        assert_eq!(Quantity::parse(Some("007")), Quantity::Value(7));
    }

    #[test]
    fn quantity_rejects_non_integers() {
        assert_eq!(Quantity::parse(Some("abc")), Quantity::Invalid("abc".to_string()));
        assert_eq!(Quantity::parse(Some("1.5")), Quantity::Invalid("1.5".to_string()));
        assert_eq!(Quantity::parse(Some("12abc")), Quantity::Invalid("12abc".to_string()));
    }

    #[test]
    fn quantity_missing_when_absent_or_blank() {
        assert_eq!(Quantity::parse(None), Quantity::Missing);
        assert_eq!(Quantity::parse(Some("  ")), Quantity::Missing);
    }

    #[test]
    fn labels_resolve_to_closed_enum() {
        let labels = TypeLabels::new("Sales", "Purchase");
        assert_eq!(labels.resolve(Some("Sales")), TransactionType::Sale);
        assert_eq!(labels.resolve(Some(" Purchase ")), TransactionType::Purchase);
        assert_eq!(
            labels.resolve(Some("sales")),
            TransactionType::Unrecognized(Some("sales".to_string()))
        );
        assert_eq!(labels.resolve(None), TransactionType::Unrecognized(None));
    }

    #[test]
    fn from_record_reads_configured_fields() {
        let record = Record::new()
            .with_text("order_id", "17")
            .with_text("item_lookup", "0003")
            .with_text("order_type", "Purchase")
            .with_text("quantity", "12")
            .with_text("status", "Closed")
            .with_text("item_name", "Widget");

        let tx = TransactionRecord::from_record(&record, &schema());
        assert_eq!(tx.record_id.as_str(), "17");
        assert_eq!(tx.identifier.as_ref().map(|i| i.as_str()), Some("0003"));
        assert_eq!(tx.kind, TransactionType::Purchase);
        assert_eq!(tx.quantity, Quantity::Value(12));
        assert_eq!(tx.status.as_deref(), Some("Closed"));
        assert_eq!(tx.item_name.as_deref(), Some("Widget"));
    }

    #[test]
    fn from_record_tolerates_missing_fields() {
        let record = Record::new().with_text("quantity", "x");
        let tx = TransactionRecord::from_record(&record, &schema());
        assert_eq!(tx.record_id, RecordId::unknown());
        assert!(tx.identifier.is_none());
        assert_eq!(tx.kind, TransactionType::Unrecognized(None));
        assert_eq!(tx.quantity, Quantity::Invalid("x".to_string()));
    }

    #[test]
    fn schema_fields_include_optional_codes_once() {
        let fields = schema().fields();
        assert_eq!(
            fields,
            vec!["order_id", "item_lookup", "order_type", "quantity", "status", "item_name"]
        );
    }
}
