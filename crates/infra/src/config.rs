//! Configuration loading and representation.
//!
//! Field codes and store ids are chosen when the stores are set up, so they
//! arrive as configuration. [`ReconcileConfig`] is built once, validated once,
//! and then passed read-only to every component.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use stockrecon_core::{ConfigurationError, StoreId};
use stockrecon_inventory::{TransactionSchema, TypeLabels};

use crate::remote::{MAX_PAGE_SIZE, MAX_UPSERT_BATCH, Query, SortOrder};

/// Environment variable naming a JSON config file that overrides `STOCKRECON_*`.
pub const CONFIG_FILE_ENV: &str = "STOCKRECON_CONFIG";

const PLACEHOLDERS: &[&str] = &["CHANGE_ME", "CHANGEME", "TODO", "FIXME", "XXX"];

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_write_batch_size() -> usize {
    MAX_UPSERT_BATCH
}

fn default_max_pages() -> usize {
    10_000
}

/// Where transactions live and how to read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionSource {
    pub store: StoreId,
    /// Unique ascending key, used for ordering and diagnostics.
    pub record_id_field: String,
    pub status_field: String,
    /// Only transactions whose status is one of these are counted.
    pub statuses: Vec<String>,
    pub type_field: String,
    pub identifier_field: String,
    pub quantity_field: String,
    #[serde(default)]
    pub item_name_field: Option<String>,
    pub sale_label: String,
    pub purchase_label: String,
}

impl TransactionSource {
    pub fn schema(&self) -> TransactionSchema {
        TransactionSchema {
            record_id_field: self.record_id_field.clone(),
            identifier_field: self.identifier_field.clone(),
            type_field: self.type_field.clone(),
            quantity_field: self.quantity_field.clone(),
            status_field: Some(self.status_field.clone()),
            item_name_field: self.item_name_field.clone(),
            labels: TypeLabels::new(&self.sale_label, &self.purchase_label),
        }
    }

    /// `status in (...) order by <record id> asc`.
    pub fn filter(&self) -> Query {
        Query::all()
            .where_in(&self.status_field, self.statuses.iter().cloned())
            .order_by(&self.record_id_field, SortOrder::Asc)
    }
}

/// Reference catalog: source of eligible keys and target of the write-back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogTarget {
    pub store: StoreId,
    pub identifier_field: String,
    pub stock_field: String,
}

/// Immutable pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileConfig {
    pub transactions: TransactionSource,
    pub catalog: CatalogTarget,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_write_batch_size")]
    pub write_batch_size: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Compute and report, but never write.
    #[serde(default)]
    pub dry_run: bool,
}

fn check_value(key: &str, value: &str) -> Result<(), ConfigurationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigurationError::missing(key));
    }
    let upper = trimmed.to_ascii_uppercase();
    let bracketed = trimmed.starts_with('<') && trimmed.ends_with('>');
    if bracketed || PLACEHOLDERS.contains(&upper.as_str()) {
        return Err(ConfigurationError::placeholder(key, value));
    }
    Ok(())
}

fn check_range(key: &str, value: usize, max: usize) -> Result<(), ConfigurationError> {
    if value == 0 || value > max {
        return Err(ConfigurationError::invalid(
            key,
            format!("must be between 1 and {max}, got {value}"),
        ));
    }
    Ok(())
}

impl ReconcileConfig {
    /// Reject unset, placeholder, and out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let t = &self.transactions;
        check_value("transactions.store", t.store.as_str())?;
        check_value("transactions.record_id_field", &t.record_id_field)?;
        check_value("transactions.status_field", &t.status_field)?;
        check_value("transactions.type_field", &t.type_field)?;
        check_value("transactions.identifier_field", &t.identifier_field)?;
        check_value("transactions.quantity_field", &t.quantity_field)?;
        check_value("transactions.sale_label", &t.sale_label)?;
        check_value("transactions.purchase_label", &t.purchase_label)?;
        if let Some(name) = &t.item_name_field {
            check_value("transactions.item_name_field", name)?;
        }
        if t.statuses.is_empty() {
            return Err(ConfigurationError::missing("transactions.statuses"));
        }
        for status in &t.statuses {
            check_value("transactions.statuses", status)?;
        }
        if t.sale_label.trim() == t.purchase_label.trim() {
            return Err(ConfigurationError::invalid(
                "transactions.purchase_label",
                "sale and purchase labels must differ",
            ));
        }

        let c = &self.catalog;
        check_value("catalog.store", c.store.as_str())?;
        check_value("catalog.identifier_field", &c.identifier_field)?;
        check_value("catalog.stock_field", &c.stock_field)?;
        if c.identifier_field == c.stock_field {
            return Err(ConfigurationError::invalid(
                "catalog.stock_field",
                "must differ from catalog.identifier_field",
            ));
        }

        check_range("page_size", self.page_size, MAX_PAGE_SIZE)?;
        check_range("write_batch_size", self.write_batch_size, MAX_UPSERT_BATCH)?;
        if self.max_pages == 0 {
            return Err(ConfigurationError::invalid("max_pages", "must be at least 1"));
        }

        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::invalid("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::invalid(CONFIG_FILE_ENV, format!("{}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Load from the process environment.
    ///
    /// If `STOCKRECON_CONFIG` is set it names a JSON file and wins;
    /// otherwise every value comes from `STOCKRECON_*` variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            return Self::from_json_file(path);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup using the `STOCKRECON_*` names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigurationError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigurationError::missing(key))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, default: usize| -> Result<usize, ConfigurationError> {
            match optional(key) {
                Some(v) => v
                    .trim()
                    .parse()
                    .map_err(|_| ConfigurationError::invalid(key, format!("not a number: {v:?}"))),
                None => Ok(default),
            }
        };
        let flag = |key: &str| -> Result<bool, ConfigurationError> {
            match optional(key).map(|v| v.trim().to_ascii_lowercase()) {
                None => Ok(false),
                Some(v) if matches!(v.as_str(), "1" | "true" | "yes") => Ok(true),
                Some(v) if matches!(v.as_str(), "0" | "false" | "no") => Ok(false),
                Some(v) => Err(ConfigurationError::invalid(key, format!("not a boolean: {v:?}"))),
            }
        };

        let statuses = required("STOCKRECON_TRANSACTIONS_STATUSES")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let config = Self {
            transactions: TransactionSource {
                store: StoreId::new(required("STOCKRECON_TRANSACTIONS_STORE")?),
                record_id_field: required("STOCKRECON_TRANSACTIONS_RECORD_ID_FIELD")?,
                status_field: required("STOCKRECON_TRANSACTIONS_STATUS_FIELD")?,
                statuses,
                type_field: required("STOCKRECON_TRANSACTIONS_TYPE_FIELD")?,
                identifier_field: required("STOCKRECON_TRANSACTIONS_IDENTIFIER_FIELD")?,
                quantity_field: required("STOCKRECON_TRANSACTIONS_QUANTITY_FIELD")?,
                item_name_field: optional("STOCKRECON_TRANSACTIONS_ITEM_NAME_FIELD"),
                sale_label: required("STOCKRECON_SALE_LABEL")?,
                purchase_label: required("STOCKRECON_PURCHASE_LABEL")?,
            },
            catalog: CatalogTarget {
                store: StoreId::new(required("STOCKRECON_CATALOG_STORE")?),
                identifier_field: required("STOCKRECON_CATALOG_IDENTIFIER_FIELD")?,
                stock_field: required("STOCKRECON_CATALOG_STOCK_FIELD")?,
            },
            page_size: number("STOCKRECON_PAGE_SIZE", default_page_size())?,
            write_batch_size: number("STOCKRECON_WRITE_BATCH_SIZE", default_write_batch_size())?,
            max_pages: number("STOCKRECON_MAX_PAGES", default_max_pages())?,
            dry_run: flag("STOCKRECON_DRY_RUN")?,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Connection settings for [`crate::remote::HttpRecordStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStoreConfig {
    /// e.g. `https://example.cybozu.com`
    pub base_url: String,
    /// Sent as-is; never logged.
    pub api_token: Option<String>,
    pub timeout: Duration,
}

impl HttpStoreConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_value("STOCKRECON_BASE_URL", &self.base_url)?;
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(ConfigurationError::invalid(
                "STOCKRECON_BASE_URL",
                "must start with http:// or https://",
            ));
        }
        if let Some(token) = &self.api_token {
            check_value("STOCKRECON_API_TOKEN", token)?;
        }
        if self.timeout.is_zero() {
            return Err(ConfigurationError::invalid(
                "STOCKRECON_TIMEOUT_SECS",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("STOCKRECON_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigurationError::missing("STOCKRECON_BASE_URL"))?;
        let timeout_secs = match lookup("STOCKRECON_TIMEOUT_SECS") {
            Some(v) => v.trim().parse::<u64>().map_err(|_| {
                ConfigurationError::invalid("STOCKRECON_TIMEOUT_SECS", format!("not a number: {v:?}"))
            })?,
            None => 30,
        };

        let config = Self {
            base_url: base_url.trim().to_string(),
            api_token: lookup("STOCKRECON_API_TOKEN").filter(|v| !v.trim().is_empty()),
            timeout: Duration::from_secs(timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }
}
