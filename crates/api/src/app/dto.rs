use serde::{Deserialize, Serialize};

/// Body of `POST /reconcile`. Absent fields fall back to the configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileRequest {
    #[serde(default)]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub dry_run_default: bool,
    pub transactions_store: String,
    pub catalog_store: String,
}
