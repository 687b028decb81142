use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode};

use crate::app::dto::StatusResponse;
use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn status(Extension(services): Extension<Arc<AppServices>>) -> Json<StatusResponse> {
    let config = services.config();
    Json(StatusResponse {
        running: services.is_running(),
        dry_run_default: config.dry_run,
        transactions_store: config.transactions.store.to_string(),
        catalog_store: config.catalog.store.to_string(),
    })
}
