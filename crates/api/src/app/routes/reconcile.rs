use std::sync::Arc;

use axum::{Json, body::Bytes, extract::Extension, http::StatusCode, response::IntoResponse};

use stockrecon_infra::RunOptions;

use crate::app::dto::ReconcileRequest;
use crate::app::errors;
use crate::app::services::AppServices;

/// `POST /reconcile`: run one pass and return its report.
///
/// An empty body uses the configured defaults.
pub async fn trigger(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> axum::response::Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ReconcileRequest::default()
    } else {
        match serde_json::from_slice::<ReconcileRequest>(&body) {
            Ok(r) => r,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", e.to_string());
            }
        }
    };

    let options = RunOptions {
        dry_run: request.dry_run.unwrap_or(services.config().dry_run),
    };

    match services.trigger(options).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::trigger_error_to_response(e),
    }
}

/// `GET /reconcile/last`: report of the most recent successful pass.
pub async fn last(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.last_report() {
        Some(report) => Json(report).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "no pass has completed yet"),
    }
}
