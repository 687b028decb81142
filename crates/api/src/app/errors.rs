use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockrecon_core::ReconError;

use crate::app::services::TriggerError;

pub fn trigger_error_to_response(err: TriggerError) -> axum::response::Response {
    match err {
        TriggerError::Busy => json_error(
            StatusCode::CONFLICT,
            "already_running",
            "a reconciliation pass is already running",
        ),
        TriggerError::Failed(ReconError::Retrieval(e)) => {
            let remote = e.remote().cloned();
            (
                StatusCode::BAD_GATEWAY,
                axum::Json(json!({
                    "error": "retrieval_failed",
                    "message": e.to_string(),
                    "remote": remote,
                })),
            )
                .into_response()
        }
        TriggerError::Failed(ReconError::Configuration(e)) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "configuration_error",
            e.to_string(),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
