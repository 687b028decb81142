use axum::{
    Router,
    routing::{get, post},
};

pub mod reconcile;
pub mod system;

/// Router for the reconciliation endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/status", get(system::status))
        .route("/reconcile", post(reconcile::trigger))
        .route("/reconcile/last", get(reconcile::last))
}
