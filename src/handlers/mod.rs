mod access;
mod checkout;
mod purchases;

pub use access::*;
pub use checkout::*;
pub use purchases::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// All routes. Every route except `/health` requires the identity header set
/// by the upstream auth layer.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/items/{item_id}/access", get(get_item_access))
        .route("/checkout", post(start_checkout))
        // Called by the client after the processor redirects back
        .route("/checkout/confirm", post(confirm_checkout))
        .route("/purchases", get(list_purchases))
}
