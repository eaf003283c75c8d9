use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::access::{self, CheckoutResponse};
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{AuthenticatedIdentity, Json};

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub item_id: String,
}

pub async fn start_checkout(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let response = access::create_checkout(&state, &identity, &request.item_id).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub item_id: String,
    /// The `session_id` the processor appended to the success URL
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub unlocked: bool,
}

pub async fn confirm_checkout(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>> {
    let outcome =
        access::fulfill(&state, &identity, &request.item_id, &request.session_id).await?;
    Ok(Json(ConfirmResponse {
        unlocked: outcome.unlocked,
    }))
}
