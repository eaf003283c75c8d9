use axum::extract::State;

use crate::access;
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{AuthenticatedIdentity, Json, Query};
use crate::models::{PurchaseHistoryItem, PurchaseHistoryQuery};
use crate::pagination::Paginated;

pub async fn list_purchases(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Query(query): Query<PurchaseHistoryQuery>,
) -> Result<Json<Paginated<PurchaseHistoryItem>>> {
    let conn = state.db.get()?;
    let history = access::list_purchase_history(&conn, identity.user_id(), &query)?;
    Ok(Json(history))
}
