use axum::extract::State;

use crate::access::{self, Entitlement};
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{AuthenticatedIdentity, Json, Path};

pub async fn get_item_access(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(item_id): Path<String>,
) -> Result<Json<Entitlement>> {
    let entitlement = access::resolve_entitlement(&state, &identity, &item_id)?;
    Ok(Json(entitlement))
}
