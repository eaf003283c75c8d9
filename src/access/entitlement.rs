//! Decides whether a user may open an item.
//!
//! Three independent signals, checked cheapest first: the item is free, the
//! user's membership covers it, or a direct access grant exists. The
//! membership and grant lookups are best-effort: a failing lookup is logged
//! and only disables its own path, never the whole decision.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::AuthenticatedIdentity;
use crate::models::{CatalogItem, GrantVia};

use super::{now, validate_item_id};

/// Which signal unlocked the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlockReason {
    Free,
    Membership,
    Purchase,
    Grant,
    Admin,
}

impl From<GrantVia> for UnlockReason {
    fn from(via: GrantVia) -> Self {
        match via {
            GrantVia::Purchase => Self::Purchase,
            GrantVia::Membership => Self::Membership,
            GrantVia::Grant => Self::Grant,
            GrantVia::Admin => Self::Admin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Entitlement {
    pub unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnlockReason>,
}

impl Entitlement {
    pub fn unlocked(reason: UnlockReason) -> Self {
        Self {
            unlocked: true,
            reason: Some(reason),
        }
    }

    pub fn locked() -> Self {
        Self {
            unlocked: false,
            reason: None,
        }
    }
}

/// Resolve entitlement for an already loaded item. Never fails.
pub fn resolve(conn: &Connection, user_id: &str, item: &CatalogItem, now: i64) -> Entitlement {
    if item.is_free() {
        return Entitlement::unlocked(UnlockReason::Free);
    }

    if item.included_in_membership && membership_covers(conn, user_id, now) {
        return Entitlement::unlocked(UnlockReason::Membership);
    }

    if let Some(via) = effective_grant(conn, user_id, &item.id, now) {
        return Entitlement::unlocked(via.into());
    }

    Entitlement::locked()
}

/// True if the user has an active or trialing membership whose window
/// contains `now`. Lookup failures count as "not covered".
pub fn membership_covers(conn: &Connection, user_id: &str, now: i64) -> bool {
    match queries::get_membership(conn, user_id) {
        Ok(Some(membership)) => membership.covers(now),
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(
                "Membership lookup failed for user {}, treating as no membership: {}",
                user_id,
                e
            );
            false
        }
    }
}

/// The grant's origin if the user holds an effective grant for the item.
/// Lookup failures count as "no grant".
fn effective_grant(conn: &Connection, user_id: &str, item_id: &str, now: i64) -> Option<GrantVia> {
    match queries::get_access_grant(conn, user_id, item_id) {
        Ok(grant) => grant.filter(|g| g.is_effective(now)).map(|g| g.via),
        Err(e) => {
            tracing::warn!(
                "Access grant lookup failed for user {} item {}, treating as no grant: {}",
                user_id,
                item_id,
                e
            );
            None
        }
    }
}

/// Resolve entitlement for `item_id` on behalf of the caller.
pub fn resolve_entitlement(
    state: &AppState,
    identity: &AuthenticatedIdentity,
    item_id: &str,
) -> Result<Entitlement> {
    validate_item_id(item_id)?;

    let conn = state.db.get()?;
    let item = queries::get_catalog_item(&conn, item_id)?.or_not_found(msg::ITEM_NOT_FOUND)?;

    Ok(resolve(&conn, identity.user_id(), &item, now()))
}
