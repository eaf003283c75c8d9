use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::AuthenticatedIdentity;
use crate::payments::{
    METADATA_ITEM_ID, METADATA_TYPE, METADATA_USER_ID, NewCheckoutSession, with_timeout,
};

use super::entitlement::membership_covers;
use super::{now, pricing, validate_item_id};

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub session_id: String,
}

/// Start a one-time payment for an item.
///
/// Refuses items the caller can already open for free or through their
/// membership. Nothing is persisted here except refreshed processor pricing
/// refs; the order only exists once the payment is confirmed.
pub async fn create_checkout(
    state: &AppState,
    identity: &AuthenticatedIdentity,
    item_id: &str,
) -> Result<CheckoutResponse> {
    validate_item_id(item_id)?;
    let user_id = identity.user_id();

    let item = {
        let conn = state.db.get()?;
        let item = queries::get_catalog_item(&conn, item_id)?
            .filter(|item| item.is_published())
            .or_not_found(msg::ITEM_NOT_FOUND)?;

        if item.is_free() {
            return Err(AppError::AlreadyUnlocked(msg::ITEM_IS_FREE.into()));
        }
        if item.included_in_membership && membership_covers(&conn, user_id, now()) {
            return Err(AppError::AlreadyUnlocked(msg::COVERED_BY_MEMBERSHIP.into()));
        }
        item
    };

    let processor = state.processor()?;
    let pricing = pricing::sync_item(state, processor, &item).await?;

    let success_url = format!(
        "{}/purchases/confirm?item_id={}&session_id={{CHECKOUT_SESSION_ID}}",
        state.base_url, item.id
    );
    let cancel_url = format!("{}/purchases/cancelled?item_id={}", state.base_url, item.id);
    let metadata = [
        (METADATA_TYPE, item.kind.as_ref()),
        (METADATA_USER_ID, user_id),
        (METADATA_ITEM_ID, item.id.as_str()),
    ];

    let session = with_timeout(
        state.processor_timeout,
        "create_checkout_session",
        processor.create_checkout_session(&NewCheckoutSession {
            price_ref: &pricing.price_ref,
            success_url: &success_url,
            cancel_url: &cancel_url,
            client_reference_id: user_id,
            metadata: &metadata,
        }),
    )
    .await?;

    tracing::info!(
        user_id = %user_id,
        item_id = %item.id,
        "Created checkout session {} at {} {}",
        session.id,
        item.price_minor,
        item.currency
    );

    Ok(CheckoutResponse {
        checkout_url: session.url,
        session_id: session.id,
    })
}
