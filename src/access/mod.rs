//! The entitlement and fulfillment core.
//!
//! Every operation takes the caller's identity explicitly and talks to the
//! payment processor through `AppState::processor`. Database connections are
//! checked out per step and never held across a processor call.

pub mod checkout;
pub mod entitlement;
pub mod fulfillment;
pub mod history;
pub mod pricing;

pub use checkout::{CheckoutResponse, create_checkout};
pub use entitlement::{Entitlement, UnlockReason, resolve, resolve_entitlement};
pub use fulfillment::{FulfillmentOutcome, PaymentRecord, RecordedPayment, fulfill, record_payment};
pub use history::list_purchase_history;
pub use pricing::{ExternalPricing, ensure_external_pricing};

use chrono::Utc;

use crate::error::{AppError, Result, msg};
use crate::id::{EntityType, is_valid_id_of};

/// Longest checkout session id accepted from a client.
const MAX_SESSION_ID_LEN: usize = 255;

pub(crate) fn now() -> i64 {
    Utc::now().timestamp()
}

pub(crate) fn validate_item_id(item_id: &str) -> Result<()> {
    if !is_valid_id_of(EntityType::CatalogItem, item_id) {
        return Err(AppError::InvalidInput(msg::INVALID_ITEM_ID.into()));
    }
    Ok(())
}

/// Session ids are opaque to us but end up in a URL path, so only plain
/// identifier characters are accepted.
pub(crate) fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(AppError::InvalidInput(msg::INVALID_SESSION_ID.into()));
    }
    Ok(())
}
