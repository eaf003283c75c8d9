//! Turns a paid checkout session into an order and a permanent access grant.
//!
//! Exactly-once is carried entirely by two unique keys: the order's
//! idempotency key and the grant's (user, item) pair. Replays and concurrent
//! confirmations of the same payment all converge on the same rows.

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::AuthenticatedIdentity;
use crate::models::{GrantVia, NewAccessGrant, NewOrder, OrderLineItem, OrderStatus};
use crate::notifications::PurchaseConfirmed;
use crate::payments::{METADATA_ITEM_ID, METADATA_TYPE, METADATA_USER_ID, with_timeout};

use super::{now, validate_item_id, validate_session_id};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FulfillmentOutcome {
    /// Always true on success, including replays
    pub unlocked: bool,
    /// True only for the call that created both the order and the grant
    pub granted_new: bool,
    pub order_id: String,
}

/// A verified payment, ready to be written.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub idempotency_key: String,
    pub user_id: String,
    pub session_id: String,
    pub provider: String,
    pub line: OrderLineItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPayment {
    pub order_id: String,
    pub order_created: bool,
    pub grant_created: bool,
    pub granted_new: bool,
}

/// Write the order and grant for a verified payment in one IMMEDIATE
/// transaction, inserting each only if absent.
pub fn record_payment(
    conn: &mut Connection,
    payment: &PaymentRecord,
    now: i64,
) -> Result<RecordedPayment> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let order = NewOrder {
        idempotency_key: payment.idempotency_key.clone(),
        user_id: payment.user_id.clone(),
        session_id: payment.session_id.clone(),
        provider: payment.provider.clone(),
        status: OrderStatus::Paid,
        items: vec![payment.line.clone()],
    };

    let (order_id, order_created) = match queries::insert_order_if_absent(&tx, &order, now)? {
        Some(order_id) => {
            queries::insert_order_items(&tx, &order_id, &order.items)?;
            (order_id, true)
        }
        None => {
            let existing = queries::get_order_by_idempotency_key(&tx, &order.idempotency_key)?
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "order for key {} vanished after conflict",
                        order.idempotency_key
                    ))
                })?;
            (existing.id, false)
        }
    };

    let grant_created = queries::insert_access_grant_if_absent(
        &tx,
        &NewAccessGrant {
            user_id: payment.user_id.clone(),
            item_id: payment.line.item_id.clone(),
            via: GrantVia::Purchase,
            activated_at: now,
            expires_at: None,
        },
    )?;

    tx.commit()?;

    Ok(RecordedPayment {
        order_id,
        order_created,
        grant_created,
        granted_new: order_created && grant_created,
    })
}

/// Confirm a checkout session the client came back with and unlock the item.
///
/// Safe to call any number of times for the same session.
pub async fn fulfill(
    state: &AppState,
    identity: &AuthenticatedIdentity,
    item_id: &str,
    session_id: &str,
) -> Result<FulfillmentOutcome> {
    validate_item_id(item_id)?;
    validate_session_id(session_id)?;
    let user_id = identity.user_id();

    let processor = state.processor()?;
    let session = with_timeout(
        state.processor_timeout,
        "retrieve_checkout_session",
        processor.retrieve_checkout_session(session_id),
    )
    .await?
    .or_not_found(msg::SESSION_NOT_FOUND)?;

    if !session.is_paid() {
        tracing::info!(
            user_id = %user_id,
            "Session {} not paid yet (status {})",
            session.id,
            session.payment_status
        );
        return Err(AppError::PaymentIncomplete(msg::PAYMENT_NOT_PAID.into()));
    }

    let mut conn = state.db.get()?;
    let item = queries::get_catalog_item(&conn, item_id)?.or_not_found(msg::ITEM_NOT_FOUND)?;

    if session.metadata_value(METADATA_TYPE) != Some(item.kind.as_ref()) {
        return Err(AppError::MetadataMismatch(msg::SESSION_KIND_MISMATCH.into()));
    }
    if session.metadata_value(METADATA_USER_ID) != Some(user_id) {
        tracing::warn!(
            user_id = %user_id,
            "Session {} was confirmed by a different account",
            session.id
        );
        return Err(AppError::MetadataMismatch(msg::SESSION_USER_MISMATCH.into()));
    }
    if session.metadata_value(METADATA_ITEM_ID) != Some(item.id.as_str()) {
        return Err(AppError::MetadataMismatch(msg::SESSION_ITEM_MISMATCH.into()));
    }

    let line = OrderLineItem {
        kind: item.kind,
        item_id: item.id.clone(),
        title_snapshot: item.title.clone(),
        amount_minor: session.amount_total.unwrap_or(item.price_minor),
        currency: session
            .currency
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| item.currency.clone()),
    };
    let payment = PaymentRecord {
        idempotency_key: session.idempotency_key().to_string(),
        user_id: user_id.to_string(),
        session_id: session.id.clone(),
        provider: processor.provider_name().to_string(),
        line,
    };

    let timestamp = now();
    let recorded = record_payment(&mut conn, &payment, timestamp)?;
    drop(conn);

    if recorded.granted_new {
        tracing::info!(
            user_id = %user_id,
            item_id = %item.id,
            "Fulfilled order {} (key {})",
            recorded.order_id,
            payment.idempotency_key
        );
        state.notifier.purchase_confirmed(&PurchaseConfirmed {
            user_id: payment.user_id.clone(),
            item_id: item.id.clone(),
            kind: item.kind,
            title: item.title.clone(),
            order_id: recorded.order_id.clone(),
            idempotency_key: payment.idempotency_key.clone(),
            amount_minor: payment.line.amount_minor,
            currency: payment.line.currency.clone(),
            timestamp,
        });
    } else {
        tracing::debug!(
            user_id = %user_id,
            item_id = %item.id,
            "Replayed confirmation for key {} (order created: {}, grant created: {})",
            payment.idempotency_key,
            recorded.order_created,
            recorded.grant_created
        );
    }

    Ok(FulfillmentOutcome {
        unlocked: true,
        granted_new: recorded.granted_new,
        order_id: recorded.order_id,
    })
}
