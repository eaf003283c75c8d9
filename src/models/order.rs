use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::ItemKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

/// A completed (or attempted) payment, keyed by the processor's idempotency key
/// (payment intent id, or checkout session id when no intent exists).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub idempotency_key: String,
    pub user_id: String,
    pub session_id: String,
    pub provider: String,
    pub status: OrderStatus,
    pub total_minor: i64,
    pub currency: String,
    pub created_at: i64,
    pub items: Vec<OrderLineItem>,
}

/// Snapshot of what was bought, taken at payment time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub kind: ItemKind,
    pub item_id: String,
    pub title_snapshot: String,
    pub amount_minor: i64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub idempotency_key: String,
    pub user_id: String,
    pub session_id: String,
    pub provider: String,
    pub status: OrderStatus,
    pub items: Vec<OrderLineItem>,
}

impl NewOrder {
    pub fn total_minor(&self) -> i64 {
        self.items.iter().map(|i| i.amount_minor).sum()
    }

    /// Currency of the order. Line items of one order share a currency.
    pub fn currency(&self) -> &str {
        self.items.first().map(|i| i.currency.as_str()).unwrap_or_default()
    }
}

/// A line item joined with its order's creation time, as read for purchase history.
#[derive(Debug, Clone)]
pub struct PaidLineItem {
    pub order_id: String,
    pub order_created_at: i64,
    pub position: i64,
    pub line: OrderLineItem,
}
