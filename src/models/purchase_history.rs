use serde::{Deserialize, Serialize};

use super::ItemKind;

/// One distinct purchased item in a user's history.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseHistoryItem {
    pub kind: ItemKind,
    pub item_id: String,
    /// Live title when the item still exists, otherwise the title at purchase time
    pub title: String,
    pub slug: Option<String>,
    pub thumbnail_url: Option<String>,
    pub link: String,
    pub amount_minor: i64,
    pub currency: String,
    /// Most recent time the item was paid for
    pub purchased_at: i64,
}

/// Query parameters for the purchase history endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseHistoryQuery {
    /// Comma-separated kinds, e.g. "ebook,resource". "membership" is accepted and ignored.
    #[serde(default)]
    pub kinds: Option<String>,
    /// Case-insensitive title substring
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}
