use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Kind of purchasable item. Each kind lives in its own area of the storefront.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, AsRefStr,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemKind {
    Ebook,
    Resource,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::Ebook, ItemKind::Resource];

    /// Generic listing path used when an item has no slug (or no longer exists).
    pub fn listing_path(&self) -> &'static str {
        match self {
            Self::Ebook => "/ebooks",
            Self::Resource => "/resources",
        }
    }

    /// Deep link to an item's page, falling back to the listing.
    pub fn link_for(&self, slug: Option<&str>) -> String {
        match slug.filter(|s| !s.is_empty()) {
            Some(slug) => format!("{}/{}", self.listing_path(), slug),
            None => self.listing_path().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PublishStatus {
    Draft,
    Published,
    Archived,
}

/// A sellable item as owned by the authoring subsystem.
///
/// The core only reads pricing and publish state, and writes back the cached
/// payment processor references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub kind: ItemKind,
    pub title: String,
    pub slug: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Price in minor currency units (pence, cents). 0 = free.
    pub price_minor: i64,
    /// Lowercase ISO 4217 code, e.g. "gbp"
    pub currency: String,
    pub included_in_membership: bool,
    pub status: PublishStatus,
    #[serde(skip_serializing)]
    pub external_refs: ExternalRefs,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CatalogItem {
    pub fn is_free(&self) -> bool {
        self.price_minor == 0
    }

    pub fn is_published(&self) -> bool {
        self.status == PublishStatus::Published
    }

    /// The price the item should be sold at right now.
    pub fn pricing_snapshot(&self) -> PricingSnapshot {
        PricingSnapshot {
            amount_minor: self.price_minor,
            currency: self.currency.to_lowercase(),
        }
    }
}

/// Cached payment processor objects for an item.
///
/// `price_minor`/`price_currency` record what the cached price object was
/// minted with, so drift can be detected without a processor round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRefs {
    pub product_ref: Option<String>,
    pub price_ref: Option<String>,
    pub price_minor: Option<i64>,
    pub price_currency: Option<String>,
}

impl ExternalRefs {
    /// Returns the cached price ref only if it was minted for `snapshot`.
    pub fn price_matching(&self, snapshot: &PricingSnapshot) -> Option<&str> {
        let price_ref = self.price_ref.as_deref()?;
        let same_amount = self.price_minor == Some(snapshot.amount_minor);
        let same_currency = self
            .price_currency
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(&snapshot.currency));
        (same_amount && same_currency).then_some(price_ref)
    }
}

/// Amount and currency derived from a catalog item at checkout time. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingSnapshot {
    pub amount_minor: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCatalogItem {
    pub kind: ItemKind,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub price_minor: i64,
    pub currency: String,
    #[serde(default)]
    pub included_in_membership: bool,
    pub status: PublishStatus,
}
