//! Prefixed ID generation for shelfpass entities.
//!
//! All IDs use an `sp_` brand prefix so they can never be confused with
//! payment processor IDs (Stripe's `prod_`, `price_`, `cs_`, `pi_`, etc.).
//!
//! Format: `sp_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &["sp_usr_", "sp_item_", "sp_ord_", "sp_oli_"];

/// Validate that a string is a valid shelfpass prefixed ID.
///
/// This is a cheap check to reject garbage before hitting the database.
/// Validates format: `sp_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Validate that `s` is a prefixed ID of the given entity type.
pub fn is_valid_id_of(entity: EntityType, s: &str) -> bool {
    is_valid_prefixed_id(s)
        && s.strip_prefix(entity.prefix())
            .is_some_and(|rest| rest.starts_with('_'))
}

/// Entity types that have prefixed IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    /// Issued by the upstream identity provider, validated here only.
    User,
    CatalogItem,
    Order,
    OrderLineItem,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::User => "sp_usr",
            Self::CatalogItem => "sp_item",
            Self::Order => "sp_ord",
            Self::OrderLineItem => "sp_oli",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
