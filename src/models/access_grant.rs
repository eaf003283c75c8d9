use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// How an access grant came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GrantVia {
    Purchase,
    Membership,
    Grant,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GrantStatus {
    Active,
    Revoked,
}

/// Persisted entitlement for one (user, item) pair. At most one row exists per
/// pair; rows are revoked, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGrant {
    pub user_id: String,
    pub item_id: String,
    pub via: GrantVia,
    pub status: GrantStatus,
    pub activated_at: i64,
    /// None = perpetual
    pub expires_at: Option<i64>,
}

impl AccessGrant {
    pub fn is_effective(&self, now: i64) -> bool {
        self.status == GrantStatus::Active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

#[derive(Debug, Clone)]
pub struct NewAccessGrant {
    pub user_id: String,
    pub item_id: String,
    pub via: GrantVia,
    pub activated_at: i64,
    pub expires_at: Option<i64>,
}
