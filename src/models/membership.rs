use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Subscription state as reported by the billing side. Only `Active` and
/// `Trialing` confer access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
}

impl MembershipStatus {
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

/// A user's membership record. Owned externally; read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: String,
    pub status: MembershipStatus,
    pub current_period_start: i64,
    /// Exclusive upper bound of the validity window
    pub current_period_end: i64,
    pub updated_at: i64,
}

impl Membership {
    /// True if the membership is in good standing and `now` falls inside
    /// `[current_period_start, current_period_end)`.
    pub fn covers(&self, now: i64) -> bool {
        self.status.grants_access()
            && now >= self.current_period_start
            && now < self.current_period_end
    }
}
