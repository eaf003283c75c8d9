mod stripe;

pub use stripe::*;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::ItemKind;

/// Metadata keys attached to every checkout session so the session is
/// self-describing when the client comes back to confirm it.
pub const METADATA_TYPE: &str = "type";
pub const METADATA_USER_ID: &str = "user_id";
pub const METADATA_ITEM_ID: &str = "item_id";

/// Request to create a processor product for a catalog item.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub item_id: &'a str,
    pub item_kind: ItemKind,
}

/// Request to mint an (immutable) price object.
#[derive(Debug, Clone)]
pub struct NewPrice<'a> {
    pub product_ref: &'a str,
    pub amount_minor: i64,
    pub currency: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalPrice {
    pub id: String,
    #[serde(rename = "unit_amount")]
    pub amount_minor: i64,
    pub currency: String,
}

/// Request for a one-time payment checkout session.
#[derive(Debug, Clone)]
pub struct NewCheckoutSession<'a> {
    pub price_ref: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    pub client_reference_id: &'a str,
    pub metadata: &'a [(&'a str, &'a str)],
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedCheckoutSession {
    pub id: String,
    pub url: String,
}

/// A checkout session as retrieved at confirmation time.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// "paid", "unpaid" or "no_payment_required"
    pub payment_status: String,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    /// Payment intent id; absent for some session modes
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// The key that makes fulfillment exactly-once: the payment intent id,
    /// or the session id when the processor issued no intent.
    pub fn idempotency_key(&self) -> &str {
        self.payment_intent
            .as_deref()
            .filter(|pi| !pi.is_empty())
            .unwrap_or(&self.id)
    }
}

/// The operations the core needs from a payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Provider name for logging and order records (e.g., "stripe")
    fn provider_name(&self) -> &'static str;

    /// Create a product and return its reference.
    async fn create_product(&self, product: &NewProduct<'_>) -> Result<String>;

    /// Mint a new price. Prices are immutable; drift means minting another.
    async fn create_price(&self, price: &NewPrice<'_>) -> Result<ExternalPrice>;

    async fn create_checkout_session(
        &self,
        session: &NewCheckoutSession<'_>,
    ) -> Result<CreatedCheckoutSession>;

    /// Retrieve a session by id. `Ok(None)` if the processor does not know it.
    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<Option<CheckoutSession>>;
}

/// Run a processor call with an upper bound on its duration.
///
/// A timeout is reported as `Upstream`; callers may retry, since every
/// processor-facing operation in the core is idempotent or side-effect free.
pub async fn with_timeout<T, F>(timeout: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                "Payment processor call '{}' timed out after {:?}",
                operation,
                timeout
            );
            Err(AppError::Upstream(format!("{} timed out", operation)))
        }
    }
}
