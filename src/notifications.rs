//! One-time purchase notifications.
//!
//! Fired only when a fulfillment created the access grant for the first time,
//! so replayed confirmations never notify twice. When `NOTIFY_WEBHOOK_URL` is
//! configured the event is POSTed there (e.g., to a mailer); otherwise it is
//! only logged.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use reqwest::Client;
use serde::Serialize;

use crate::models::ItemKind;

/// Retry delays in milliseconds for notification webhooks.
/// Quick retries keep the background task short-lived.
const NOTIFY_RETRY_DELAYS: &[u64] = &[100, 200];

/// A first-time purchase, as handed to notifiers.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseConfirmed {
    pub user_id: String,
    pub item_id: String,
    pub kind: ItemKind,
    pub title: String,
    pub order_id: String,
    /// Idempotency key of the payment (receivers can deduplicate on it)
    pub idempotency_key: String,
    pub amount_minor: i64,
    pub currency: String,
    /// Unix timestamp
    pub timestamp: i64,
}

pub trait PurchaseNotifier: Send + Sync {
    /// Must not block; long-running delivery belongs in a spawned task.
    fn purchase_confirmed(&self, event: &PurchaseConfirmed);
}

/// Logs the purchase and does nothing else.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl PurchaseNotifier for LogNotifier {
    fn purchase_confirmed(&self, event: &PurchaseConfirmed) {
        tracing::info!(
            user_id = %event.user_id,
            item_id = %event.item_id,
            order_id = %event.order_id,
            "Purchase confirmed: {} ({} {})",
            event.title,
            event.amount_minor,
            event.currency
        );
    }
}

/// POSTs purchase events as JSON to a webhook URL from a background task.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

impl PurchaseNotifier for WebhookNotifier {
    fn purchase_confirmed(&self, event: &PurchaseConfirmed) {
        LogNotifier.purchase_confirmed(event);

        let client = self.client.clone();
        let url = self.url.clone();
        let event = event.clone();
        let order_id = event.order_id.clone();

        // Panics in the task are logged rather than silently swallowed.
        tokio::spawn(
            AssertUnwindSafe(async move {
                send_notification(&client, &url, &event).await;
            })
            .catch_unwind()
            .map(move |result| {
                if let Err(panic) = result {
                    let panic_msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(
                        "Notification task panicked for order '{}': {}",
                        order_id,
                        panic_msg
                    );
                }
            }),
        );
    }
}

async fn send_notification<T: Serialize>(client: &Client, url: &str, event: &T) {
    for (attempt, delay_ms) in std::iter::once(&0u64)
        .chain(NOTIFY_RETRY_DELAYS.iter())
        .enumerate()
    {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
        }

        match client
            .post(url)
            .json(event)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                if attempt > 0 {
                    tracing::debug!("Notification webhook succeeded after {} retries", attempt);
                }
                return;
            }
            Ok(resp) => {
                tracing::debug!("Notification webhook returned {}", resp.status());
            }
            Err(e) => {
                tracing::debug!("Notification webhook failed: {}", e);
            }
        }
    }

    tracing::warn!(
        "Notification webhook failed after {} attempts",
        NOTIFY_RETRY_DELAYS.len() + 1
    );
}
