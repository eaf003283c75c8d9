use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};

use super::{
    CheckoutSession, CreatedCheckoutSession, ExternalPrice, NewCheckoutSession, NewPrice,
    NewProduct, PaymentProcessor,
};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Overridable for staging proxies and tests
    pub api_base: String,
    /// Per-request timeout applied by the HTTP client
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await?;

        parse_response(path, response).await
    }
}

async fn parse_response<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StripeErrorBody>(&error_text)
            .ok()
            .and_then(|b| b.error.message)
            .unwrap_or(error_text);
        return Err(AppError::Upstream(format!(
            "Stripe API error on {} ({}): {}",
            path, status, message
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("Failed to parse Stripe response: {}", e)))
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    fn provider_name(&self) -> &'static str {
        "stripe"
    }

    async fn create_product(&self, product: &NewProduct<'_>) -> Result<String> {
        let created: CreatedObject = self
            .post_form(
                "/v1/products",
                &[
                    ("name", product.name),
                    ("metadata[item_id]", product.item_id),
                    ("metadata[item_kind]", product.item_kind.as_ref()),
                ],
            )
            .await?;
        Ok(created.id)
    }

    async fn create_price(&self, price: &NewPrice<'_>) -> Result<ExternalPrice> {
        let amount = price.amount_minor.to_string();
        self.post_form(
            "/v1/prices",
            &[
                ("product", price.product_ref),
                ("unit_amount", amount.as_str()),
                ("currency", price.currency),
            ],
        )
        .await
    }

    async fn create_checkout_session(
        &self,
        session: &NewCheckoutSession<'_>,
    ) -> Result<CreatedCheckoutSession> {
        let metadata_keys: Vec<String> = session
            .metadata
            .iter()
            .map(|(k, _)| format!("metadata[{}]", k))
            .collect();

        let mut form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("success_url", session.success_url),
            ("cancel_url", session.cancel_url),
            ("client_reference_id", session.client_reference_id),
            ("line_items[0][price]", session.price_ref),
            ("line_items[0][quantity]", "1"),
        ];
        form.extend(
            metadata_keys
                .iter()
                .zip(session.metadata.iter())
                .map(|(key, (_, value))| (key.as_str(), *value)),
        );

        self.post_form("/v1/checkout/sessions", &form).await
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<Option<CheckoutSession>> {
        let path = format!("/v1/checkout/sessions/{}", session_id);
        let response = self
            .client
            .get(self.url(&path))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        parse_response(&path, response).await.map(Some)
    }
}
