use std::env;
use std::time::Duration;

use crate::payments::{STRIPE_API_BASE, StripeConfig};

const DEFAULT_PROCESSOR_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    /// None when `STRIPE_SECRET_KEY` is unset; checkout and confirmation
    /// then fail with a configuration error.
    pub stripe: Option<StripeConfig>,
    pub processor_timeout: Duration,
    pub notify_webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("SHELFPASS_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url = env::var("BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let processor_timeout = Duration::from_secs(
            env::var("PROCESSOR_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&secs| secs > 0)
                .unwrap_or(DEFAULT_PROCESSOR_TIMEOUT_SECS),
        );

        let stripe = non_empty_var("STRIPE_SECRET_KEY").map(|secret_key| StripeConfig {
            secret_key,
            api_base: non_empty_var("STRIPE_API_BASE")
                .unwrap_or_else(|| STRIPE_API_BASE.to_string()),
            timeout: processor_timeout,
        });

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "shelfpass.db".to_string()),
            base_url,
            dev_mode,
            stripe,
            processor_timeout,
            notify_webhook_url: non_empty_var("NOTIFY_WEBHOOK_URL"),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
