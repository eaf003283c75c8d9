mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::{AppError, Result, msg};
use crate::notifications::PurchaseNotifier;
use crate::payments::PaymentProcessor;

pub type DbPool = Pool<SqliteConnectionManager>;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state shared by every request.
#[derive(Clone)]
pub struct AppState {
    /// Main database pool (catalog, memberships, orders, access grants)
    pub db: DbPool,
    /// Base URL for checkout redirects (e.g., https://shop.example.com)
    pub base_url: String,
    /// None when no processor credentials are configured
    pub processor: Option<Arc<dyn PaymentProcessor>>,
    /// Upper bound on any single payment processor call
    pub processor_timeout: Duration,
    pub notifier: Arc<dyn PurchaseNotifier>,
}

impl AppState {
    /// The configured payment processor, or `Configuration` if there is none.
    pub fn processor(&self) -> Result<&dyn PaymentProcessor> {
        self.processor
            .as_deref()
            .ok_or_else(|| AppError::Configuration(msg::PROCESSOR_NOT_CONFIGURED.into()))
    }
}

pub fn create_pool(database_path: &str) -> std::result::Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
    });
    Pool::builder().max_size(10).build(manager)
}
