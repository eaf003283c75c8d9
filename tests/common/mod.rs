//! Test utilities and fixtures for shelfpass integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use rusqlite::Connection;
use tempfile::TempDir;

// Re-export the main library crate
pub use shelfpass::access;
pub use shelfpass::db::{AppState, create_pool, init_db, queries};
pub use shelfpass::error::{AppError, Result};
pub use shelfpass::extractors::{AuthenticatedIdentity, USER_ID_HEADER};
pub use shelfpass::handlers;
pub use shelfpass::id::EntityType;
pub use shelfpass::models::*;
pub use shelfpass::notifications::{PurchaseConfirmed, PurchaseNotifier};
pub use shelfpass::payments::{
    CheckoutSession, CreatedCheckoutSession, ExternalPrice, METADATA_ITEM_ID, METADATA_TYPE,
    METADATA_USER_ID, NewCheckoutSession, NewPrice, NewProduct, PaymentProcessor,
};

pub const ONE_DAY: i64 = 86400;

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn future_timestamp(days: i64) -> i64 {
    now() + days * ONE_DAY
}

pub fn past_timestamp(days: i64) -> i64 {
    now() - days * ONE_DAY
}

// ============================================================================
// Fake payment processor
// ============================================================================

/// A checkout session creation request as the fake processor saw it.
#[derive(Debug, Clone)]
pub struct RecordedSession {
    pub id: String,
    pub price_ref: String,
    pub success_url: String,
    pub cancel_url: String,
    pub client_reference_id: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct FakeState {
    products: Vec<(String, String)>,
    prices: Vec<(ExternalPrice, String)>,
    created_sessions: Vec<RecordedSession>,
    sessions: HashMap<String, CheckoutSession>,
}

/// In-memory processor with scripted sessions and call counters.
#[derive(Debug, Default)]
pub struct FakeProcessor {
    state: Mutex<FakeState>,
    retrieve_calls: AtomicUsize,
    /// Every call sleeps this long first (for timeout tests)
    delay: Mutex<Option<Duration>>,
    fail_retrieve: Mutex<bool>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product_count(&self) -> usize {
        self.state.lock().unwrap().products.len()
    }

    pub fn price_count(&self) -> usize {
        self.state.lock().unwrap().prices.len()
    }

    /// (product_ref, item_id) pairs in creation order
    pub fn products(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().products.clone()
    }

    /// (price, product_ref) pairs in creation order
    pub fn prices(&self) -> Vec<(ExternalPrice, String)> {
        self.state.lock().unwrap().prices.clone()
    }

    pub fn created_sessions(&self) -> Vec<RecordedSession> {
        self.state.lock().unwrap().created_sessions.clone()
    }

    pub fn retrieve_calls(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }

    /// Make `retrieve_checkout_session` return this session.
    pub fn put_session(&self, session: CheckoutSession) {
        self.state
            .lock()
            .unwrap()
            .sessions
            .insert(session.id.clone(), session);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn set_fail_retrieve(&self, fail: bool) {
        *self.fail_retrieve.lock().unwrap() = fail;
    }

    async fn maybe_sleep(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    async fn create_product(&self, product: &NewProduct<'_>) -> Result<String> {
        self.maybe_sleep().await;
        let mut state = self.state.lock().unwrap();
        let id = format!("prod_{}", state.products.len() + 1);
        state.products.push((id.clone(), product.item_id.to_string()));
        Ok(id)
    }

    async fn create_price(&self, price: &NewPrice<'_>) -> Result<ExternalPrice> {
        self.maybe_sleep().await;
        let mut state = self.state.lock().unwrap();
        let created = ExternalPrice {
            id: format!("price_{}", state.prices.len() + 1),
            amount_minor: price.amount_minor,
            currency: price.currency.to_string(),
        };
        state
            .prices
            .push((created.clone(), price.product_ref.to_string()));
        Ok(created)
    }

    async fn create_checkout_session(
        &self,
        session: &NewCheckoutSession<'_>,
    ) -> Result<CreatedCheckoutSession> {
        self.maybe_sleep().await;
        let mut state = self.state.lock().unwrap();
        let id = format!("cs_test_{}", state.created_sessions.len() + 1);
        state.created_sessions.push(RecordedSession {
            id: id.clone(),
            price_ref: session.price_ref.to_string(),
            success_url: session.success_url.to_string(),
            cancel_url: session.cancel_url.to_string(),
            client_reference_id: session.client_reference_id.to_string(),
            metadata: session
                .metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        Ok(CreatedCheckoutSession {
            url: format!("https://checkout.test/pay/{}", id),
            id,
        })
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<Option<CheckoutSession>> {
        self.maybe_sleep().await;
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_retrieve.lock().unwrap() {
            return Err(AppError::Upstream("fake processor unavailable".into()));
        }
        Ok(self.state.lock().unwrap().sessions.get(session_id).cloned())
    }
}

/// Build a paid session whose metadata matches `item` bought by `user_id`.
pub fn paid_session(
    session_id: &str,
    payment_intent: Option<&str>,
    user_id: &str,
    item: &CatalogItem,
) -> CheckoutSession {
    CheckoutSession {
        id: session_id.to_string(),
        payment_status: "paid".to_string(),
        amount_total: Some(item.price_minor),
        currency: Some(item.currency.clone()),
        payment_intent: payment_intent.map(str::to_string),
        metadata: HashMap::from([
            (METADATA_TYPE.to_string(), item.kind.as_ref().to_string()),
            (METADATA_USER_ID.to_string(), user_id.to_string()),
            (METADATA_ITEM_ID.to_string(), item.id.clone()),
        ]),
    }
}

// ============================================================================
// Recording notifier
// ============================================================================

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<PurchaseConfirmed>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<PurchaseConfirmed> {
        self.events.lock().unwrap().clone()
    }
}

impl PurchaseNotifier for RecordingNotifier {
    fn purchase_confirmed(&self, event: &PurchaseConfirmed) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// App state
// ============================================================================

pub const TEST_BASE_URL: &str = "https://shop.test";

/// Everything a test needs. The temp dir must outlive the pool.
pub struct TestEnv {
    pub state: AppState,
    pub processor: Arc<FakeProcessor>,
    pub notifier: Arc<RecordingNotifier>,
    _dir: TempDir,
}

impl TestEnv {
    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }

    pub fn app(&self) -> Router {
        handlers::router().with_state(self.state.clone())
    }
}

/// Create app state backed by a temp-file database and a fake processor.
///
/// A file (not `:memory:`) database is used so every pooled connection sees
/// the same data.
pub fn create_test_env() -> TestEnv {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("shelfpass-test.db");
    let pool = create_pool(path.to_str().unwrap()).expect("Failed to create pool");
    {
        let conn = pool.get().unwrap();
        init_db(&conn).expect("Failed to initialize schema");
    }

    let processor = Arc::new(FakeProcessor::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let state = AppState {
        db: pool,
        base_url: TEST_BASE_URL.to_string(),
        processor: Some(processor.clone()),
        processor_timeout: Duration::from_secs(5),
        notifier: notifier.clone(),
    };

    TestEnv {
        state,
        processor,
        notifier,
        _dir: dir,
    }
}

/// Same as `create_test_env`, but with no payment processor configured.
pub fn create_test_env_without_processor() -> TestEnv {
    let mut env = create_test_env();
    env.state.processor = None;
    env
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn new_identity() -> AuthenticatedIdentity {
    AuthenticatedIdentity::new(EntityType::User.gen_id()).unwrap()
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Create a published item priced in GBP.
pub fn create_test_item(
    conn: &Connection,
    kind: ItemKind,
    title: &str,
    price_minor: i64,
) -> CatalogItem {
    create_test_item_with(conn, kind, title, price_minor, false, PublishStatus::Published)
}

pub fn create_test_item_with(
    conn: &Connection,
    kind: ItemKind,
    title: &str,
    price_minor: i64,
    included_in_membership: bool,
    status: PublishStatus,
) -> CatalogItem {
    let input = CreateCatalogItem {
        kind,
        title: title.to_string(),
        slug: Some(slugify(title)),
        thumbnail_url: Some(format!("https://cdn.test/{}.png", slugify(title))),
        price_minor,
        currency: "gbp".to_string(),
        included_in_membership,
        status,
    };
    queries::create_catalog_item(conn, &input).expect("Failed to create test item")
}

pub fn set_membership(
    conn: &Connection,
    user_id: &str,
    status: MembershipStatus,
    period_start: i64,
    period_end: i64,
) {
    queries::upsert_membership(
        conn,
        &Membership {
            user_id: user_id.to_string(),
            status,
            current_period_start: period_start,
            current_period_end: period_end,
            updated_at: now(),
        },
    )
    .expect("Failed to set membership");
}

/// An active membership covering now.
pub fn set_active_membership(conn: &Connection, user_id: &str) {
    set_membership(
        conn,
        user_id,
        MembershipStatus::Active,
        past_timestamp(1),
        future_timestamp(30),
    );
}

/// Record a paid single-item order directly, bypassing the processor.
pub fn record_test_purchase(
    conn: &mut Connection,
    user_id: &str,
    item: &CatalogItem,
    key: &str,
    created_at: i64,
) -> access::RecordedPayment {
    let payment = access::PaymentRecord {
        idempotency_key: key.to_string(),
        user_id: user_id.to_string(),
        session_id: format!("cs_{}", key),
        provider: "fake".to_string(),
        line: OrderLineItem {
            kind: item.kind,
            item_id: item.id.clone(),
            title_snapshot: item.title.clone(),
            amount_minor: item.price_minor,
            currency: item.currency.clone(),
        },
    };
    access::record_payment(conn, &payment, created_at).expect("Failed to record purchase")
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .unwrap()
}

// ============================================================================
// HTTP helpers
// ============================================================================

pub fn get_as(uri: &str, user_id: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(USER_ID_HEADER, user_id)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json_as(uri: &str, user_id: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(USER_ID_HEADER, user_id)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
