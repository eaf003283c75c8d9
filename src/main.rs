use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelfpass::config::Config;
use shelfpass::db::{AppState, create_pool, init_db, queries};
use shelfpass::handlers;
use shelfpass::id::EntityType;
use shelfpass::models::{CreateCatalogItem, ItemKind, Membership, MembershipStatus, PublishStatus};
use shelfpass::notifications::{LogNotifier, PurchaseNotifier, WebhookNotifier};
use shelfpass::payments::{PaymentProcessor, StripeClient};

#[derive(Parser, Debug)]
#[command(name = "shelfpass")]
#[command(about = "Access control and one-time purchases for paid e-books and resources")]
struct Cli {
    /// Seed the database with dev data (catalog items and a member)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for testing.
/// Creates: a paid e-book, a membership e-book, a free resource, and a user
/// with an active membership. Only runs in dev mode.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let items = [
        CreateCatalogItem {
            kind: ItemKind::Ebook,
            title: "Rust in Practice".to_string(),
            slug: Some("rust-in-practice".to_string()),
            thumbnail_url: None,
            price_minor: 500,
            currency: "gbp".to_string(),
            included_in_membership: false,
            status: PublishStatus::Published,
        },
        CreateCatalogItem {
            kind: ItemKind::Ebook,
            title: "Async Patterns Handbook".to_string(),
            slug: Some("async-patterns-handbook".to_string()),
            thumbnail_url: None,
            price_minor: 1200,
            currency: "gbp".to_string(),
            included_in_membership: true,
            status: PublishStatus::Published,
        },
        CreateCatalogItem {
            kind: ItemKind::Resource,
            title: "Ownership Cheat Sheet".to_string(),
            slug: Some("ownership-cheat-sheet".to_string()),
            thumbnail_url: None,
            price_minor: 0,
            currency: "gbp".to_string(),
            included_in_membership: false,
            status: PublishStatus::Published,
        },
    ];

    let mut item_ids = Vec::new();
    for input in &items {
        let item = queries::create_catalog_item(&conn, input)
            .expect("Failed to create dev catalog item");
        tracing::info!("Item: {} [{}] (id: {})", item.title, item.kind.as_ref(), item.id);
        item_ids.push(item.id);
    }

    let member_id = EntityType::User.gen_id();
    let now = chrono::Utc::now().timestamp();
    queries::upsert_membership(
        &conn,
        &Membership {
            user_id: member_id.clone(),
            status: MembershipStatus::Active,
            current_period_start: now,
            current_period_end: now + 30 * 24 * 60 * 60,
            updated_at: now,
        },
    )
    .expect("Failed to create dev membership");
    tracing::info!("Member: {} (active for 30 days)", member_id);

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED SUCCESSFULLY");
    tracing::info!("============================================");

    // Print copy-paste friendly output (no log formatting)
    println!();
    println!("--- COPY FROM HERE ---");
    println!("  member_user_id: {}", member_id);
    println!("  anonymous_user_id: {}", EntityType::User.gen_id());
    for id in &item_ids {
        println!("  item_id: {}", id);
    }
    println!("--- END COPY ---");
    println!();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelfpass=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let processor: Option<Arc<dyn PaymentProcessor>> = match &config.stripe {
        Some(stripe) => {
            let client = StripeClient::new(stripe).expect("Failed to create Stripe client");
            tracing::info!("Payment processor: stripe ({})", stripe.api_base);
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set: checkout and confirmation are disabled");
            None
        }
    };

    let notifier: Arc<dyn PurchaseNotifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!("Purchase notifications: webhook");
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => Arc::new(LogNotifier),
    };

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        processor,
        processor_timeout: config.processor_timeout,
        notifier,
    };

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set SHELFPASS_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("shelfpass listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        // Also remove WAL and SHM files if they exist
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
