//! Tests for keeping processor products and prices in step with catalog pricing.

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[tokio::test]
async fn test_first_sync_creates_product_and_price() {
    let env = create_test_env();
    let item = create_test_item(&env.conn(), ItemKind::Ebook, "Rust in Practice", 500);

    let pricing = access::ensure_external_pricing(&env.state, &item.id)
        .await
        .unwrap()
        .expect("paid item should be synchronized");

    assert!(pricing.minted_product);
    assert!(pricing.minted_price);
    assert_eq!(env.processor.products(), vec![(pricing.product_ref.clone(), item.id.clone())]);

    let (price, product_ref) = &env.processor.prices()[0];
    assert_eq!(price.amount_minor, 500);
    assert_eq!(price.currency, "gbp");
    assert_eq!(product_ref, &pricing.product_ref);

    let stored = queries::get_catalog_item(&env.conn(), &item.id).unwrap().unwrap();
    assert_eq!(stored.external_refs.product_ref.as_deref(), Some(pricing.product_ref.as_str()));
    assert_eq!(stored.external_refs.price_ref.as_deref(), Some(pricing.price_ref.as_str()));
    assert_eq!(stored.external_refs.price_minor, Some(500));
    assert_eq!(stored.external_refs.price_currency.as_deref(), Some("gbp"));
}

#[tokio::test]
async fn test_unchanged_price_is_reused() {
    let env = create_test_env();
    let item = create_test_item(&env.conn(), ItemKind::Ebook, "Rust in Practice", 500);

    let first = access::ensure_external_pricing(&env.state, &item.id).await.unwrap().unwrap();
    let second = access::ensure_external_pricing(&env.state, &item.id).await.unwrap().unwrap();

    assert_eq!(first.price_ref, second.price_ref);
    assert!(!second.minted_product);
    assert!(!second.minted_price);
    assert_eq!(env.processor.product_count(), 1);
    assert_eq!(env.processor.price_count(), 1);
}

#[tokio::test]
async fn test_price_drift_mints_new_price_on_same_product() {
    let env = create_test_env();
    let item = create_test_item(&env.conn(), ItemKind::Ebook, "Rust in Practice", 500);

    let before = access::ensure_external_pricing(&env.state, &item.id).await.unwrap().unwrap();

    queries::update_catalog_item_pricing(&env.conn(), &item.id, 700, "gbp").unwrap();
    let after = access::ensure_external_pricing(&env.state, &item.id).await.unwrap().unwrap();

    assert_ne!(before.price_ref, after.price_ref);
    assert_eq!(before.product_ref, after.product_ref);
    assert!(!after.minted_product);
    assert!(after.minted_price);
    assert_eq!(env.processor.prices()[1].0.amount_minor, 700);

    let stored = queries::get_catalog_item(&env.conn(), &item.id).unwrap().unwrap();
    assert_eq!(stored.external_refs.price_ref.as_deref(), Some(after.price_ref.as_str()));
    assert_eq!(stored.external_refs.price_minor, Some(700));
}

#[tokio::test]
async fn test_currency_change_counts_as_drift() {
    let env = create_test_env();
    let item = create_test_item(&env.conn(), ItemKind::Resource, "Templates", 500);

    access::ensure_external_pricing(&env.state, &item.id).await.unwrap();
    queries::update_catalog_item_pricing(&env.conn(), &item.id, 500, "USD").unwrap();
    let after = access::ensure_external_pricing(&env.state, &item.id).await.unwrap().unwrap();

    assert!(after.minted_price);
    assert_eq!(env.processor.prices()[1].0.currency, "usd");
}

#[tokio::test]
async fn test_free_item_is_not_synchronized() {
    let env = create_test_env_without_processor();
    let item = create_test_item(&env.conn(), ItemKind::Resource, "Cheat Sheet", 0);

    let pricing = access::ensure_external_pricing(&env.state, &item.id).await.unwrap();
    assert!(pricing.is_none());

    let stored = queries::get_catalog_item(&env.conn(), &item.id).unwrap().unwrap();
    assert_eq!(stored.external_refs, ExternalRefs::default());
}

/// A price cut to zero leaves the old refs in place for when the item is
/// priced again.
#[tokio::test]
async fn test_item_made_free_keeps_cached_refs() {
    let env = create_test_env();
    let item = create_test_item(&env.conn(), ItemKind::Ebook, "Rust in Practice", 500);
    let synced = access::ensure_external_pricing(&env.state, &item.id).await.unwrap().unwrap();

    queries::update_catalog_item_pricing(&env.conn(), &item.id, 0, "gbp").unwrap();
    assert!(access::ensure_external_pricing(&env.state, &item.id).await.unwrap().is_none());

    let stored = queries::get_catalog_item(&env.conn(), &item.id).unwrap().unwrap();
    assert_eq!(stored.external_refs.price_ref.as_deref(), Some(synced.price_ref.as_str()));
}

#[tokio::test]
async fn test_missing_item_and_missing_processor() {
    let env = create_test_env_without_processor();

    let missing = EntityType::CatalogItem.gen_id();
    let result = access::ensure_external_pricing(&env.state, &missing).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let item = create_test_item(&env.conn(), ItemKind::Ebook, "Rust in Practice", 500);
    let result = access::ensure_external_pricing(&env.state, &item.id).await;
    assert!(matches!(result, Err(AppError::Configuration(_))));
}

#[tokio::test]
async fn test_processor_timeout_is_upstream_failure() {
    let mut env = create_test_env();
    env.state.processor_timeout = std::time::Duration::from_millis(20);
    env.processor.set_delay(std::time::Duration::from_millis(500));
    let item = create_test_item(&env.conn(), ItemKind::Ebook, "Rust in Practice", 500);

    let result = access::ensure_external_pricing(&env.state, &item.id).await;
    assert!(matches!(result, Err(AppError::Upstream(_))));

    let stored = queries::get_catalog_item(&env.conn(), &item.id).unwrap().unwrap();
    assert!(stored.external_refs.product_ref.is_none());
}
