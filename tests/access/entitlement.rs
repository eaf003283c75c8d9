//! Tests for entitlement resolution: free items, membership coverage, and
//! direct access grants.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use shelfpass::access::{Entitlement, UnlockReason};

fn grant(conn: &rusqlite::Connection, user_id: &str, item_id: &str, via: GrantVia, expires_at: Option<i64>) {
    queries::insert_access_grant_if_absent(
        conn,
        &NewAccessGrant {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            via,
            activated_at: past_timestamp(1),
            expires_at,
        },
    )
    .unwrap();
}

#[test]
fn test_free_item_is_unlocked_for_anyone() {
    let env = create_test_env();
    let conn = env.conn();
    let item = create_test_item(&conn, ItemKind::Resource, "Cheat Sheet", 0);

    let result = access::resolve(&conn, new_identity().user_id(), &item, now());
    assert_eq!(result, Entitlement::unlocked(UnlockReason::Free));
}

#[test]
fn test_paid_item_without_signals_is_locked() {
    let env = create_test_env();
    let conn = env.conn();
    let item = create_test_item(&conn, ItemKind::Ebook, "Rust in Practice", 500);

    let result = access::resolve(&conn, new_identity().user_id(), &item, now());
    assert_eq!(result, Entitlement::locked());
}

#[test]
fn test_membership_unlocks_only_included_items() {
    let env = create_test_env();
    let conn = env.conn();
    let user = new_identity();
    set_active_membership(&conn, user.user_id());

    let included = create_test_item_with(
        &conn,
        ItemKind::Ebook,
        "Async Patterns",
        1200,
        true,
        PublishStatus::Published,
    );
    let excluded = create_test_item(&conn, ItemKind::Ebook, "Premium Guide", 1200);

    assert_eq!(
        access::resolve(&conn, user.user_id(), &included, now()),
        Entitlement::unlocked(UnlockReason::Membership)
    );
    assert!(!access::resolve(&conn, user.user_id(), &excluded, now()).unlocked);
}

#[test]
fn test_membership_window_and_status() {
    let env = create_test_env();
    let conn = env.conn();
    let item = create_test_item_with(
        &conn,
        ItemKind::Resource,
        "Templates",
        300,
        true,
        PublishStatus::Published,
    );
    let t = now();

    let cases = [
        (MembershipStatus::Trialing, t - 10, t + 10, true),
        (MembershipStatus::Active, t, t + 10, true),
        (MembershipStatus::Active, t - 10, t, false),
        (MembershipStatus::Active, t + 1, t + 10, false),
        (MembershipStatus::PastDue, t - 10, t + 10, false),
        (MembershipStatus::Canceled, t - 10, t + 10, false),
    ];

    for (status, start, end, expected) in cases {
        let user = new_identity();
        set_membership(&conn, user.user_id(), status, start, end);
        let result = access::resolve(&conn, user.user_id(), &item, t);
        assert_eq!(
            result.unlocked, expected,
            "status {:?} window [{}, {}) at {}",
            status, start, end, t
        );
    }
}

#[test]
fn test_grant_reason_follows_via() {
    let env = create_test_env();
    let conn = env.conn();
    let item = create_test_item(&conn, ItemKind::Ebook, "Rust in Practice", 500);

    let admin_user = new_identity();
    grant(&conn, admin_user.user_id(), &item.id, GrantVia::Admin, None);
    assert_eq!(
        access::resolve(&conn, admin_user.user_id(), &item, now()),
        Entitlement::unlocked(UnlockReason::Admin)
    );

    let buyer = new_identity();
    grant(&conn, buyer.user_id(), &item.id, GrantVia::Purchase, None);
    assert_eq!(
        access::resolve(&conn, buyer.user_id(), &item, now()),
        Entitlement::unlocked(UnlockReason::Purchase)
    );
}

#[test]
fn test_expired_and_revoked_grants_do_not_unlock() {
    let env = create_test_env();
    let conn = env.conn();
    let item = create_test_item(&conn, ItemKind::Ebook, "Rust in Practice", 500);

    let expired = new_identity();
    grant(&conn, expired.user_id(), &item.id, GrantVia::Grant, Some(past_timestamp(1)));
    assert!(!access::resolve(&conn, expired.user_id(), &item, now()).unlocked);

    let still_valid = new_identity();
    grant(&conn, still_valid.user_id(), &item.id, GrantVia::Grant, Some(future_timestamp(1)));
    assert!(access::resolve(&conn, still_valid.user_id(), &item, now()).unlocked);

    let revoked = new_identity();
    grant(&conn, revoked.user_id(), &item.id, GrantVia::Purchase, None);
    conn.execute(
        "UPDATE access_grants SET status = 'revoked' WHERE user_id = ?1",
        [revoked.user_id()],
    )
    .unwrap();
    assert!(!access::resolve(&conn, revoked.user_id(), &item, now()).unlocked);
}

/// A broken membership lookup must not hide a valid grant.
#[test]
fn test_membership_lookup_failure_degrades_to_grant_check() {
    let env = create_test_env();
    let conn = env.conn();
    let user = new_identity();
    let item = create_test_item_with(
        &conn,
        ItemKind::Ebook,
        "Async Patterns",
        1200,
        true,
        PublishStatus::Published,
    );
    grant(&conn, user.user_id(), &item.id, GrantVia::Purchase, None);

    // A status the enum cannot parse makes the membership read fail.
    conn.execute(
        "INSERT INTO memberships (user_id, status, current_period_start, current_period_end, updated_at)
         VALUES (?1, 'paused', 0, 0, 0)",
        [user.user_id()],
    )
    .unwrap();

    assert_eq!(
        access::resolve(&conn, user.user_id(), &item, now()),
        Entitlement::unlocked(UnlockReason::Purchase)
    );
}

#[test]
fn test_resolve_entitlement_validates_and_loads_item() {
    let env = create_test_env();
    let user = new_identity();

    let result = access::resolve_entitlement(&env.state, &user, "not-an-id");
    assert!(matches!(result, Err(AppError::InvalidInput(_))));

    let missing = EntityType::CatalogItem.gen_id();
    let result = access::resolve_entitlement(&env.state, &user, &missing);
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let item = {
        let conn = env.conn();
        create_test_item(&conn, ItemKind::Resource, "Free Sample", 0)
    };
    let result = access::resolve_entitlement(&env.state, &user, &item.id).unwrap();
    assert!(result.unlocked);
}
