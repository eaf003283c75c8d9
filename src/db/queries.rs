use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    ACCESS_GRANT_COLS, CATALOG_ITEM_COLS, MEMBERSHIP_COLS, ORDER_COLS, ORDER_LINE_ITEM_COLS,
    PAID_LINE_ITEM_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Catalog Items ============

/// Create a catalog item. Authoring lives outside this service; this is used
/// for seeding and by the authoring side's import path.
pub fn create_catalog_item(conn: &Connection, input: &CreateCatalogItem) -> Result<CatalogItem> {
    let id = EntityType::CatalogItem.gen_id();
    let now = now();
    let currency = input.currency.to_lowercase();

    conn.execute(
        "INSERT INTO catalog_items (id, kind, title, slug, thumbnail_url, price_minor, currency, included_in_membership, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            &id,
            input.kind.as_ref(),
            &input.title,
            &input.slug,
            &input.thumbnail_url,
            input.price_minor,
            &currency,
            input.included_in_membership as i32,
            input.status.as_ref(),
            now
        ],
    )?;

    Ok(CatalogItem {
        id,
        kind: input.kind,
        title: input.title.clone(),
        slug: input.slug.clone(),
        thumbnail_url: input.thumbnail_url.clone(),
        price_minor: input.price_minor,
        currency,
        included_in_membership: input.included_in_membership,
        status: input.status,
        external_refs: ExternalRefs::default(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_catalog_item(conn: &Connection, id: &str) -> Result<Option<CatalogItem>> {
    query_one(
        conn,
        &format!("SELECT {} FROM catalog_items WHERE id = ?1", CATALOG_ITEM_COLS),
        &[&id],
    )
}

/// Batch fetch items of one kind by IDs. Missing IDs are silently skipped.
pub fn get_catalog_items_by_ids(
    conn: &Connection,
    kind: ItemKind,
    ids: &[&str],
) -> Result<Vec<CatalogItem>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders: Vec<String> = (2..=ids.len() + 1).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT {} FROM catalog_items WHERE kind = ?1 AND id IN ({})",
        CATALOG_ITEM_COLS,
        placeholders.join(", ")
    );
    let kind_str = kind.as_ref();
    let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(ids.len() + 1);
    params.push(&kind_str);
    params.extend(ids.iter().map(|id| id as &dyn rusqlite::ToSql));
    query_all(conn, &sql, &params)
}

/// Change an item's price. Called by the authoring side; cached processor refs
/// are left alone and re-synchronized lazily at the next checkout.
pub fn update_catalog_item_pricing(
    conn: &Connection,
    id: &str,
    price_minor: i64,
    currency: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE catalog_items SET price_minor = ?1, currency = ?2, updated_at = ?3 WHERE id = ?4",
        params![price_minor, currency.to_lowercase(), now(), id],
    )?;
    Ok(affected > 0)
}

pub fn delete_catalog_item(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM catalog_items WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

/// Persist the cached payment processor references for an item.
pub fn set_external_refs(conn: &Connection, id: &str, refs: &ExternalRefs) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE catalog_items
         SET external_product_ref = ?1, external_price_ref = ?2, external_price_minor = ?3, external_price_currency = ?4
         WHERE id = ?5",
        params![
            &refs.product_ref,
            &refs.price_ref,
            refs.price_minor,
            &refs.price_currency,
            id
        ],
    )?;
    Ok(affected > 0)
}

// ============ Memberships ============

pub fn get_membership(conn: &Connection, user_id: &str) -> Result<Option<Membership>> {
    query_one(
        conn,
        &format!("SELECT {} FROM memberships WHERE user_id = ?1", MEMBERSHIP_COLS),
        &[&user_id],
    )
}

/// Write a user's membership state. The billing side owns this table.
pub fn upsert_membership(conn: &Connection, membership: &Membership) -> Result<()> {
    conn.execute(
        "INSERT INTO memberships (user_id, status, current_period_start, current_period_end, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id) DO UPDATE SET
            status = excluded.status,
            current_period_start = excluded.current_period_start,
            current_period_end = excluded.current_period_end,
            updated_at = excluded.updated_at",
        params![
            &membership.user_id,
            membership.status.as_ref(),
            membership.current_period_start,
            membership.current_period_end,
            membership.updated_at
        ],
    )?;
    Ok(())
}

// ============ Access Grants ============

pub fn get_access_grant(
    conn: &Connection,
    user_id: &str,
    item_id: &str,
) -> Result<Option<AccessGrant>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM access_grants WHERE user_id = ?1 AND item_id = ?2",
            ACCESS_GRANT_COLS
        ),
        &[&user_id, &item_id],
    )
}

/// Atomically insert an active grant unless one already exists for the pair.
/// Returns true if this call created the row.
pub fn insert_access_grant_if_absent(conn: &Connection, grant: &NewAccessGrant) -> Result<bool> {
    let affected = conn.execute(
        "INSERT INTO access_grants (user_id, item_id, via, status, activated_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id, item_id) DO NOTHING",
        params![
            &grant.user_id,
            &grant.item_id,
            grant.via.as_ref(),
            GrantStatus::Active.as_ref(),
            grant.activated_at,
            grant.expires_at
        ],
    )?;
    Ok(affected > 0)
}

// ============ Orders ============

/// Atomically insert an order unless one with the same idempotency key exists.
///
/// Returns the new order's ID if this call created it, `None` if the key was
/// already taken. Line items are written by `insert_order_items`.
pub fn insert_order_if_absent(
    conn: &Connection,
    order: &NewOrder,
    created_at: i64,
) -> Result<Option<String>> {
    let id = EntityType::Order.gen_id();
    let affected = conn.execute(
        "INSERT INTO orders (id, idempotency_key, user_id, session_id, provider, status, total_minor, currency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(idempotency_key) DO NOTHING",
        params![
            &id,
            &order.idempotency_key,
            &order.user_id,
            &order.session_id,
            &order.provider,
            order.status.as_ref(),
            order.total_minor(),
            order.currency(),
            created_at
        ],
    )?;
    Ok((affected > 0).then_some(id))
}

pub fn insert_order_items(conn: &Connection, order_id: &str, items: &[OrderLineItem]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO order_items (id, order_id, position, kind, item_id, title_snapshot, amount_minor, currency)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (position, item) in items.iter().enumerate() {
        stmt.execute(params![
            EntityType::OrderLineItem.gen_id(),
            order_id,
            position as i64,
            item.kind.as_ref(),
            &item.item_id,
            &item.title_snapshot,
            item.amount_minor,
            &item.currency
        ])?;
    }
    Ok(())
}

pub fn list_order_items(conn: &Connection, order_id: &str) -> Result<Vec<OrderLineItem>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM order_items WHERE order_id = ?1 ORDER BY position",
            ORDER_LINE_ITEM_COLS
        ),
        &[&order_id],
    )
}

/// Get an order (with line items) by its idempotency key.
pub fn get_order_by_idempotency_key(conn: &Connection, key: &str) -> Result<Option<Order>> {
    let order: Option<Order> = query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE idempotency_key = ?1", ORDER_COLS),
        &[&key],
    )?;
    match order {
        Some(mut order) => {
            order.items = list_order_items(conn, &order.id)?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

/// All line items of a user's paid orders, oldest first.
///
/// `kinds` restricts the result to the given item kinds; `None` means all kinds.
pub fn list_paid_line_items_for_user(
    conn: &Connection,
    user_id: &str,
    kinds: Option<&[ItemKind]>,
) -> Result<Vec<PaidLineItem>> {
    let paid = OrderStatus::Paid.as_ref();
    let mut sql = format!(
        "SELECT {} FROM orders o JOIN order_items i ON i.order_id = o.id
         WHERE o.user_id = ?1 AND o.status = ?2",
        PAID_LINE_ITEM_COLS
    );
    let kind_strs: Vec<&str> = kinds.unwrap_or_default().iter().map(|k| k.as_ref()).collect();
    if kinds.is_some() {
        if kind_strs.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (3..=kind_strs.len() + 2).map(|i| format!("?{}", i)).collect();
        sql.push_str(&format!(" AND i.kind IN ({})", placeholders.join(", ")));
    }
    sql.push_str(" ORDER BY o.created_at ASC, o.rowid ASC, i.position ASC");

    let mut params: Vec<&dyn rusqlite::ToSql> = vec![&user_id, &paid];
    params.extend(kind_strs.iter().map(|k| k as &dyn rusqlite::ToSql));
    query_all(conn, &sql, &params)
}
