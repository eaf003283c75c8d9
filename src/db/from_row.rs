//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! This module provides a `FromRow` trait that models can implement to
//! define how they are constructed from database rows, plus helper functions
//! for common query patterns.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
///
/// Invalid enum values (from corruption or a bad manual edit) surface as an
/// error instead of a panic.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const CATALOG_ITEM_COLS: &str = "id, kind, title, slug, thumbnail_url, price_minor, currency, included_in_membership, status, external_product_ref, external_price_ref, external_price_minor, external_price_currency, created_at, updated_at";

pub const MEMBERSHIP_COLS: &str =
    "user_id, status, current_period_start, current_period_end, updated_at";

pub const ACCESS_GRANT_COLS: &str = "user_id, item_id, via, status, activated_at, expires_at";

pub const ORDER_COLS: &str =
    "id, idempotency_key, user_id, session_id, provider, status, total_minor, currency, created_at";

pub const ORDER_LINE_ITEM_COLS: &str = "kind, item_id, title_snapshot, amount_minor, currency";

/// Columns for line items joined with their order (aliases `o` and `i`)
pub const PAID_LINE_ITEM_COLS: &str = "o.id, o.created_at, i.position, i.kind, i.item_id, i.title_snapshot, i.amount_minor, i.currency";

// ============ FromRow Implementations ============

impl FromRow for CatalogItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CatalogItem {
            id: row.get(0)?,
            kind: parse_enum(row, 1, "kind")?,
            title: row.get(2)?,
            slug: row.get(3)?,
            thumbnail_url: row.get(4)?,
            price_minor: row.get(5)?,
            currency: row.get(6)?,
            included_in_membership: row.get::<_, i32>(7)? != 0,
            status: parse_enum(row, 8, "status")?,
            external_refs: ExternalRefs {
                product_ref: row.get(9)?,
                price_ref: row.get(10)?,
                price_minor: row.get(11)?,
                price_currency: row.get(12)?,
            },
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

impl FromRow for Membership {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Membership {
            user_id: row.get(0)?,
            status: parse_enum(row, 1, "status")?,
            current_period_start: row.get(2)?,
            current_period_end: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

impl FromRow for AccessGrant {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AccessGrant {
            user_id: row.get(0)?,
            item_id: row.get(1)?,
            via: parse_enum(row, 2, "via")?,
            status: parse_enum(row, 3, "status")?,
            activated_at: row.get(4)?,
            expires_at: row.get(5)?,
        })
    }
}

/// Line items are loaded separately; see `queries::list_order_items`.
impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            idempotency_key: row.get(1)?,
            user_id: row.get(2)?,
            session_id: row.get(3)?,
            provider: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            total_minor: row.get(6)?,
            currency: row.get(7)?,
            created_at: row.get(8)?,
            items: Vec::new(),
        })
    }
}

impl FromRow for OrderLineItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrderLineItem {
            kind: parse_enum(row, 0, "kind")?,
            item_id: row.get(1)?,
            title_snapshot: row.get(2)?,
            amount_minor: row.get(3)?,
            currency: row.get(4)?,
        })
    }
}

impl FromRow for PaidLineItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PaidLineItem {
            order_id: row.get(0)?,
            order_created_at: row.get(1)?,
            position: row.get(2)?,
            line: OrderLineItem {
                kind: parse_enum(row, 3, "kind")?,
                item_id: row.get(4)?,
                title_snapshot: row.get(5)?,
                amount_minor: row.get(6)?,
                currency: row.get(7)?,
            },
        })
    }
}
