//! Purchase history across every item kind.
//!
//! Orders are the source of truth: each distinct (kind, item) the user paid
//! for appears once, dated by its most recent payment, and decorated with the
//! live catalog row when the item still exists.

use std::collections::{BTreeSet, HashMap};

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result, msg};
use crate::models::{CatalogItem, ItemKind, PaidLineItem, PurchaseHistoryItem, PurchaseHistoryQuery};
use crate::pagination::{PageRequest, Paginated};

/// Accepted in `kinds` for compatibility with clients that also list
/// memberships; memberships are not purchases and never appear here.
const MEMBERSHIP_KIND: &str = "membership";

/// Parse the comma-separated `kinds` filter.
///
/// `Ok(None)` means no filter. `Ok(Some(empty))` means the filter named only
/// memberships, which matches nothing.
fn parse_kinds(raw: Option<&str>) -> Result<Option<Vec<ItemKind>>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let mut kinds = BTreeSet::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if part.eq_ignore_ascii_case(MEMBERSHIP_KIND) {
            continue;
        }
        let kind = part
            .to_lowercase()
            .parse::<ItemKind>()
            .map_err(|_| AppError::InvalidInput(format!("{}: {}", msg::INVALID_KIND, part)))?;
        kinds.insert(kind);
    }
    Ok(Some(kinds.into_iter().collect()))
}

/// One (kind, item) group, folded from its line items in payment order.
struct Group {
    kind: ItemKind,
    item_id: String,
    purchased_at: i64,
    title_snapshot: String,
    amount_minor: i64,
    currency: String,
}

/// Collapse line items to one group per (kind, item). Input must be ordered by
/// (order created_at, insertion order, position) so the last one seen wins.
fn group_line_items(lines: Vec<PaidLineItem>) -> Vec<Group> {
    let mut index: HashMap<(ItemKind, String), usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for paid in lines {
        let line = paid.line;
        let key = (line.kind, line.item_id.clone());
        match index.get(&key) {
            Some(&i) => {
                let group = &mut groups[i];
                group.purchased_at = group.purchased_at.max(paid.order_created_at);
                group.title_snapshot = line.title_snapshot;
                group.amount_minor = line.amount_minor;
                group.currency = line.currency;
            }
            None => {
                index.insert(key, groups.len());
                groups.push(Group {
                    kind: line.kind,
                    item_id: line.item_id,
                    purchased_at: paid.order_created_at,
                    title_snapshot: line.title_snapshot,
                    amount_minor: line.amount_minor,
                    currency: line.currency,
                });
            }
        }
    }

    groups
}

/// Live catalog rows for the grouped items, one batch query per kind.
fn load_live_items(
    conn: &Connection,
    groups: &[Group],
) -> Result<HashMap<(ItemKind, String), CatalogItem>> {
    let mut live = HashMap::new();
    for kind in ItemKind::ALL {
        let ids: Vec<&str> = groups
            .iter()
            .filter(|g| g.kind == kind)
            .map(|g| g.item_id.as_str())
            .collect();
        for item in queries::get_catalog_items_by_ids(conn, kind, &ids)? {
            live.insert((kind, item.id.clone()), item);
        }
    }
    Ok(live)
}

/// List a user's distinct purchases, newest first.
pub fn list_purchase_history(
    conn: &Connection,
    user_id: &str,
    query: &PurchaseHistoryQuery,
) -> Result<Paginated<PurchaseHistoryItem>> {
    let page = PageRequest::new(query.page, query.limit);
    let kinds = parse_kinds(query.kinds.as_deref())?;
    let needle = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let lines = queries::list_paid_line_items_for_user(conn, user_id, kinds.as_deref())?;
    let groups = group_line_items(lines);
    let mut live = load_live_items(conn, &groups)?;

    let mut items: Vec<PurchaseHistoryItem> = groups
        .into_iter()
        .map(|group| {
            let item = live.remove(&(group.kind, group.item_id.clone()));
            let (title, slug, thumbnail_url) = match item {
                Some(item) => (item.title, item.slug, item.thumbnail_url),
                None => (group.title_snapshot, None, None),
            };
            PurchaseHistoryItem {
                link: group.kind.link_for(slug.as_deref()),
                kind: group.kind,
                item_id: group.item_id,
                title,
                slug,
                thumbnail_url,
                amount_minor: group.amount_minor,
                currency: group.currency,
                purchased_at: group.purchased_at,
            }
        })
        .filter(|item| {
            needle
                .as_deref()
                .is_none_or(|needle| item.title.to_lowercase().contains(needle))
        })
        .collect();

    items.sort_by(|a, b| {
        b.purchased_at
            .cmp(&a.purchased_at)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.item_id.cmp(&b.item_id))
    });

    Ok(page.paginate(items))
}
