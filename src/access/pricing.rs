//! Keeps payment processor products and prices in step with catalog pricing.
//!
//! Processor prices are immutable, so a changed amount or currency mints a new
//! price object and the old reference is simply abandoned.

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::models::{CatalogItem, ExternalRefs};
use crate::payments::{NewPrice, NewProduct, PaymentProcessor, with_timeout};

use super::validate_item_id;

/// Processor references resolved for an item's current price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalPricing {
    pub product_ref: String,
    pub price_ref: String,
    /// True if this call created the product
    pub minted_product: bool,
    /// True if this call created the price (first sync or price drift)
    pub minted_price: bool,
}

/// Make sure `item_id` has a processor product and a price matching its
/// current catalog pricing, creating and persisting whatever is missing.
///
/// Returns `None` for free items, which are never synchronized.
pub async fn ensure_external_pricing(
    state: &AppState,
    item_id: &str,
) -> Result<Option<ExternalPricing>> {
    validate_item_id(item_id)?;

    let item = {
        let conn = state.db.get()?;
        queries::get_catalog_item(&conn, item_id)?.or_not_found(msg::ITEM_NOT_FOUND)?
    };

    if item.is_free() {
        return Ok(None);
    }

    let processor = state.processor()?;
    let pricing = sync_item(state, processor, &item).await?;
    Ok(Some(pricing))
}

/// Synchronize an already loaded, priced item.
pub(crate) async fn sync_item(
    state: &AppState,
    processor: &dyn PaymentProcessor,
    item: &CatalogItem,
) -> Result<ExternalPricing> {
    let snapshot = item.pricing_snapshot();
    let cached = &item.external_refs;

    if let (Some(product_ref), Some(price_ref)) =
        (cached.product_ref.as_deref(), cached.price_matching(&snapshot))
    {
        return Ok(ExternalPricing {
            product_ref: product_ref.to_string(),
            price_ref: price_ref.to_string(),
            minted_product: false,
            minted_price: false,
        });
    }

    let (product_ref, minted_product) = match cached.product_ref.as_deref() {
        Some(product_ref) => (product_ref.to_string(), false),
        None => {
            let product_ref = with_timeout(
                state.processor_timeout,
                "create_product",
                processor.create_product(&NewProduct {
                    name: &item.title,
                    item_id: &item.id,
                    item_kind: item.kind,
                }),
            )
            .await?;
            tracing::info!(
                "Created {} product {} for item {}",
                processor.provider_name(),
                product_ref,
                item.id
            );
            (product_ref, true)
        }
    };

    // Reusing the cached price is only possible when the product was not just
    // replaced, since prices belong to a product.
    let reusable_price = if minted_product {
        None
    } else {
        cached.price_matching(&snapshot).map(str::to_string)
    };

    let (price_ref, price_minor, price_currency, minted_price) = match reusable_price {
        Some(price_ref) => (price_ref, snapshot.amount_minor, snapshot.currency.clone(), false),
        None => {
            if cached.price_ref.is_some() {
                tracing::info!(
                    "Price drift on item {}: cached {:?} {:?}, now {} {}",
                    item.id,
                    cached.price_minor,
                    cached.price_currency,
                    snapshot.amount_minor,
                    snapshot.currency
                );
            }
            let price = with_timeout(
                state.processor_timeout,
                "create_price",
                processor.create_price(&NewPrice {
                    product_ref: &product_ref,
                    amount_minor: snapshot.amount_minor,
                    currency: &snapshot.currency,
                }),
            )
            .await?;
            (price.id, price.amount_minor, price.currency.to_lowercase(), true)
        }
    };

    let refs = ExternalRefs {
        product_ref: Some(product_ref.clone()),
        price_ref: Some(price_ref.clone()),
        price_minor: Some(price_minor),
        price_currency: Some(price_currency),
    };
    let conn = state.db.get()?;
    if !queries::set_external_refs(&conn, &item.id, &refs)? {
        return Err(AppError::NotFound(msg::ITEM_NOT_FOUND.into()));
    }

    Ok(ExternalPricing {
        product_ref,
        price_ref,
        minted_product,
        minted_price,
    })
}
