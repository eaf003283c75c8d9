use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Catalog items (owned by the authoring subsystem; the core reads pricing
        -- and writes back the cached payment processor references)
        CREATE TABLE IF NOT EXISTS catalog_items (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('ebook', 'resource')),
            title TEXT NOT NULL,
            slug TEXT,
            thumbnail_url TEXT,
            price_minor INTEGER NOT NULL DEFAULT 0 CHECK (price_minor >= 0),
            currency TEXT NOT NULL,
            included_in_membership INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL CHECK (status IN ('draft', 'published', 'archived')),
            external_product_ref TEXT,
            external_price_ref TEXT,
            external_price_minor INTEGER,
            external_price_currency TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_catalog_items_kind ON catalog_items(kind);

        -- Memberships (maintained by billing; read-only to the core)
        CREATE TABLE IF NOT EXISTS memberships (
            user_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            current_period_start INTEGER NOT NULL,
            current_period_end INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Access grants: one row per (user, item), revoked but never deleted.
        -- No foreign key to catalog_items: grants outlive deleted items.
        CREATE TABLE IF NOT EXISTS access_grants (
            user_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            via TEXT NOT NULL CHECK (via IN ('purchase', 'membership', 'grant', 'admin')),
            status TEXT NOT NULL CHECK (status IN ('active', 'revoked')),
            activated_at INTEGER NOT NULL,
            expires_at INTEGER,
            PRIMARY KEY (user_id, item_id)
        );

        -- Orders, keyed by the processor's idempotency key (payment intent or session id)
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            idempotency_key TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            provider TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'paid', 'failed')),
            total_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_user_status ON orders(user_id, status);

        -- Order line items (snapshot of title and amount at payment time)
        CREATE TABLE IF NOT EXISTS order_items (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('ebook', 'resource')),
            item_id TEXT NOT NULL,
            title_snapshot TEXT NOT NULL,
            amount_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            UNIQUE(order_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id);
        "#,
    )
}
