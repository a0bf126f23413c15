//! Database schema definitions

/// SQL to create the stores table
///
/// `slug` is unique case-insensitively; the repository retries slug
/// generation when an insert trips this constraint.
pub const CREATE_STORES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE COLLATE NOCASE,
    description TEXT,
    created_at TEXT NOT NULL,
    location_type TEXT NOT NULL DEFAULT 'Point',
    address TEXT NOT NULL,
    lng REAL NOT NULL,
    lat REAL NOT NULL,
    photo TEXT,
    author_id TEXT NOT NULL
)
"#;

/// SQL to create the store_tags table
/// `position` preserves the order tags were given in
pub const CREATE_STORE_TAGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS store_tags (
    store_id INTEGER NOT NULL REFERENCES stores(id),
    position INTEGER NOT NULL,
    tag TEXT NOT NULL,
    PRIMARY KEY (store_id, tag)
)
"#;

/// SQL to create the full-text index over name and description.
/// Rows are keyed by `rowid = stores.id`.
pub const CREATE_STORES_FTS_TABLE: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS stores_fts USING fts5(
    name,
    description,
    tokenize = 'porter unicode61 remove_diacritics 2'
)
"#;

/// SQL to create the geospatial index over coordinates.
/// Points are stored as degenerate boxes, `id = stores.id`.
pub const CREATE_STORES_GEO_TABLE: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS stores_geo USING rtree(
    id,
    min_lng, max_lng,
    min_lat, max_lat
)
"#;

/// SQL to create the users table
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT
)
"#;

/// SQL to create the reviews table
pub const CREATE_REVIEWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    store_id INTEGER NOT NULL REFERENCES stores(id),
    author_id TEXT NOT NULL,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    text TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

/// SQL to create the hearts (favorites) relation
pub const CREATE_HEARTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS hearts (
    user_id TEXT NOT NULL REFERENCES users(id),
    store_id INTEGER NOT NULL REFERENCES stores(id),
    PRIMARY KEY (user_id, store_id)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_stores_created ON stores(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_store_tags_tag ON store_tags(tag)",
    "CREATE INDEX IF NOT EXISTS idx_reviews_store ON reviews(store_id)",
    "CREATE INDEX IF NOT EXISTS idx_hearts_store ON hearts(store_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_STORES_TABLE,
        CREATE_STORE_TAGS_TABLE,
        CREATE_STORES_FTS_TABLE,
        CREATE_STORES_GEO_TABLE,
        CREATE_USERS_TABLE,
        CREATE_REVIEWS_TABLE,
        CREATE_HEARTS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
