//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - stores(id, name, slug UNIQUE, description, created_at, location, photo, author_id)
//! - store_tags(store_id, position, tag)
//! - stores_fts: FTS5 index over (name, description)
//! - stores_geo: R*Tree index over (lng, lat)
//! - reviews(id, store_id, author_id, rating, text, created_at)
//! - users(id, name, email)
//! - hearts(user_id, store_id)

pub mod schema;
pub mod sqlite;

pub use sqlite::{DbStats, SqliteStore, is_unique_violation};
