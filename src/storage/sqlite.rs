//! SQLite storage implementation

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Params, params};
use crate::Result;
use crate::review::Review;
use crate::store::{Location, Store, StoreDraft, StoreId};
use crate::user::User;
use super::schema;

/// Default time a connection waits on a locked database before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const STORE_COLUMNS: &str =
    "s.id, s.name, s.slug, s.description, s.created_at, s.location_type, s.address, s.lng, s.lat, s.photo, s.author_id";

/// SQLite-backed storage for the store catalog
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a database file shared with other connections.
    ///
    /// WAL mode lets readers proceed while one writer holds the lock;
    /// writers queue for up to `busy_timeout`.
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("Opened {} (journal_mode={})", path.display(), mode);
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        self.conn.pragma_update(None, "foreign_keys", true)?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken up front, so a read-modify-write inside `f`
    /// cannot interleave with another writer. Rolls back if `f` fails.
    pub fn with_immediate<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        let outcome = f().and_then(|value| {
            self.conn.execute_batch("COMMIT")?;
            Ok(value)
        });
        if outcome.is_err() && !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("Rollback failed: {}", e);
            }
        }
        outcome
    }

    // ========== Store Operations ==========

    /// Insert a store with its tags and index rows.
    ///
    /// Returns the raw driver error so callers can detect a slug collision.
    pub fn insert_store(
        &self,
        draft: &StoreDraft,
        slug: &str,
        created_at: DateTime<Utc>,
    ) -> rusqlite::Result<StoreId> {
        self.conn.execute(
            r#"
            INSERT INTO stores (name, slug, description, created_at, location_type, address, lng, lat, photo, author_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                draft.name,
                slug,
                draft.description,
                created_at,
                draft.location.kind,
                draft.location.address,
                draft.location.lng(),
                draft.location.lat(),
                draft.photo,
                draft.author_id,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.write_secondary_rows(id, draft)?;
        Ok(id)
    }

    /// Overwrite a store's mutable fields, tags and index rows.
    /// `author_id` and `created_at` are never touched.
    pub fn update_store(&self, id: StoreId, draft: &StoreDraft, slug: &str) -> rusqlite::Result<()> {
        self.conn.execute(
            r#"
            UPDATE stores
            SET name = ?2, slug = ?3, description = ?4, location_type = ?5,
                address = ?6, lng = ?7, lat = ?8, photo = ?9
            WHERE id = ?1
            "#,
            params![
                id,
                draft.name,
                slug,
                draft.description,
                draft.location.kind,
                draft.location.address,
                draft.location.lng(),
                draft.location.lat(),
                draft.photo,
            ],
        )?;
        self.conn.execute("DELETE FROM store_tags WHERE store_id = ?1", [id])?;
        self.conn.execute("DELETE FROM stores_fts WHERE rowid = ?1", [id])?;
        self.conn.execute("DELETE FROM stores_geo WHERE id = ?1", [id])?;
        self.write_secondary_rows(id, draft)
    }

    fn write_secondary_rows(&self, id: StoreId, draft: &StoreDraft) -> rusqlite::Result<()> {
        for (position, tag) in draft.tags.iter().enumerate() {
            self.conn.execute(
                "INSERT INTO store_tags (store_id, position, tag) VALUES (?1, ?2, ?3)",
                params![id, position as i64, tag],
            )?;
        }
        self.conn.execute(
            "INSERT INTO stores_fts (rowid, name, description) VALUES (?1, ?2, ?3)",
            params![id, draft.name, draft.description],
        )?;
        self.conn.execute(
            "INSERT INTO stores_geo (id, min_lng, max_lng, min_lat, max_lat) VALUES (?1, ?2, ?2, ?3, ?3)",
            params![id, draft.location.lng(), draft.location.lat()],
        )?;
        Ok(())
    }

    /// Get a store by id
    pub fn get_store(&self, id: StoreId) -> Result<Option<Store>> {
        let sql = format!("SELECT {STORE_COLUMNS} FROM stores s WHERE s.id = ?1");
        Ok(self.query_stores(&sql, [id])?.into_iter().next())
    }

    /// Get a store by slug (case-insensitive)
    pub fn find_store_by_slug(&self, slug: &str) -> Result<Option<Store>> {
        let sql = format!("SELECT {STORE_COLUMNS} FROM stores s WHERE s.slug = ?1");
        Ok(self.query_stores(&sql, [slug])?.into_iter().next())
    }

    pub fn store_exists(&self, id: StoreId) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM stores WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Slugs equal to `candidate` or starting with `candidate-`, excluding
    /// one store. Callers narrow this to exact numeric suffixes.
    pub fn slugs_with_prefix(&self, candidate: &str, exclude: Option<StoreId>) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT slug FROM stores WHERE (slug = ?1 OR slug LIKE ?2) AND (?3 IS NULL OR id != ?3)",
        )?;
        let slugs = stmt
            .query_map(params![candidate, format!("{candidate}-%"), exclude], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(slugs)
    }

    /// One page of stores, newest first
    pub fn list_stores(&self, offset: usize, limit: usize) -> Result<Vec<Store>> {
        let sql = format!(
            "SELECT {STORE_COLUMNS} FROM stores s ORDER BY s.created_at DESC, s.id DESC LIMIT ?1 OFFSET ?2"
        );
        self.query_stores(&sql, params![sql_count(limit), sql_count(offset)])
    }

    /// Every store in insertion order
    pub fn all_stores(&self) -> Result<Vec<Store>> {
        let sql = format!("SELECT {STORE_COLUMNS} FROM stores s ORDER BY s.id");
        self.query_stores(&sql, [])
    }

    /// Count all stores
    pub fn count_stores(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM stores")
    }

    // ========== Tag Operations ==========

    /// Stores carrying at least one tag
    pub fn stores_with_any_tag(&self) -> Result<Vec<Store>> {
        let sql = format!(
            "SELECT {STORE_COLUMNS} FROM stores s WHERE EXISTS (SELECT 1 FROM store_tags t WHERE t.store_id = s.id) ORDER BY s.id"
        );
        self.query_stores(&sql, [])
    }

    /// Stores whose tag set contains exactly `tag`
    pub fn stores_with_tag(&self, tag: &str) -> Result<Vec<Store>> {
        let sql = format!(
            "SELECT {STORE_COLUMNS} FROM stores s JOIN store_tags t ON t.store_id = s.id WHERE t.tag = ?1 ORDER BY s.id"
        );
        self.query_stores(&sql, [tag])
    }

    /// `(tag, number of stores)` by count descending, then tag ascending
    pub fn tag_counts(&self) -> Result<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT tag, COUNT(*) AS n FROM store_tags GROUP BY tag ORDER BY n DESC, tag ASC",
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as usize)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }

    fn tags_for(&self, id: StoreId) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT tag FROM store_tags WHERE store_id = ?1 ORDER BY position")?;
        let tags = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(tags)
    }

    // ========== Index Operations ==========

    /// Full-text match against name and description.
    ///
    /// `match_expr` must already be a safe FTS5 expression. Returns
    /// `(store id, bm25 score)`, best first (lower bm25 is better); equal
    /// scores fall back to store id.
    pub fn text_matches(&self, match_expr: &str, limit: usize) -> Result<Vec<(StoreId, f64)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT rowid, bm25(stores_fts) AS score
            FROM stores_fts
            WHERE stores_fts MATCH ?1
            ORDER BY score, rowid
            LIMIT ?2
            "#,
        )?;
        let hits = stmt
            .query_map(params![match_expr, sql_count(limit)], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(hits)
    }

    /// Stores whose point lies inside a longitude/latitude box
    pub fn stores_in_box(&self, min_lng: f64, max_lng: f64, min_lat: f64, max_lat: f64) -> Result<Vec<Store>> {
        let sql = format!(
            r#"
            SELECT {STORE_COLUMNS}
            FROM stores_geo g JOIN stores s ON s.id = g.id
            WHERE g.max_lng >= ?1 AND g.min_lng <= ?2 AND g.max_lat >= ?3 AND g.min_lat <= ?4
            ORDER BY s.id
            "#
        );
        self.query_stores(&sql, params![min_lng, max_lng, min_lat, max_lat])
    }

    fn query_stores<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Store>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut stores = stmt
            .query_map(params, |row| self.row_to_store(row))?
            .collect::<rusqlite::Result<Vec<Store>>>()?;
        for store in &mut stores {
            store.tags = self.tags_for(store.id)?;
        }
        Ok(stores)
    }

    /// Helper to convert a row to a Store (tags are attached separately)
    fn row_to_store(&self, row: &rusqlite::Row) -> rusqlite::Result<Store> {
        Ok(Store {
            id: row.get(0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
            description: row.get(3)?,
            created_at: row.get(4)?,
            location: Location {
                kind: row.get(5)?,
                address: row.get(6)?,
                coordinates: [row.get(7)?, row.get(8)?],
            },
            photo: row.get(9)?,
            author_id: row.get(10)?,
            tags: Vec::new(),
        })
    }

    // ========== Review Operations ==========

    /// Insert a review that has already been validated
    pub fn insert_review(
        &self,
        store_id: StoreId,
        author_id: &str,
        rating: u8,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Review> {
        self.conn.execute(
            "INSERT INTO reviews (store_id, author_id, rating, text, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![store_id, author_id, rating, text, created_at],
        )?;
        Ok(Review {
            id: self.conn.last_insert_rowid(),
            store_id,
            author_id: author_id.to_string(),
            rating,
            text: text.to_string(),
            created_at,
        })
    }

    /// Reviews of one store, newest first
    pub fn reviews_for_store(&self, store_id: StoreId) -> Result<Vec<Review>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, store_id, author_id, rating, text, created_at FROM reviews WHERE store_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let reviews = stmt
            .query_map([store_id], |row| self.row_to_review(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reviews)
    }

    /// Every review in insertion order
    pub fn all_reviews(&self) -> Result<Vec<Review>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, store_id, author_id, rating, text, created_at FROM reviews ORDER BY id",
        )?;
        let reviews = stmt
            .query_map([], |row| self.row_to_review(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reviews)
    }

    /// Count all reviews
    pub fn count_reviews(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM reviews")
    }

    fn row_to_review(&self, row: &rusqlite::Row) -> rusqlite::Result<Review> {
        Ok(Review {
            id: row.get(0)?,
            store_id: row.get(1)?,
            author_id: row.get(2)?,
            rating: row.get(3)?,
            text: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    // ========== User Operations ==========

    /// Insert a user or refresh its name and email
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO users (id, name, email) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, email = excluded.email
            "#,
            params![user.id, user.name, user.email],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.conn
            .query_row("SELECT id, name, email FROM users WHERE id = ?1", [id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                })
            })
            .optional()
            .map_err(Into::into)
    }

    pub fn user_exists(&self, id: &str) -> Result<bool> {
        Ok(self.get_user(id)?.is_some())
    }

    /// Count all users
    pub fn count_users(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM users")
    }

    // ========== Heart Operations ==========

    /// The user's hearted store ids
    pub fn heart_ids(&self, user_id: &str) -> Result<BTreeSet<StoreId>> {
        let mut stmt = self.conn.prepare("SELECT store_id FROM hearts WHERE user_id = ?1")?;
        let ids = stmt
            .query_map([user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<BTreeSet<StoreId>>>()?;
        Ok(ids)
    }

    /// Remove a heart; returns whether one was present
    pub fn remove_heart(&self, user_id: &str, store_id: StoreId) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM hearts WHERE user_id = ?1 AND store_id = ?2",
            params![user_id, store_id],
        )?;
        Ok(removed > 0)
    }

    /// Add a heart; adding an existing heart is a no-op
    pub fn insert_heart(&self, user_id: &str, store_id: StoreId) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO hearts (user_id, store_id) VALUES (?1, ?2)",
            params![user_id, store_id],
        )?;
        Ok(())
    }

    /// Stores the user has hearted, in insertion order
    pub fn hearted_stores(&self, user_id: &str) -> Result<Vec<Store>> {
        let sql = format!(
            "SELECT {STORE_COLUMNS} FROM stores s JOIN hearts h ON h.store_id = s.id WHERE h.user_id = ?1 ORDER BY s.id"
        );
        self.query_stores(&sql, [user_id])
    }

    /// Count all hearts
    pub fn count_hearts(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM hearts")
    }

    // ========== Bulk Operations ==========

    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            stores: self.count_stores()?,
            tags: self.count("SELECT COUNT(DISTINCT tag) FROM store_tags")?,
            reviews: self.count_reviews()?,
            users: self.count_users()?,
            hearts: self.count_hearts()?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub stores: usize,
    pub tags: usize,
    pub reviews: usize,
    pub users: usize,
    pub hearts: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Stores: {}", self.stores)?;
        writeln!(f, "  Distinct tags: {}", self.tags)?;
        writeln!(f, "  Reviews: {}", self.reviews)?;
        writeln!(f, "  Users: {}", self.users)?;
        writeln!(f, "  Hearts: {}", self.hearts)
    }
}

/// SQLite binds integers as i64; counts past that are clamped
fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Whether a driver error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewLocation, NewStore};

    fn draft(name: &str, tags: &[&str]) -> StoreDraft {
        NewStore::new(name, NewLocation::point("1 Main St", 13.4, 52.5), "alice")
            .with_description("Coffee and cake")
            .with_tags(tags.iter().copied())
            .into_draft()
            .unwrap()
    }

    #[test]
    fn test_store_crud() {
        let store = SqliteStore::open_in_memory().unwrap();

        let id = store.insert_store(&draft("Cafe", &["wifi", "cake"]), "cafe", Utc::now()).unwrap();
        let retrieved = store.get_store(id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Cafe");
        assert_eq!(retrieved.slug, "cafe");
        assert_eq!(retrieved.tags, vec!["wifi", "cake"]);
        assert_eq!(retrieved.location.coordinates, [13.4, 52.5]);

        store.update_store(id, &draft("Cafe Two", &["cake"]), "cafe-two").unwrap();
        let updated = store.find_store_by_slug("CAFE-TWO").unwrap().unwrap();
        assert_eq!(updated.id, id);
        assert_eq!(updated.tags, vec!["cake"]);
        assert_eq!(updated.created_at, retrieved.created_at);
    }

    #[test]
    fn test_slug_unique_constraint() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_store(&draft("Cafe", &[]), "cafe", Utc::now()).unwrap();

        let err = store.insert_store(&draft("Cafe", &[]), "CAFE", Utc::now()).unwrap_err();
        assert!(is_unique_violation(&err));
        assert_eq!(store.count_stores().unwrap(), 1);
    }

    #[test]
    fn test_slugs_with_prefix() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.insert_store(&draft("x", &[]), "x", Utc::now()).unwrap();
        store.insert_store(&draft("x", &[]), "x-3", Utc::now()).unwrap();
        store.insert_store(&draft("x y", &[]), "x-y", Utc::now()).unwrap();
        store.insert_store(&draft("xx", &[]), "xx", Utc::now()).unwrap();

        let mut slugs = store.slugs_with_prefix("x", None).unwrap();
        slugs.sort();
        assert_eq!(slugs, vec!["x", "x-3", "x-y"]);

        let slugs = store.slugs_with_prefix("x", Some(first)).unwrap();
        assert!(!slugs.contains(&"x".to_string()));
    }

    #[test]
    fn test_tag_counts_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_store(&draft("a", &["wifi"]), "a", Utc::now()).unwrap();
        store.insert_store(&draft("b", &["wifi", "parking"]), "b", Utc::now()).unwrap();
        store.insert_store(&draft("c", &["parking", "vegan"]), "c", Utc::now()).unwrap();

        let counts = store.tag_counts().unwrap();
        assert_eq!(
            counts,
            vec![("parking".to_string(), 2), ("wifi".to_string(), 2), ("vegan".to_string(), 1)]
        );
    }

    #[test]
    fn test_hearts() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_user(&User::new("bob", "Bob")).unwrap();
        let id = store.insert_store(&draft("Cafe", &[]), "cafe", Utc::now()).unwrap();

        assert!(!store.remove_heart("bob", id).unwrap());
        store.insert_heart("bob", id).unwrap();
        store.insert_heart("bob", id).unwrap();
        assert_eq!(store.heart_ids("bob").unwrap().len(), 1);
        assert_eq!(store.hearted_stores("bob").unwrap()[0].id, id);
        assert!(store.remove_heart("bob", id).unwrap());
        assert!(store.heart_ids("bob").unwrap().is_empty());
    }

    #[test]
    fn test_with_immediate_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result: Result<()> = store.with_immediate(|| {
            store.insert_store(&draft("Cafe", &[]), "cafe", Utc::now())?;
            Err(crate::Error::Conflict("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.count_stores().unwrap(), 0);
    }

    #[test]
    fn test_open_file_backed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storemap.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_store(&draft("Cafe", &["wifi"]), "cafe", Utc::now()).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.stats().unwrap().stores, 1);
        assert_eq!(reopened.stats().unwrap().tags, 1);
    }
}
