//! Store repository - creation, owner-only updates and lookups
//!
//! Every write runs inside one immediate transaction: the slug is chosen,
//! checked and persisted while this connection holds the write lock.

use chrono::Utc;
use serde::Serialize;
use crate::review::Review;
use crate::slug::{self, SlugPattern, SuffixSequence};
use crate::storage::{SqliteStore, is_unique_violation};
use crate::store::{NewStore, Store, StoreDraft, StoreId, StorePatch};
use crate::{Error, Result};

/// Slugs tried per write before giving up with a conflict
pub const MAX_SLUG_ATTEMPTS: usize = 32;

/// Stores per listing page
pub const DEFAULT_PAGE_SIZE: usize = 4;

/// Largest page size a listing accepts
pub const MAX_PAGE_SIZE: usize = 1000;

/// A store with its reviews, newest first
#[derive(Debug, Clone, Serialize)]
pub struct StoreDetail {
    pub store: Store,
    pub reviews: Vec<Review>,
}

/// One page of the store listing
#[derive(Debug, Clone, Serialize)]
pub struct StorePage {
    pub stores: Vec<Store>,
    /// 1-based page number
    pub page: u32,
    pub pages: u32,
    pub count: usize,
}

/// Persistence and invariants for store records
pub struct StoreRepository<'a> {
    db: &'a SqliteStore,
    page_size: usize,
}

impl<'a> StoreRepository<'a> {
    pub fn new(db: &'a SqliteStore) -> Self {
        Self {
            db,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Validate and persist a new store, assigning its slug and `created_at`
    pub fn create(&self, input: NewStore) -> Result<Store> {
        let draft = input.into_draft()?;
        let created_at = Utc::now();

        let id = self.db.with_immediate(|| {
            self.write_with_unique_slug(&draft, None, |slug| {
                self.db.insert_store(&draft, slug, created_at)
            })
        })?;

        let store = self.get(id)?;
        tracing::info!("Created store {} ({})", store.slug, store.id);
        Ok(store)
    }

    /// Apply a patch to a store owned by `requester_id`.
    ///
    /// The slug is recomputed only when the name actually changes, so
    /// existing URLs stay valid across description or location edits.
    pub fn update(&self, id: StoreId, patch: StorePatch, requester_id: &str) -> Result<Store> {
        let store = self.db.with_immediate(|| {
            let current = self.get(id)?;
            confirm_owner(&current, requester_id)?;

            let renamed = patch.renames(&current);
            let draft = patch.apply_to(&current).into_draft()?;

            if renamed {
                self.write_with_unique_slug(&draft, Some(id), |slug| {
                    self.db.update_store(id, &draft, slug)
                })?;
            } else {
                self.db.update_store(id, &draft, &current.slug)?;
            }
            self.get(id)
        })?;

        tracing::info!("Updated store {} ({})", store.slug, store.id);
        Ok(store)
    }

    /// Count-based slug disambiguation for `candidate`, ignoring `exclude_id`.
    ///
    /// Existing slugs equal to the candidate or the candidate plus a numeric
    /// suffix are counted case-insensitively; any match yields
    /// `candidate-(count + 1)`.
    pub fn ensure_unique_slug(&self, candidate: &str, exclude_id: Option<StoreId>) -> Result<String> {
        Ok(slug::count_based(candidate, self.count_slug_matches(candidate, exclude_id)?))
    }

    fn count_slug_matches(&self, candidate: &str, exclude_id: Option<StoreId>) -> Result<usize> {
        let pattern = SlugPattern::new(candidate)?;
        let matches = self
            .db
            .slugs_with_prefix(candidate, exclude_id)?
            .iter()
            .filter(|existing| pattern.is_match(existing))
            .count();
        Ok(matches)
    }

    /// Run `write` with the count-based slug, moving to the next suffix
    /// whenever the storage constraint reports the slug as taken.
    fn write_with_unique_slug<T>(
        &self,
        draft: &StoreDraft,
        exclude_id: Option<StoreId>,
        mut write: impl FnMut(&str) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let candidate = slug::derive_slug(&draft.name);
        let matches = self.count_slug_matches(&candidate, exclude_id)?;

        for slug in SuffixSequence::new(candidate.as_str(), matches).take(MAX_SLUG_ATTEMPTS) {
            match write(&slug) {
                Ok(value) => return Ok(value),
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!("Slug {} already taken, trying next suffix", slug);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::Conflict(format!(
            "no free slug for '{}' after {} attempts",
            candidate, MAX_SLUG_ATTEMPTS
        )))
    }

    /// Get a store by id
    pub fn get(&self, id: StoreId) -> Result<Store> {
        self.db
            .get_store(id)?
            .ok_or_else(|| Error::not_found("store", id))
    }

    /// Get a store for its owner's edit form
    pub fn get_for_edit(&self, id: StoreId, requester_id: &str) -> Result<Store> {
        let store = self.get(id)?;
        confirm_owner(&store, requester_id)?;
        Ok(store)
    }

    /// Get a store and its reviews by slug
    pub fn get_by_slug(&self, slug: &str) -> Result<StoreDetail> {
        let store = self
            .db
            .find_store_by_slug(slug)?
            .ok_or_else(|| Error::not_found("store", slug))?;
        let reviews = self.db.reviews_for_store(store.id)?;
        Ok(StoreDetail { store, reviews })
    }

    /// One page of stores, newest first.
    ///
    /// Page 1 of an empty catalog is an empty page; any later page past the
    /// end fails with [`Error::OutOfRange`] naming the last page.
    pub fn list_page(&self, page: u32) -> Result<StorePage> {
        let page = page.max(1);
        let count = self.db.count_stores()?;
        let pages = u32::try_from(count.div_ceil(self.page_size)).unwrap_or(u32::MAX);
        let offset = (page as usize - 1).saturating_mul(self.page_size);

        let stores = self.db.list_stores(offset, self.page_size)?;
        if stores.is_empty() && offset > 0 {
            return Err(Error::OutOfRange { last_page: pages.max(1) });
        }

        Ok(StorePage { stores, page, pages, count })
    }
}

fn confirm_owner(store: &Store, requester_id: &str) -> Result<()> {
    if store.is_owned_by(requester_id) {
        Ok(())
    } else {
        tracing::warn!("User {} tried to edit store {} owned by someone else", requester_id, store.id);
        Err(Error::Authorization(format!(
            "you must own store '{}' in order to edit it",
            store.slug
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewLocation;

    fn input(name: &str) -> NewStore {
        NewStore::new(name, NewLocation::point("1 Main St", -0.1276, 51.5072), "alice")
            .with_description("Coffee and cake")
    }

    #[test]
    fn test_create_assigns_slug() {
        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db);

        let store = repo.create(input("Cafe Deluxe")).unwrap();
        assert_eq!(store.slug, "cafe-deluxe");
        assert_eq!(store.author_id, "alice");
        assert!(store.id > 0);
    }

    #[test]
    fn test_duplicate_names_get_suffixes() {
        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db);

        assert_eq!(repo.create(input("Cafe Deluxe")).unwrap().slug, "cafe-deluxe");
        assert_eq!(repo.create(input("Cafe Deluxe")).unwrap().slug, "cafe-deluxe-2");
        assert_eq!(repo.create(input("café deluxe")).unwrap().slug, "cafe-deluxe-3");
    }

    #[test]
    fn test_sparse_suffix_does_not_collide() {
        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db);

        let first = repo.create(input("x")).unwrap();
        let second = repo.create(input("x")).unwrap();
        let third = repo.create(input("x")).unwrap();
        assert_eq!(third.slug, "x-3");

        // Free up "x-2" by renaming, leaving x and x-3
        repo.update(second.id, StorePatch::name("y"), "alice").unwrap();
        assert_eq!(repo.ensure_unique_slug("x", None).unwrap(), "x-3");

        let fourth = repo.create(input("x")).unwrap();
        assert_eq!(fourth.slug, "x-4");
        assert_eq!(first.slug, "x");
    }

    #[test]
    fn test_create_reports_all_invalid_fields() {
        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db);

        let err = repo.create(NewStore::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"location.address"));
        assert!(fields.contains(&"location.coordinates"));
        assert!(fields.contains(&"author_id"));
        assert_eq!(db.count_stores().unwrap(), 0);
    }

    #[test]
    fn test_update_description_keeps_slug() {
        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db);
        let store = repo.create(input("Cafe Deluxe")).unwrap();

        let updated = repo
            .update(store.id, StorePatch::description("Now with waffles"), "alice")
            .unwrap();
        assert_eq!(updated.slug, "cafe-deluxe");
        assert_eq!(updated.description.as_deref(), Some("Now with waffles"));
        assert_eq!(updated.created_at, store.created_at);
    }

    #[test]
    fn test_update_rename_recomputes_slug_excluding_self() {
        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db);
        let store = repo.create(input("Cafe Deluxe")).unwrap();

        let renamed = repo.update(store.id, StorePatch::name("Cafe Royale"), "alice").unwrap();
        assert_eq!(renamed.slug, "cafe-royale");

        // Renaming back must not count the store's own current slug
        let back = repo.update(store.id, StorePatch::name("Cafe Deluxe"), "alice").unwrap();
        assert_eq!(back.slug, "cafe-deluxe");
    }

    #[test]
    fn test_update_requires_owner() {
        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db);
        let store = repo.create(input("Cafe Deluxe")).unwrap();

        let err = repo.update(store.id, StorePatch::name("Mine now"), "mallory").unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));
        assert_eq!(repo.get(store.id).unwrap().name, "Cafe Deluxe");

        assert!(matches!(repo.get_for_edit(store.id, "mallory"), Err(Error::Authorization(_))));
        assert!(repo.get_for_edit(store.id, "alice").is_ok());
    }

    #[test]
    fn test_update_missing_store() {
        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db);

        let err = repo.update(42, StorePatch::name("Ghost"), "alice").unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "store", .. }));
    }

    #[test]
    fn test_update_revalidates_full_shape() {
        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db);
        let store = repo.create(input("Cafe Deluxe")).unwrap();

        let patch = StorePatch {
            location: Some(NewLocation {
                kind: None,
                address: Some("  ".into()),
                coordinates: Some(vec![1.0, 2.0, 3.0]),
            }),
            ..StorePatch::default()
        };
        let err = repo.update(store.id, patch, "alice").unwrap_err();
        assert_eq!(err.field_errors().len(), 2);
        assert_eq!(repo.get(store.id).unwrap().location.address, "1 Main St");
    }

    #[test]
    fn test_get_by_slug() {
        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db);
        let store = repo.create(input("Cafe Deluxe")).unwrap();

        let detail = repo.get_by_slug("cafe-deluxe").unwrap();
        assert_eq!(detail.store.id, store.id);
        assert!(detail.reviews.is_empty());

        assert!(matches!(repo.get_by_slug("nope"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_list_page() {
        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db).with_page_size(2);

        let empty = repo.list_page(1).unwrap();
        assert!(empty.stores.is_empty());
        assert_eq!(empty.pages, 0);

        for name in ["a", "b", "c"] {
            repo.create(input(name)).unwrap();
        }

        let first = repo.list_page(1).unwrap();
        assert_eq!(first.count, 3);
        assert_eq!(first.pages, 2);
        assert_eq!(first.stores[0].name, "c");

        let second = repo.list_page(2).unwrap();
        assert_eq!(second.stores.len(), 1);
        assert_eq!(second.stores[0].name, "a");

        assert!(matches!(repo.list_page(5), Err(Error::OutOfRange { last_page: 2 })));
    }

    #[test]
    fn test_huge_page_size_and_page_stay_in_range() {
        let db = SqliteStore::open_in_memory().unwrap();
        repo_with_three(&db);
        let repo = StoreRepository::new(&db).with_page_size(usize::MAX);

        let first = repo.list_page(1).unwrap();
        assert_eq!(first.stores.len(), 3);
        assert_eq!(first.pages, 1);

        assert!(matches!(repo.list_page(2), Err(Error::OutOfRange { last_page: 1 })));
        assert!(matches!(repo.list_page(u32::MAX), Err(Error::OutOfRange { last_page: 1 })));
    }

    fn repo_with_three(db: &SqliteStore) {
        let repo = StoreRepository::new(db);
        for name in ["a", "b", "c"] {
            repo.create(input(name)).unwrap();
        }
    }
}
