//! Favorites ("hearts") - the many-to-many relation between users and stores

use std::collections::BTreeSet;
use crate::storage::SqliteStore;
use crate::store::{Store, StoreId};
use crate::{Error, Result};

/// Toggles and lists a user's hearted stores
pub struct FavoritesService<'a> {
    db: &'a SqliteStore,
}

impl<'a> FavoritesService<'a> {
    pub fn new(db: &'a SqliteStore) -> Self {
        Self { db }
    }

    /// Heart the store if it isn't hearted yet, otherwise un-heart it.
    ///
    /// Runs as one immediate transaction, so two concurrent toggles by the
    /// same user apply one after the other. Hearting a store that does not
    /// exist fails; un-hearting never needs the store to exist.
    pub fn toggle_heart(&self, user_id: &str, store_id: StoreId) -> Result<BTreeSet<StoreId>> {
        self.db.with_immediate(|| {
            self.require_user(user_id)?;

            if self.db.remove_heart(user_id, store_id)? {
                tracing::info!("User {} un-hearted store {}", user_id, store_id);
            } else {
                if !self.db.store_exists(store_id)? {
                    return Err(Error::not_found("store", store_id));
                }
                self.db.insert_heart(user_id, store_id)?;
                tracing::info!("User {} hearted store {}", user_id, store_id);
            }

            self.db.heart_ids(user_id)
        })
    }

    /// The user's hearted store ids
    pub fn hearts(&self, user_id: &str) -> Result<BTreeSet<StoreId>> {
        self.require_user(user_id)?;
        self.db.heart_ids(user_id)
    }

    /// Every store the user has hearted
    pub fn list_hearted(&self, user_id: &str) -> Result<Vec<Store>> {
        self.require_user(user_id)?;
        self.db.hearted_stores(user_id)
    }

    fn require_user(&self, user_id: &str) -> Result<()> {
        if self.db.user_exists(user_id)? {
            Ok(())
        } else {
            Err(Error::not_found("user", user_id))
        }
    }
}
