//! Review intake - the write path the review subsystem uses.
//! Aggregations elsewhere only ever read reviews.

use chrono::Utc;
use crate::review::{NewReview, Review};
use crate::storage::SqliteStore;
use crate::{Error, Result};

pub struct ReviewLog<'a> {
    db: &'a SqliteStore,
}

impl<'a> ReviewLog<'a> {
    pub fn new(db: &'a SqliteStore) -> Self {
        Self { db }
    }

    /// Record a review against an existing store
    pub fn add_review(&self, input: NewReview) -> Result<Review> {
        let (rating, text, author_id) = input.validate()?;
        if !self.db.store_exists(input.store_id)? {
            return Err(Error::not_found("store", input.store_id));
        }

        let review = self
            .db
            .insert_review(input.store_id, &author_id, rating, &text, Utc::now())?;
        tracing::info!("Recorded {}-star review for store {}", rating, input.store_id);
        Ok(review)
    }
}
