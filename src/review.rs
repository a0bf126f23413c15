//! Reviews, owned by the review subsystem and read by the rating aggregator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::store::StoreId;
use crate::user::UserId;
use crate::{Result, ValidationErrors};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// A user's rating and comment on one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub store_id: StoreId,
    pub author_id: UserId,
    /// Integer rating in `1..=5`
    pub rating: u8,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub store_id: StoreId,
    pub author_id: UserId,
    pub rating: i64,
    #[serde(default)]
    pub text: String,
}

impl NewReview {
    pub fn new(store_id: StoreId, author_id: impl Into<UserId>, rating: i64, text: impl Into<String>) -> Self {
        Self {
            store_id,
            author_id: author_id.into(),
            rating,
            text: text.into(),
        }
    }

    /// Validated rating, trimmed text and author
    pub fn validate(&self) -> Result<(u8, String, UserId)> {
        let mut errors = ValidationErrors::new();

        let rating = u8::try_from(self.rating)
            .ok()
            .filter(|r| (MIN_RATING..=MAX_RATING).contains(r));
        if rating.is_none() {
            errors.push("rating", format!("Rating must be between {MIN_RATING} and {MAX_RATING}"));
        }

        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.push("text", "Your review must have text!");
        }

        let author_id = self.author_id.trim().to_string();
        if author_id.is_empty() {
            errors.push("author_id", "Please supply an author!");
        }

        errors.into_result()?;
        Ok((rating.unwrap_or(MIN_RATING), text, author_id))
    }
}
