//! # Storemap - Store Directory Core
//!
//! Catalog and query engine for a directory of stores (points of interest).
//!
//! Storemap provides:
//! - Slug generation with storage-enforced uniqueness
//! - Store creation and owner-only updates with full-shape validation
//! - Full-text relevance search over store names and descriptions (FTS5)
//! - Geospatial nearest-neighbor queries (R*Tree prefilter + haversine)
//! - Tag aggregation and tag browsing
//! - Top-rated leaderboard joining stores with their reviews
//! - Per-user favorites ("hearts")
//!
//! Every component borrows an explicit [`SqliteStore`] handle; nothing is
//! resolved through a global registry.

pub mod slug;
pub mod store;
pub mod review;
pub mod user;
pub mod storage;
pub mod catalog;
pub mod query;
pub mod server;
pub mod output;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use store::{Location, NewLocation, NewStore, Store, StoreId, StorePatch};
pub use review::{NewReview, Review};
pub use user::{User, UserId};
pub use storage::SqliteStore;
pub use catalog::{FavoritesService, ReviewLog, StoreRepository};
pub use query::{GeoIndex, RatingAggregator, SearchIndex, TagAggregator};

/// Result type alias for Storemap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Storemap operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Page out of range (last page is {last_page})")]
    OutOfRange { last_page: u32 },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound { entity, id: id.to_string() }
    }

    /// Field-level detail for validation failures, empty for every other kind
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Error::Validation(errors) => &errors.0,
            _ => &[],
        }
    }
}

/// A single violated field and the reason it was rejected
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every field violation found while validating one input
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was collected, otherwise the collected errors
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}
