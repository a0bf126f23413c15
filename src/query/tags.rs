//! Tag aggregation and tag browsing

use serde::Serialize;
use crate::Result;
use crate::storage::SqliteStore;
use crate::store::Store;

/// A distinct tag and how many stores carry it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Everything the tags page shows: the tag cloud plus the selected stores
#[derive(Debug, Clone, Serialize)]
pub struct TagPage {
    pub tags: Vec<TagCount>,
    pub tag: Option<String>,
    pub stores: Vec<Store>,
}

pub struct TagAggregator<'a> {
    db: &'a SqliteStore,
}

impl<'a> TagAggregator<'a> {
    pub fn new(db: &'a SqliteStore) -> Self {
        Self { db }
    }

    /// One entry per distinct tag, most used first, ties by tag name
    pub fn list_tags(&self) -> Result<Vec<TagCount>> {
        Ok(self
            .db
            .tag_counts()?
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect())
    }

    /// Stores carrying exactly `tag`, or every tagged store when no tag
    /// (or a blank one) is given
    pub fn stores_by_tag(&self, tag: Option<&str>) -> Result<Vec<Store>> {
        match tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(tag) => self.db.stores_with_tag(tag),
            None => self.db.stores_with_any_tag(),
        }
    }

    pub fn tag_page(&self, tag: Option<&str>) -> Result<TagPage> {
        Ok(TagPage {
            tags: self.list_tags()?,
            tag: tag.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string),
            stores: self.stores_by_tag(tag)?,
        })
    }
}
