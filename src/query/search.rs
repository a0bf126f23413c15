//! Full-text relevance search over store names and descriptions
//!
//! User input never reaches FTS5 as syntax: the query is split into plain
//! terms here, and each term is passed as a quoted string literal.

use serde::Serialize;
use crate::Result;
use crate::storage::SqliteStore;
use crate::store::Store;

/// Results returned by a search unless configured otherwise
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// A search result with its relevance score (higher is better)
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub store: Store,
    pub score: f64,
}

/// Relevance-ranked text search
pub struct SearchIndex<'a> {
    db: &'a SqliteStore,
    limit: usize,
}

impl<'a> SearchIndex<'a> {
    pub fn new(db: &'a SqliteStore) -> Self {
        Self {
            db,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Stores matching any term of `query`, most relevant first
    pub fn search(&self, query: &str) -> Result<Vec<Store>> {
        Ok(self.search_scored(query)?.into_iter().map(|hit| hit.store).collect())
    }

    /// Like [`search`](Self::search), keeping each store's score
    pub fn search_scored(&self, query: &str) -> Result<Vec<SearchHit>> {
        let Some(expr) = match_expression(query) else {
            return Ok(Vec::new());
        };
        if self.limit == 0 {
            return Ok(Vec::new());
        }

        tracing::debug!("Full-text search: {}", expr);
        let mut hits = Vec::new();
        for (id, bm25) in self.db.text_matches(&expr, self.limit)? {
            if let Some(store) = self.db.get_store(id)? {
                // bm25 is negative, more negative is more relevant
                hits.push(SearchHit { store, score: -bm25 });
            }
        }
        Ok(hits)
    }
}

/// Split text into the alphanumeric terms the index tokenizes on
pub fn tokenize_query(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

/// FTS5 expression matching any of the query's terms, or `None` when the
/// query has no terms at all
pub fn match_expression(query: &str) -> Option<String> {
    let terms = tokenize_query(query);
    if terms.is_empty() {
        return None;
    }
    let quoted: Vec<String> = terms
        .iter()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();
    Some(quoted.join(" OR "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StoreRepository;
    use crate::store::{NewLocation, NewStore};

    fn seed(db: &SqliteStore) {
        let repo = StoreRepository::new(db);
        let stores = [
            ("Coffee Corner", "Coffee, coffee and more coffee"),
            ("Tea House", "Loose leaf tea with a little coffee on the side"),
            ("Burger Barn", "Burgers and fries"),
            ("Café Crème", "French pastries"),
        ];
        for (name, description) in stores {
            repo.create(
                NewStore::new(name, NewLocation::point("1 Main St", 1.0, 1.0), "alice")
                    .with_description(description),
            )
            .unwrap();
        }
    }

    #[test]
    fn test_search_ranks_by_relevance() {
        let db = SqliteStore::open_in_memory().unwrap();
        seed(&db);

        let results = SearchIndex::new(&db).search("coffee").unwrap();
        let names: Vec<_> = results.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Coffee Corner", "Tea House"]);
    }

    #[test]
    fn test_search_any_term_and_diacritics() {
        let db = SqliteStore::open_in_memory().unwrap();
        seed(&db);

        let results = SearchIndex::new(&db).search("burgers cafe").unwrap();
        let mut names: Vec<_> = results.iter().map(|s| s.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Burger Barn", "Café Crème"]);
    }

    #[test]
    fn test_search_is_capped() {
        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db);
        for i in 0..8 {
            repo.create(
                NewStore::new(format!("Pizza {i}"), NewLocation::point("1 Main St", 1.0, 1.0), "alice"),
            )
            .unwrap();
        }

        assert_eq!(SearchIndex::new(&db).search("pizza").unwrap().len(), 5);
        assert_eq!(SearchIndex::new(&db).with_limit(2).search("pizza").unwrap().len(), 2);
    }

    #[test]
    fn test_empty_and_unmatched_queries() {
        let db = SqliteStore::open_in_memory().unwrap();
        seed(&db);
        let index = SearchIndex::new(&db);

        assert!(index.search("").unwrap().is_empty());
        assert!(index.search("   !!! ").unwrap().is_empty());
        assert!(index.search("sushi").unwrap().is_empty());
    }

    #[test]
    fn test_query_syntax_is_inert() {
        let db = SqliteStore::open_in_memory().unwrap();
        seed(&db);
        let index = SearchIndex::new(&db);

        // Column filters, NEAR groups and unbalanced quotes are plain text
        assert!(index.search("description:burgers").unwrap().len() == 1);
        assert!(index.search("NEAR(\"tea\" \"coffee\")").is_ok());
        assert!(index.search("\"coffee").is_ok());
        assert!(index.search("burg*").unwrap().is_empty());
    }

    #[test]
    fn test_match_expression() {
        assert_eq!(match_expression("tea  OR coffee").unwrap(), "\"tea\" OR \"OR\" OR \"coffee\"");
        assert_eq!(match_expression("-:*"), None);
    }
}
