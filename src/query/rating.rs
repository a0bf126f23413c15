//! Top-rated leaderboard
//!
//! The ranking is a pipeline of pure stages over `(stores, reviews)`:
//!
//! 1. lookup  - attach each store's ratings
//! 2. match   - keep stores with at least [`MIN_REVIEWS`] reviews
//! 3. average - arithmetic mean of the ratings
//! 4. sort    - average descending; ties by review count descending, then store id
//! 5. limit
//!
//! [`RatingAggregator`] only loads the data and runs [`top_rated`].

use std::cmp::Ordering;
use std::collections::HashMap;
use serde::Serialize;
use crate::Result;
use crate::review::Review;
use crate::storage::SqliteStore;
use crate::store::{Store, StoreId};

/// Fewer reviews than this and a store is never ranked
pub const MIN_REVIEWS: usize = 2;

pub const DEFAULT_TOP_LIMIT: usize = 10;

/// A store joined with the ratings of its reviews
#[derive(Debug, Clone)]
pub struct ReviewedStore {
    pub store: Store,
    pub ratings: Vec<u8>,
}

/// A leaderboard entry
#[derive(Debug, Clone, Serialize)]
pub struct RankedStore {
    pub store: Store,
    pub average_rating: f64,
    pub review_count: usize,
}

/// Stage 1: join every store with the ratings that reference it
pub fn lookup_reviews(stores: Vec<Store>, reviews: &[Review]) -> Vec<ReviewedStore> {
    let mut by_store: HashMap<StoreId, Vec<u8>> = HashMap::new();
    for review in reviews {
        by_store.entry(review.store_id).or_default().push(review.rating);
    }

    stores
        .into_iter()
        .map(|store| {
            let ratings = by_store.remove(&store.id).unwrap_or_default();
            ReviewedStore { store, ratings }
        })
        .collect()
}

/// Stage 2: drop stores with fewer than `min_reviews` reviews
pub fn match_min_reviews(rows: Vec<ReviewedStore>, min_reviews: usize) -> Vec<ReviewedStore> {
    rows.into_iter()
        .filter(|row| row.ratings.len() >= min_reviews)
        .collect()
}

/// Stage 3: add the mean rating. Rows without ratings are skipped.
pub fn add_average(rows: Vec<ReviewedStore>) -> Vec<RankedStore> {
    rows.into_iter()
        .filter(|row| !row.ratings.is_empty())
        .map(|row| {
            let sum: u32 = row.ratings.iter().map(|&r| u32::from(r)).sum();
            let review_count = row.ratings.len();
            RankedStore {
                store: row.store,
                average_rating: f64::from(sum) / review_count as f64,
                review_count,
            }
        })
        .collect()
}

/// Stage 4: best average first, deterministic on exact ties
pub fn sort_by_average(rows: &mut [RankedStore]) {
    rows.sort_by(|a, b| {
        b.average_rating
            .partial_cmp(&a.average_rating)
            .unwrap_or(Ordering::Equal)
            .then(b.review_count.cmp(&a.review_count))
            .then(a.store.id.cmp(&b.store.id))
    });
}

/// The whole pipeline
pub fn top_rated(stores: Vec<Store>, reviews: &[Review], limit: usize) -> Vec<RankedStore> {
    let joined = lookup_reviews(stores, reviews);
    let significant = match_min_reviews(joined, MIN_REVIEWS);
    let mut ranked = add_average(significant);
    sort_by_average(&mut ranked);
    ranked.truncate(limit);
    ranked
}

/// Runs the leaderboard pipeline over the stored catalog
pub struct RatingAggregator<'a> {
    db: &'a SqliteStore,
}

impl<'a> RatingAggregator<'a> {
    pub fn new(db: &'a SqliteStore) -> Self {
        Self { db }
    }

    pub fn top_rated(&self, limit: usize) -> Result<Vec<RankedStore>> {
        let stores = self.db.all_stores()?;
        let reviews = self.db.all_reviews()?;
        tracing::debug!("Ranking {} stores over {} reviews", stores.len(), reviews.len());
        Ok(top_rated(stores, &reviews, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::store::Location;

    fn store(id: StoreId) -> Store {
        Store {
            id,
            name: format!("Store {id}"),
            slug: format!("store-{id}"),
            description: None,
            tags: vec![],
            created_at: Utc::now(),
            location: Location::point("1 Main St", 0.0, 0.0),
            photo: None,
            author_id: "alice".into(),
        }
    }

    fn reviews(pairs: &[(StoreId, u8)]) -> Vec<Review> {
        pairs.iter()
            .enumerate()
            .map(|(i, &(store_id, rating))| Review {
                id: i as i64 + 1,
                store_id,
                author_id: "bob".into(),
                rating,
                text: "ok".into(),
                created_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_single_review_store_is_excluded() {
        let ranked = top_rated(vec![store(1), store(2)], &reviews(&[(1, 5), (1, 3), (2, 5)]), 10);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].store.id, 1);
        assert_eq!(ranked[0].average_rating, 4.0);
        assert_eq!(ranked[0].review_count, 2);
    }

    #[test]
    fn test_sorted_by_average_and_limited() {
        let stores = (1..=4).map(store).collect();
        let data = reviews(&[
            (1, 2), (1, 3),
            (2, 5), (2, 4), (2, 5),
            (3, 4), (3, 5),
            (4, 1), (4, 1),
        ]);

        let ranked = top_rated(stores, &data, 3);
        let order: Vec<_> = ranked.iter().map(|r| r.store.id).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert!((ranked[0].average_rating - 14.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ties_prefer_more_reviews_then_lower_id() {
        let stores = (1..=3).map(store).collect();
        let data = reviews(&[(3, 4), (3, 4), (2, 4), (2, 4), (1, 4), (1, 4), (1, 4)]);

        let order: Vec<_> = top_rated(stores, &data, 10).iter().map(|r| r.store.id).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_reviews_for_unknown_stores_are_ignored() {
        let ranked = top_rated(vec![store(1)], &reviews(&[(9, 5), (9, 5)]), 10);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_stages_compose() {
        let joined = lookup_reviews(vec![store(1), store(2)], &reviews(&[(2, 1), (2, 2)]));
        assert_eq!(joined[0].ratings, Vec::<u8>::new());
        assert_eq!(joined[1].ratings, vec![1, 2]);

        let matched = match_min_reviews(joined, MIN_REVIEWS);
        assert_eq!(matched.len(), 1);

        let averaged = add_average(matched);
        assert_eq!(averaged[0].average_rating, 1.5);
    }

    #[test]
    fn test_aggregator_over_storage() {
        use crate::catalog::{ReviewLog, StoreRepository};
        use crate::review::NewReview;
        use crate::store::{NewLocation, NewStore};

        let db = SqliteStore::open_in_memory().unwrap();
        let repo = StoreRepository::new(&db);
        let a = repo.create(NewStore::new("A", NewLocation::point("x", 1.0, 1.0), "alice")).unwrap();
        let b = repo.create(NewStore::new("B", NewLocation::point("x", 1.0, 1.0), "alice")).unwrap();

        let log = ReviewLog::new(&db);
        log.add_review(NewReview::new(a.id, "bob", 5, "great")).unwrap();
        log.add_review(NewReview::new(a.id, "carol", 3, "fine")).unwrap();
        log.add_review(NewReview::new(b.id, "bob", 5, "great")).unwrap();

        let ranked = RatingAggregator::new(&db).top_rated(DEFAULT_TOP_LIMIT).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].store.name, "A");
        assert_eq!(ranked[0].average_rating, 4.0);
    }
}
