//! Read side of the catalog: search, geo, tag and rating queries

pub mod search;
pub mod geo;
pub mod tags;
pub mod rating;

pub use search::{SearchHit, SearchIndex};
pub use geo::{GeoIndex, GeoQuery, NearbyStore};
pub use tags::{TagAggregator, TagCount, TagPage};
pub use rating::{RankedStore, RatingAggregator};
