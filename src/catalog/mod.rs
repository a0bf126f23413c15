//! Write side of the catalog: stores, favorites and review intake

pub mod repository;
pub mod favorites;
pub mod reviews;

pub use repository::{StoreDetail, StorePage, StoreRepository};
pub use favorites::FavoritesService;
pub use reviews::ReviewLog;
