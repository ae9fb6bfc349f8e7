//! Storage boundaries of the recommendation engine
//!
//! The engine reads ratings and item metadata owned by other parts of the
//! system and is the sole writer of the recommendation table. Each concern is
//! a trait so the pipeline can run against PostgreSQL in production and an
//! in-memory store in tests.

use std::collections::HashMap;

use crate::{
    error::AppResult,
    models::{Item, ItemId, Rating, RatingChange, Recommendation, ScoredItem, UserId},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};

/// Read access to the full rating table
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RatingSource: Send + Sync {
    /// Returns every stored rating, one per `(user_id, item_id)` pair
    async fn all_ratings(&self) -> AppResult<Vec<Rating>>;
}

/// Write access to ratings, owned by the persistence layer in front of the engine
#[async_trait::async_trait]
pub trait RatingWriter: Send + Sync {
    /// Inserts the rating or replaces the existing one for the same pair
    async fn upsert_rating(&self, rating: Rating) -> AppResult<RatingChange>;
}

/// Item metadata lookups
#[async_trait::async_trait]
pub trait ItemCatalog: Send + Sync {
    async fn upsert_item(&self, item: Item) -> AppResult<()>;

    /// Resolves display names; unknown ids are absent from the result
    async fn item_names(&self, item_ids: &[ItemId]) -> AppResult<HashMap<ItemId, String>>;
}

/// The persisted top-N lists
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Replaces every stored recommendation with `recommendations`
    ///
    /// Implementations swap the whole set at once: a concurrent reader sees
    /// either the previous lists or the new ones.
    async fn replace_all(&self, recommendations: Vec<Recommendation>) -> AppResult<()>;

    /// Returns the stored list for one user ordered by rank, joined with item names
    async fn for_user(&self, user_id: UserId) -> AppResult<Vec<ScoredItem>>;
}
