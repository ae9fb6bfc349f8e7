use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    error::AppResult,
    models::{Item, ItemId, Rating, RatingChange, Recommendation, ScoredItem, UserId},
};

use super::{ItemCatalog, RatingSource, RatingWriter, RecommendationStore};

/// In-process store implementing every storage boundary
///
/// Ratings keep their insertion order so the matrix builder sees a stable
/// first-observed ordering. Recommendations live behind an `Arc` that is
/// swapped wholesale on replace.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    ratings: RwLock<Vec<Rating>>,
    items: RwLock<HashMap<ItemId, String>>,
    recommendations: RwLock<Arc<HashMap<UserId, Vec<Recommendation>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored recommendation rows
    pub async fn recommendation_count(&self) -> usize {
        let snapshot = self.inner.recommendations.read().await.clone();
        snapshot.values().map(Vec::len).sum()
    }

    /// Every stored recommendation row, ordered by user then rank
    pub async fn all_recommendations(&self) -> Vec<Recommendation> {
        let snapshot = self.inner.recommendations.read().await.clone();
        let mut rows: Vec<Recommendation> = snapshot.values().flatten().cloned().collect();
        rows.sort_by_key(|r| (r.user_id, r.rank));
        rows
    }
}

#[async_trait::async_trait]
impl RatingSource for MemoryStore {
    async fn all_ratings(&self) -> AppResult<Vec<Rating>> {
        Ok(self.inner.ratings.read().await.clone())
    }
}

#[async_trait::async_trait]
impl RatingWriter for MemoryStore {
    async fn upsert_rating(&self, rating: Rating) -> AppResult<RatingChange> {
        let mut ratings = self.inner.ratings.write().await;
        match ratings
            .iter_mut()
            .find(|r| r.user_id == rating.user_id && r.item_id == rating.item_id)
        {
            Some(existing) => {
                *existing = rating;
                Ok(RatingChange::Updated)
            }
            None => {
                ratings.push(rating);
                Ok(RatingChange::Created)
            }
        }
    }
}

#[async_trait::async_trait]
impl ItemCatalog for MemoryStore {
    async fn upsert_item(&self, item: Item) -> AppResult<()> {
        self.inner.items.write().await.insert(item.id, item.name);
        Ok(())
    }

    async fn item_names(&self, item_ids: &[ItemId]) -> AppResult<HashMap<ItemId, String>> {
        let items = self.inner.items.read().await;
        Ok(item_ids
            .iter()
            .filter_map(|id| items.get(id).map(|name| (*id, name.clone())))
            .collect())
    }
}

#[async_trait::async_trait]
impl RecommendationStore for MemoryStore {
    async fn replace_all(&self, recommendations: Vec<Recommendation>) -> AppResult<()> {
        let mut by_user: HashMap<UserId, Vec<Recommendation>> = HashMap::new();
        for rec in recommendations {
            by_user.entry(rec.user_id).or_default().push(rec);
        }
        for list in by_user.values_mut() {
            list.sort_by_key(|r| r.rank);
        }

        // Built off to the side; readers keep the old map until this swap.
        *self.inner.recommendations.write().await = Arc::new(by_user);
        Ok(())
    }

    async fn for_user(&self, user_id: UserId) -> AppResult<Vec<ScoredItem>> {
        let snapshot = self.inner.recommendations.read().await.clone();
        let Some(list) = snapshot.get(&user_id) else {
            return Ok(Vec::new());
        };

        let item_ids: Vec<ItemId> = list.iter().map(|r| r.item_id).collect();
        let names = self.item_names(&item_ids).await?;

        Ok(list
            .iter()
            .map(|r| ScoredItem {
                item_id: r.item_id,
                name: names.get(&r.item_id).cloned().unwrap_or_default(),
                score: r.predicted_rating,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(user_id: UserId, item_id: ItemId, rank: i32, score: f64) -> Recommendation {
        Recommendation {
            user_id,
            item_id,
            rank,
            predicted_rating: score,
        }
    }

    #[tokio::test]
    async fn test_upsert_rating_reports_created_then_updated() {
        let store = MemoryStore::new();
        let first = store.upsert_rating(Rating::new(1, 10, 4.0)).await.unwrap();
        let second = store.upsert_rating(Rating::new(1, 10, 2.5)).await.unwrap();

        assert_eq!(first, RatingChange::Created);
        assert_eq!(second, RatingChange::Updated);

        let ratings = store.all_ratings().await.unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].rating, 2.5);
    }

    #[tokio::test]
    async fn test_ratings_keep_insertion_order() {
        let store = MemoryStore::new();
        store.upsert_rating(Rating::new(3, 30, 1.0)).await.unwrap();
        store.upsert_rating(Rating::new(1, 10, 1.0)).await.unwrap();

        let users: Vec<UserId> = store
            .all_ratings()
            .await
            .unwrap()
            .iter()
            .map(|r| r.user_id)
            .collect();
        assert_eq!(users, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_for_user_orders_by_rank_and_joins_names() {
        let store = MemoryStore::new();
        store.upsert_item(Item::new(10, "Alien")).await.unwrap();
        store.upsert_item(Item::new(20, "Heat")).await.unwrap();

        store
            .replace_all(vec![rec(1, 20, 1, 3.0), rec(1, 10, 0, 4.0)])
            .await
            .unwrap();

        let list = store.for_user(1).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].item_id, 10);
        assert_eq!(list[0].name, "Alien");
        assert_eq!(list[1].item_id, 20);
    }

    #[tokio::test]
    async fn test_for_unknown_user_is_empty() {
        let store = MemoryStore::new();
        assert!(store.for_user(404).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_item_name_is_empty_string() {
        let store = MemoryStore::new();
        store.replace_all(vec![rec(1, 99, 0, 1.0)]).await.unwrap();

        let list = store.for_user(1).await.unwrap();
        assert_eq!(list[0].name, "");
    }

    #[tokio::test]
    async fn test_replace_all_discards_previous_set() {
        let store = MemoryStore::new();
        store
            .replace_all(vec![rec(1, 10, 0, 1.0), rec(2, 10, 0, 1.0)])
            .await
            .unwrap();
        store.replace_all(vec![rec(2, 20, 0, 2.0)]).await.unwrap();

        assert!(store.for_user(1).await.unwrap().is_empty());
        assert_eq!(store.recommendation_count().await, 1);
        assert_eq!(store.all_recommendations().await[0].item_id, 20);
    }
}
