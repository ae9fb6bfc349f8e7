use std::collections::HashMap;

use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use crate::{
    error::AppResult,
    models::{Item, ItemId, Rating, RatingChange, Recommendation, ScoredItem, UserId},
};

use super::{ItemCatalog, RatingSource, RatingWriter, RecommendationStore};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Stores backed by the `ratings`, `items` and `recommendations` tables
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct ScoredItemRow {
    item_id: i64,
    name: String,
    predicted_rating: f64,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RatingSource for PgStore {
    async fn all_ratings(&self) -> AppResult<Vec<Rating>> {
        let rows = sqlx::query_as::<_, (i64, i64, f64, chrono::DateTime<chrono::Utc>)>(
            r#"
            SELECT user_id, item_id, rating::float8, created_at
            FROM ratings
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, item_id, rating, timestamp)| Rating {
                user_id,
                item_id,
                rating,
                timestamp,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl RatingWriter for PgStore {
    async fn upsert_rating(&self, rating: Rating) -> AppResult<RatingChange> {
        // xmax is zero only for a freshly inserted tuple
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO ratings (user_id, item_id, rating, created_at)
            VALUES ($1, $2, $3::float8::numeric, $4)
            ON CONFLICT (user_id, item_id)
            DO UPDATE SET rating = EXCLUDED.rating, created_at = EXCLUDED.created_at
            RETURNING (xmax = 0)
            "#,
        )
        .bind(rating.user_id)
        .bind(rating.item_id)
        .bind(rating.rating)
        .bind(rating.timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(if inserted {
            RatingChange::Created
        } else {
            RatingChange::Updated
        })
    }
}

#[async_trait::async_trait]
impl ItemCatalog for PgStore {
    async fn upsert_item(&self, item: Item) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO items (id, name) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(item.id)
        .bind(item.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn item_names(&self, item_ids: &[ItemId]) -> AppResult<HashMap<ItemId, String>> {
        if item_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, name FROM items WHERE id = ANY($1)",
        )
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

#[async_trait::async_trait]
impl RecommendationStore for PgStore {
    async fn replace_all(&self, recommendations: Vec<Recommendation>) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recommendations")
            .execute(&mut *tx)
            .await?;

        if !recommendations.is_empty() {
            let user_ids: Vec<i64> = recommendations.iter().map(|r| r.user_id).collect();
            let item_ids: Vec<i64> = recommendations.iter().map(|r| r.item_id).collect();
            let ranks: Vec<i32> = recommendations.iter().map(|r| r.rank).collect();
            let scores: Vec<f64> = recommendations.iter().map(|r| r.predicted_rating).collect();

            sqlx::query(
                r#"
                INSERT INTO recommendations (user_id, item_id, rank, predicted_rating)
                SELECT * FROM UNNEST($1::int8[], $2::int8[], $3::int4[], $4::float8[])
                "#,
            )
            .bind(&user_ids)
            .bind(&item_ids)
            .bind(&ranks)
            .bind(&scores)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(rows = recommendations.len(), "Recommendation table replaced");
        Ok(())
    }

    async fn for_user(&self, user_id: UserId) -> AppResult<Vec<ScoredItem>> {
        let rows = sqlx::query_as::<_, ScoredItemRow>(
            r#"
            SELECT r.item_id, COALESCE(i.name, '') AS name, r.predicted_rating
            FROM recommendations r
            LEFT JOIN items i ON i.id = r.item_id
            WHERE r.user_id = $1
            ORDER BY r.rank
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ScoredItem {
                item_id: row.item_id,
                name: row.name,
                score: row.predicted_rating,
            })
            .collect())
    }
}
