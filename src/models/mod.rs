use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External identifier of a user in the rating store
pub type UserId = i64;

/// External identifier of an item (movie, show, ...) in the rating store
pub type ItemId = i64;

/// A single observed rating, owned by the external persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, rating: f64) -> Self {
        Self {
            user_id,
            item_id,
            rating,
            timestamp: Utc::now(),
        }
    }
}

/// Item metadata used for display when serving recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
}

impl Item {
    pub fn new(id: ItemId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A persisted top-N entry for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Position in the user's list, starting at 0
    pub rank: i32,
    pub predicted_rating: f64,
}

/// Recommendation as returned to remote callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: ItemId,
    pub name: String,
    pub score: f64,
}

/// Whether a rating write inserted a new row or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingChange {
    Created,
    Updated,
}

/// Notification emitted by the persistence layer after a rating write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingChanged {
    pub user_id: UserId,
    pub item_id: ItemId,
    #[serde(default)]
    pub created: bool,
}

impl RatingChanged {
    pub fn change(&self) -> RatingChange {
        if self.created {
            RatingChange::Created
        } else {
            RatingChange::Updated
        }
    }
}

/// Training and ranking parameters for one recalculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Embedding width K
    pub latent_factors: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    /// Length of each user's recommendation list
    pub top_n: usize,
    /// Seed for factor initialization; `None` draws from OS entropy
    pub seed: Option<u64>,
}

/// Largest accepted embedding width
pub const MAX_LATENT_FACTORS: usize = 1024;

/// Largest accepted number of gradient descent epochs
pub const MAX_EPOCHS: usize = 1_000_000;

/// Largest accepted recommendation list length
pub const MAX_TOP_N: usize = 1000;

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            latent_factors: 5,
            learning_rate: 0.005,
            epochs: 5000,
            top_n: 5,
            seed: None,
        }
    }
}

impl Hyperparameters {
    /// Rejects values the trainer or ranker cannot work with
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_LATENT_FACTORS).contains(&self.latent_factors) {
            return Err(format!(
                "latent_factors must be between 1 and {}, got {}",
                MAX_LATENT_FACTORS, self.latent_factors
            ));
        }
        if self.epochs > MAX_EPOCHS {
            return Err(format!(
                "epochs must be at most {}, got {}",
                MAX_EPOCHS, self.epochs
            ));
        }
        if !(1..=MAX_TOP_N).contains(&self.top_n) {
            return Err(format!(
                "top_n must be between 1 and {}, got {}",
                MAX_TOP_N, self.top_n
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(format!(
                "learning_rate must be a positive finite number, got {}",
                self.learning_rate
            ));
        }
        Ok(())
    }

    /// Applies the fields present in `overrides` on top of these values
    pub fn with_overrides(&self, overrides: &HyperparameterOverrides) -> Self {
        Self {
            latent_factors: overrides.latent_factors.unwrap_or(self.latent_factors),
            learning_rate: overrides.learning_rate.unwrap_or(self.learning_rate),
            epochs: overrides.epochs.unwrap_or(self.epochs),
            top_n: overrides.top_n.unwrap_or(self.top_n),
            seed: overrides.seed.or(self.seed),
        }
    }
}

/// Optional per-run replacements for the configured hyperparameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterOverrides {
    pub latent_factors: Option<usize>,
    pub learning_rate: Option<f64>,
    pub epochs: Option<usize>,
    pub top_n: Option<usize>,
    pub seed: Option<u64>,
}

/// Summary of one completed recalculation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecalculationReport {
    pub users: usize,
    pub items: usize,
    pub ratings: usize,
    pub recommendations: usize,
    /// Non-finite scores replaced with 0.0 before persisting
    pub clamped_scores: usize,
    /// Mean squared error over observed cells after the last epoch
    pub final_loss: Option<f64>,
    pub elapsed_ms: u64,
}
