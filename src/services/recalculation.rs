use std::sync::Arc;
use std::time::Instant;

use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::Mutex;

use crate::{
    db::{RatingSource, RecommendationStore},
    error::{AppError, AppResult},
    models::{
        HyperparameterOverrides, Hyperparameters, Rating, RatingChanged, RecalculationReport,
        Recommendation,
    },
};

use super::{
    factorization::{train, TrainingParams},
    matrix::build_rating_matrix,
    ranking::rank_top_n,
};

/// Output of one pass of the numeric pipeline
#[derive(Debug, Clone)]
pub struct Computation {
    pub recommendations: Vec<Recommendation>,
    pub report: RecalculationReport,
}

/// Builds the matrix, trains factors and ranks unrated items for every user
///
/// Pure and CPU-bound: nothing survives between calls. An empty rating set
/// yields no recommendations and skips training entirely.
pub fn compute_recommendations(ratings: &[Rating], params: &Hyperparameters) -> Computation {
    let matrix = build_rating_matrix(ratings);

    let mut report = RecalculationReport {
        users: matrix.num_users(),
        items: matrix.num_items(),
        ratings: matrix.observed_count(),
        ..RecalculationReport::default()
    };

    if matrix.is_empty() {
        tracing::info!("No ratings stored, skipping training");
        return Computation {
            recommendations: Vec::new(),
            report,
        };
    }

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let factors = train(
        &matrix,
        TrainingParams {
            latent_factors: params.latent_factors,
            learning_rate: params.learning_rate,
            epochs: params.epochs,
        },
        &mut rng,
    );

    let predictions = factors.reconstruct();
    tracing::trace!(predictions = %predictions, "Reconstructed prediction matrix");

    report.final_loss = matrix.masked_mse(&predictions).filter(|loss| loss.is_finite());

    let ranking = rank_top_n(&matrix, &predictions, params.top_n);
    if ranking.clamped > 0 {
        tracing::warn!(
            clamped = ranking.clamped,
            "Training diverged for some scores; consider a smaller learning rate"
        );
    }

    report.recommendations = ranking.recommendations.len();
    report.clamped_scores = ranking.clamped;

    Computation {
        recommendations: ranking.recommendations,
        report,
    }
}

/// Entry point for both the manual and the rating-event recalculation paths
///
/// Runs are serialized: a trigger that arrives while another run is in flight
/// waits for it and then recomputes from the latest ratings.
pub struct Recalculator {
    ratings: Arc<dyn RatingSource>,
    recommendations: Arc<dyn RecommendationStore>,
    defaults: Hyperparameters,
    run_lock: Mutex<()>,
}

impl Recalculator {
    pub fn new(
        ratings: Arc<dyn RatingSource>,
        recommendations: Arc<dyn RecommendationStore>,
        defaults: Hyperparameters,
    ) -> Self {
        Self {
            ratings,
            recommendations,
            defaults,
            run_lock: Mutex::new(()),
        }
    }

    pub fn defaults(&self) -> &Hyperparameters {
        &self.defaults
    }

    /// Manual path: recompute everything without a preceding rating change
    pub async fn recalculate(
        &self,
        overrides: &HyperparameterOverrides,
    ) -> AppResult<RecalculationReport> {
        let params = self.defaults.with_overrides(overrides);
        params.validate().map_err(AppError::InvalidInput)?;

        tracing::info!("Manual recalculation requested");
        self.run(params).await
    }

    /// Event path: a rating was created or updated and recommendations must
    /// reflect it before the write is acknowledged
    pub async fn on_rating_changed(&self, event: &RatingChanged) -> AppResult<RecalculationReport> {
        tracing::info!(
            user_id = event.user_id,
            item_id = event.item_id,
            change = ?event.change(),
            "Rating changed, recalculating recommendations"
        );
        self.run(self.defaults.clone()).await
    }

    async fn run(&self, params: Hyperparameters) -> AppResult<RecalculationReport> {
        let _guard = self.run_lock.lock().await;
        let start = Instant::now();

        let ratings = self.ratings.all_ratings().await?;

        let computation = tokio::task::spawn_blocking(move || {
            compute_recommendations(&ratings, &params)
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Training task did not complete");
            AppError::Internal("Training task failed".to_string())
        })?;

        let Computation {
            recommendations,
            mut report,
        } = computation;

        self.recommendations.replace_all(recommendations).await?;

        report.elapsed_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            users = report.users,
            items = report.items,
            ratings = report.ratings,
            recommendations = report.recommendations,
            clamped = report.clamped_scores,
            final_loss = ?report.final_loss,
            elapsed_ms = report.elapsed_ms,
            "Recommendations recalculated"
        );

        Ok(report)
    }
}
