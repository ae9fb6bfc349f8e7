//! Masked matrix factorization trained with full-batch gradient descent
//!
//! Learns user factors `U` (users x K) and item factors `V` (items x K) such
//! that `U * V^T` approximates the observed ratings. The loss is the mean
//! squared error over observed cells only, with no regularization term.
//! Numeric overflow is not guarded here; the ranking step clamps non-finite
//! scores.

use ndarray::{Array2, Zip};
use rand::Rng;

use super::matrix::RatingMatrix;

/// Epochs between debug loss reports
const LOSS_LOG_INTERVAL: usize = 500;

/// Learned latent factors for one run
#[derive(Debug, Clone)]
pub struct Factors {
    pub users: Array2<f64>,
    pub items: Array2<f64>,
}

impl Factors {
    /// Draws both factor matrices uniformly from `[0, 1)`
    pub fn random<R: Rng>(
        num_users: usize,
        num_items: usize,
        latent_factors: usize,
        rng: &mut R,
    ) -> Self {
        let users = Array2::from_shape_fn((num_users, latent_factors), |_| rng.gen::<f64>());
        let items = Array2::from_shape_fn((num_items, latent_factors), |_| rng.gen::<f64>());
        Self { users, items }
    }

    /// Dense prediction matrix `U * V^T`
    pub fn reconstruct(&self) -> Array2<f64> {
        self.users.dot(&self.items.t())
    }
}

/// Gradient descent settings
#[derive(Debug, Clone, Copy)]
pub struct TrainingParams {
    pub latent_factors: usize,
    pub learning_rate: f64,
    pub epochs: usize,
}

/// `(R - R_hat)` on observed cells, zero elsewhere
fn masked_residual(matrix: &RatingMatrix, predicted: &Array2<f64>) -> Array2<f64> {
    let mut residual = Array2::<f64>::zeros(predicted.raw_dim());
    Zip::from(&mut residual)
        .and(&matrix.values)
        .and(predicted)
        .and(&matrix.observed)
        .for_each(|e, &r, &p, &seen| {
            if seen {
                *e = r - p;
            }
        });
    residual
}

/// Trains factors for `matrix`, starting from a fresh random initialization
///
/// Epochs run strictly in sequence; both gradients of an epoch are computed
/// from the factors at the start of that epoch. With no observed cells the
/// initial factors are returned untouched.
pub fn train<R: Rng>(matrix: &RatingMatrix, params: TrainingParams, rng: &mut R) -> Factors {
    let mut factors = Factors::random(
        matrix.num_users(),
        matrix.num_items(),
        params.latent_factors,
        rng,
    );

    let observed = matrix.observed_count();
    if observed == 0 {
        return factors;
    }

    let scale = 2.0 / observed as f64;

    tracing::info!(
        users = matrix.num_users(),
        items = matrix.num_items(),
        observed,
        latent_factors = params.latent_factors,
        learning_rate = params.learning_rate,
        epochs = params.epochs,
        "Starting factorization training"
    );

    for epoch in 0..params.epochs {
        let predicted = factors.reconstruct();
        let residual = masked_residual(matrix, &predicted);

        let grad_users = residual.dot(&factors.items) * -scale;
        let grad_items = residual.t().dot(&factors.users) * -scale;

        factors.users.scaled_add(-params.learning_rate, &grad_users);
        factors.items.scaled_add(-params.learning_rate, &grad_items);

        if epoch % LOSS_LOG_INTERVAL == 0 {
            let loss = residual.iter().map(|e| e * e).sum::<f64>() / observed as f64;
            tracing::debug!(epoch, loss, "Training progress");
        }
    }

    factors
}
