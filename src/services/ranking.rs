use std::cmp::Ordering;

use ndarray::Array2;

use crate::models::Recommendation;

use super::matrix::RatingMatrix;

/// Per-user top-N lists ready to persist
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    pub recommendations: Vec<Recommendation>,
    /// Selected scores that were NaN or infinite and stored as 0.0
    pub clamped: usize,
}

/// Replaces NaN and infinities with 0.0
pub fn sanitize_score(score: f64) -> f64 {
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// Descending by score under IEEE total order
fn by_score_desc(a: &(usize, f64), b: &(usize, f64)) -> Ordering {
    b.1.total_cmp(&a.1)
}

/// Picks the `top_n` best unrated items for every user in `matrix`
///
/// Candidates are the cells with no observed rating. They are stable-sorted
/// by predicted score, so equal scores keep ascending column order. Non-finite
/// scores are clamped after selection.
pub fn rank_top_n(matrix: &RatingMatrix, predictions: &Array2<f64>, top_n: usize) -> Ranking {
    let mut ranking = Ranking::default();

    for (row, user_id) in matrix.users.ids().iter().copied().enumerate() {
        let mut candidates: Vec<(usize, f64)> = predictions
            .row(row)
            .iter()
            .copied()
            .enumerate()
            .filter(|&(col, _)| !matrix.observed[[row, col]])
            .collect();

        candidates.sort_by(by_score_desc);
        candidates.truncate(top_n);

        for (position, (col, score)) in candidates.into_iter().enumerate() {
            let Ok(rank) = i32::try_from(position) else {
                break;
            };
            let Some(item_id) = matrix.items.id_at(col) else {
                continue;
            };

            let predicted_rating = sanitize_score(score);
            if predicted_rating != score {
                tracing::warn!(
                    user_id,
                    item_id,
                    score,
                    "Non-finite predicted score, storing 0.0"
                );
                ranking.clamped += 1;
            }

            ranking.recommendations.push(Recommendation {
                user_id,
                item_id,
                rank,
                predicted_rating,
            });
        }
    }

    ranking
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rating;
    use crate::services::matrix::build_rating_matrix;
    use ndarray::array;

    fn matrix() -> RatingMatrix {
        // users 1, 2; items 10, 20, 30, 40
        build_rating_matrix(&[
            Rating::new(1, 10, 5.0),
            Rating::new(1, 20, 3.0),
            Rating::new(2, 30, 4.0),
            Rating::new(2, 40, 1.0),
        ])
    }

    fn items_for(ranking: &Ranking, user_id: i64) -> Vec<i64> {
        ranking
            .recommendations
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.item_id)
            .collect()
    }

    #[test]
    fn test_sanitize_score() {
        assert_eq!(sanitize_score(3.5), 3.5);
        assert_eq!(sanitize_score(f64::NAN), 0.0);
        assert_eq!(sanitize_score(f64::INFINITY), 0.0);
        assert_eq!(sanitize_score(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_only_unrated_items_are_candidates() {
        let predictions = array![[9.0, 9.0, 1.0, 2.0], [7.0, 8.0, 9.0, 9.0]];
        let ranking = rank_top_n(&matrix(), &predictions, 10);

        assert_eq!(items_for(&ranking, 1), vec![40, 30]);
        assert_eq!(items_for(&ranking, 2), vec![20, 10]);
        assert_eq!(ranking.clamped, 0);
    }

    #[test]
    fn test_list_truncated_to_top_n_with_ranks() {
        let predictions = array![[0.0, 0.0, 1.0, 2.0], [7.0, 8.0, 0.0, 0.0]];
        let ranking = rank_top_n(&matrix(), &predictions, 1);

        assert_eq!(ranking.recommendations.len(), 2);
        assert_eq!(items_for(&ranking, 1), vec![40]);
        assert_eq!(items_for(&ranking, 2), vec![20]);
        assert!(ranking.recommendations.iter().all(|r| r.rank == 0));
    }

    #[test]
    fn test_ranks_follow_list_position() {
        let predictions = array![[0.0, 0.0, 1.0, 2.0], [7.0, 8.0, 0.0, 0.0]];
        let ranking = rank_top_n(&matrix(), &predictions, 2);

        let ranks: Vec<(i64, i32)> = ranking
            .recommendations
            .iter()
            .map(|r| (r.user_id, r.rank))
            .collect();
        assert_eq!(ranks, vec![(1, 0), (1, 1), (2, 0), (2, 1)]);
    }

    #[test]
    fn test_ties_keep_column_order() {
        let predictions = array![[0.0, 0.0, 2.5, 2.5], [1.0, 1.0, 0.0, 0.0]];
        let ranking = rank_top_n(&matrix(), &predictions, 2);

        assert_eq!(items_for(&ranking, 1), vec![30, 40]);
        assert_eq!(items_for(&ranking, 2), vec![10, 20]);
    }

    #[test]
    fn test_non_finite_scores_are_clamped() {
        let predictions = array![
            [0.0, 0.0, f64::NAN, f64::INFINITY],
            [f64::NEG_INFINITY, 2.0, 0.0, 0.0]
        ];
        let ranking = rank_top_n(&matrix(), &predictions, 2);

        assert!(ranking
            .recommendations
            .iter()
            .all(|r| r.predicted_rating.is_finite()));
        assert_eq!(ranking.clamped, 3);

        let user_two: Vec<(i64, f64)> = ranking
            .recommendations
            .iter()
            .filter(|r| r.user_id == 2)
            .map(|r| (r.item_id, r.predicted_rating))
            .collect();
        assert_eq!(user_two, vec![(20, 2.0), (10, 0.0)]);
    }

    #[test]
    fn test_user_who_rated_everything_gets_nothing() {
        let matrix = build_rating_matrix(&[Rating::new(1, 10, 2.0), Rating::new(1, 20, 3.0)]);
        let predictions = array![[2.0, 3.0]];
        let ranking = rank_top_n(&matrix, &predictions, 5);
        assert!(ranking.recommendations.is_empty());
    }
}
