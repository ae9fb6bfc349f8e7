use std::collections::HashMap;

use ndarray::Array2;

use crate::models::{ItemId, Rating, UserId};

/// Bijection between external ids and dense matrix positions
///
/// Positions are handed out in first-observed order and are only meaningful
/// for the run that built them.
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    ids: Vec<i64>,
    positions: HashMap<i64, usize>,
}

impl IdIndex {
    /// Returns the position of `id`, assigning the next free one if unseen
    pub fn insert(&mut self, id: i64) -> usize {
        if let Some(&pos) = self.positions.get(&id) {
            return pos;
        }
        let pos = self.ids.len();
        self.ids.push(id);
        self.positions.insert(id, pos);
        pos
    }

    pub fn position(&self, id: i64) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn id_at(&self, position: usize) -> Option<i64> {
        self.ids.get(position).copied()
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Dense view of the rating table for one recalculation
#[derive(Debug, Clone)]
pub struct RatingMatrix {
    /// Observed ratings, 0.0 where nothing was observed
    pub values: Array2<f64>,
    /// True exactly where a rating triple was observed
    pub observed: Array2<bool>,
    pub users: IdIndex,
    pub items: IdIndex,
}

impl RatingMatrix {
    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// No ratings at all: there is nothing to train on
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() || self.items.is_empty()
    }

    pub fn observed_count(&self) -> usize {
        self.observed.iter().filter(|&&seen| seen).count()
    }

    pub fn is_observed(&self, user: UserId, item: ItemId) -> bool {
        match (self.users.position(user), self.items.position(item)) {
            (Some(row), Some(col)) => self.observed[[row, col]],
            _ => false,
        }
    }

    /// Mean squared error of `predictions` over the observed cells only
    pub fn masked_mse(&self, predictions: &Array2<f64>) -> Option<f64> {
        let count = self.observed_count();
        if count == 0 {
            return None;
        }

        let mut sum = 0.0;
        ndarray::Zip::from(&self.values)
            .and(predictions)
            .and(&self.observed)
            .for_each(|&r, &p, &seen| {
                if seen {
                    sum += (r - p).powi(2);
                }
            });
        Some(sum / count as f64)
    }
}

/// Builds the dense rating matrix and its index maps
///
/// Users and items are indexed in the order they first appear. The
/// observation mask comes from the triples themselves rather than from the
/// stored value, so "rated" never depends on a rating being non-zero. If a
/// pair appears more than once the last rating wins.
pub fn build_rating_matrix(ratings: &[Rating]) -> RatingMatrix {
    let mut users = IdIndex::default();
    let mut items = IdIndex::default();

    let cells: Vec<(usize, usize, f64)> = ratings
        .iter()
        .map(|r| (users.insert(r.user_id), items.insert(r.item_id), r.rating))
        .collect();

    let shape = (users.len(), items.len());
    let mut values = Array2::<f64>::zeros(shape);
    let mut observed = Array2::<bool>::from_elem(shape, false);

    for (row, col, rating) in cells {
        values[[row, col]] = rating;
        observed[[row, col]] = true;
    }

    RatingMatrix {
        values,
        observed,
        users,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Rating> {
        vec![
            Rating::new(1, 10, 9.0),
            Rating::new(1, 20, 2.0),
            Rating::new(2, 10, 8.5),
            Rating::new(2, 30, 7.0),
            Rating::new(3, 20, 6.0),
        ]
    }

    #[test]
    fn test_builds_dimensions_from_distinct_ids() {
        let matrix = build_rating_matrix(&sample());
        assert_eq!(matrix.num_users(), 3);
        assert_eq!(matrix.num_items(), 3);
        assert_eq!(matrix.values.dim(), (3, 3));
        assert_eq!(matrix.observed_count(), 5);
    }

    #[test]
    fn test_indices_follow_first_observed_order() {
        let matrix = build_rating_matrix(&sample());
        assert_eq!(matrix.users.ids(), &[1, 2, 3]);
        assert_eq!(matrix.items.ids(), &[10, 20, 30]);
        assert_eq!(matrix.items.position(30), Some(2));
        assert_eq!(matrix.items.id_at(1), Some(20));
    }

    #[test]
    fn test_values_written_at_mapped_cells() {
        let matrix = build_rating_matrix(&sample());
        let row = matrix.users.position(2).unwrap();
        let col = matrix.items.position(30).unwrap();
        assert_eq!(matrix.values[[row, col]], 7.0);
        assert!(matrix.observed[[row, col]]);

        let unrated = matrix.items.position(20).unwrap();
        assert_eq!(matrix.values[[row, unrated]], 0.0);
        assert!(!matrix.observed[[row, unrated]]);
    }

    #[test]
    fn test_empty_input_is_empty_matrix() {
        let matrix = build_rating_matrix(&[]);
        assert!(matrix.is_empty());
        assert_eq!(matrix.observed_count(), 0);
        assert_eq!(matrix.masked_mse(&Array2::zeros((0, 0))), None);
    }

    #[test]
    fn test_zero_rating_still_counts_as_observed() {
        let matrix = build_rating_matrix(&[Rating::new(1, 10, 0.0), Rating::new(1, 20, 3.0)]);
        assert!(matrix.is_observed(1, 10));
        assert!(!matrix.is_observed(1, 30));
        assert!(!matrix.is_observed(2, 10));
    }

    #[test]
    fn test_duplicate_pair_keeps_last_rating() {
        let matrix = build_rating_matrix(&[Rating::new(1, 10, 2.0), Rating::new(1, 10, 5.0)]);
        assert_eq!(matrix.values[[0, 0]], 5.0);
        assert_eq!(matrix.observed_count(), 1);
    }

    #[test]
    fn test_masked_mse_ignores_unobserved_cells() {
        let matrix = build_rating_matrix(&[Rating::new(1, 10, 4.0), Rating::new(2, 20, 2.0)]);
        // Off-diagonal cells are unobserved and carry large errors.
        let predictions = ndarray::array![[3.0, 100.0], [-100.0, 2.0]];
        assert_eq!(matrix.masked_mse(&predictions), Some(0.5));
    }
}
