use crate::{
    db::RatingWriter,
    error::{AppError, AppResult},
    models::{Rating, RatingChange, RatingChanged, RecalculationReport},
};

use super::recalculation::Recalculator;

/// Stores a rating and refreshes recommendations before returning
///
/// This is the write-side observer: the rating only counts as saved once the
/// recommendation table reflects it. Ratings must be positive and finite.
pub async fn save_rating(
    writer: &dyn RatingWriter,
    recalculator: &Recalculator,
    rating: Rating,
) -> AppResult<(RatingChange, RecalculationReport)> {
    if !rating.rating.is_finite() || rating.rating <= 0.0 {
        return Err(AppError::InvalidInput(format!(
            "rating must be a positive number, got {}",
            rating.rating
        )));
    }

    let (user_id, item_id) = (rating.user_id, rating.item_id);
    let change = writer.upsert_rating(rating).await?;

    let event = RatingChanged {
        user_id,
        item_id,
        created: change == RatingChange::Created,
    };

    let report = recalculator.on_rating_changed(&event).await?;
    Ok((change, report))
}
