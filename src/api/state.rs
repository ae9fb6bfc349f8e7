use std::sync::Arc;

use crate::{
    db::{ItemCatalog, RatingSource, RatingWriter, RecommendationStore},
    models::Hyperparameters,
    services::Recalculator,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recalculator: Arc<Recalculator>,
    pub recommendations: Arc<dyn RecommendationStore>,
    pub rating_writer: Arc<dyn RatingWriter>,
    pub catalog: Arc<dyn ItemCatalog>,
}

impl AppState {
    /// State whose every boundary is served by the one `store`
    pub fn from_store<S>(store: S, defaults: Hyperparameters) -> Self
    where
        S: RatingSource + RatingWriter + ItemCatalog + RecommendationStore + 'static,
    {
        let store = Arc::new(store);
        let recalculator = Recalculator::new(store.clone(), store.clone(), defaults);
        Self {
            recalculator: Arc::new(recalculator),
            recommendations: store.clone(),
            rating_writer: store.clone(),
            catalog: store,
        }
    }
}
