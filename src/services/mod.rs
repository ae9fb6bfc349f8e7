pub mod factorization;
pub mod matrix;
pub mod ranking;
pub mod ratings;
pub mod recalculation;

pub use recalculation::{compute_recommendations, Recalculator};
