//! Collaborative-filtering recommendation service
//!
//! Learns latent user and item factors from the rating table, ranks each
//! user's unrated items and serves the resulting top-N lists over HTTP.

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
