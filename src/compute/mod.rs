//! Compute module - Clustering models, scoring, and the evolutionary search.

pub mod evolution;
pub mod metrics;
pub mod models;

pub use metrics::{ScoreError, silhouette_score};
pub use models::{AlgorithmKind, ClusterModel, ModelError, NOISE, instantiate_model};
