//! Cluster Evolve - Genetic search over clustering algorithms and their
//! hyperparameters.
//!
//! This crate evolves a population of configured clustering models (KMeans,
//! KMedoids, DBSCAN, HDBSCAN), scoring each with the silhouette coefficient
//! and improving the population through selection, crossover and mutation
//! until a cutoff score is met or the generation cap is reached.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Search space, dataset, configuration and result types
//! - `compute`: Numerical computation (models, silhouette, evolution)
//!
//! # Example
//!
//! ```rust,no_run
//! use cluster_evolve::{
//!     schema::{Dataset, EvolutionConfig, EvolutionOutcome, SearchSpace},
//!     compute::evolution::evolution,
//! };
//!
//! let data = Dataset::gaussian_blobs(&[vec![0.0, 0.0], vec![5.0, 5.0]], 50, 0.5, 7).unwrap();
//! let config = EvolutionConfig {
//!     cutoff_score: 0.75,
//!     random_seed: Some(7),
//!     ..Default::default()
//! };
//!
//! let result = evolution(SearchSpace::default(), config, &data).unwrap();
//! match result.outcome {
//!     EvolutionOutcome::Converged { best, score, generation } => {
//!         println!("{} {} scored {:.3} at generation {}", best.algorithm, best.params, score, generation);
//!     }
//!     EvolutionOutcome::Exhausted { top } => {
//!         println!("Cutoff not reached; {} best candidates reported", top.len());
//!     }
//! }
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{EvolutionEngine, evolution};
pub use schema::{Dataset, EvolutionConfig, EvolutionResult, SearchConfig, SearchSpace};
