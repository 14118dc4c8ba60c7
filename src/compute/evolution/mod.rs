//! Evolutionary search over clustering algorithms and hyperparameters.
//!
//! # Overview
//!
//! The search system consists of:
//!
//! - **Candidates** (`candidate`): identified, configured models
//! - **Genome Operations** (`genome`): random sampling, crossover splicing,
//!   and mutation of parameter mappings
//! - **Fitness** (`fitness`): fit-and-score with failure isolation, ranking
//! - **Search** (`search`): the genetic operators and the generational loop
//!
//! # Example
//!
//! ```rust,no_run
//! use cluster_evolve::schema::{Dataset, EvolutionConfig, SearchSpace};
//! use cluster_evolve::compute::evolution::EvolutionEngine;
//!
//! let data = Dataset::load("data.csv").unwrap();
//! let config = EvolutionConfig {
//!     cutoff_score: 0.8,
//!     ..Default::default()
//! };
//!
//! let mut engine = EvolutionEngine::new(config, SearchSpace::default()).unwrap();
//! let result = engine.run_with_callback(&data, |progress| {
//!     println!("Generation {}: top score = {:.3}",
//!         progress.generation, progress.generation_best);
//! });
//!
//! if let Some(best) = result.outcome.best() {
//!     println!("Best: {} {} ({:.3})", best.algorithm, best.params, best.score);
//! }
//! ```

mod candidate;
mod fitness;
mod genome;
mod search;

pub use candidate::{Candidate, CandidateFactory, CandidateId};
pub use fitness::{FAILURE_SCORE, FitnessError, FitnessEvaluator, Ranking, Scored};
pub use genome::{SearchRng, splice_params};
pub use search::{
    EvolutionEngine, cluster_fitness, crossover, evolution, init_population, mutation,
    population_selection,
};
