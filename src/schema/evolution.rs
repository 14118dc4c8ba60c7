//! Evolution configuration and result types for the clustering search.
//!
//! This module provides the knobs of the genetic search (population size,
//! selection fraction, operator repeats, cutoff score, generation cap) and
//! the serializable progress and result reports it produces.

use serde::{Deserialize, Serialize};

use crate::compute::AlgorithmKind;

use super::{ParamMap, SearchSpace, SearchSpaceError};

/// Tuning knobs for the genetic search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of candidates in the initial population.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Fraction of the ranked population kept each generation, in (0, 1].
    #[serde(default = "default_selection_fraction")]
    pub selection_fraction: f64,
    /// Crossover attempts per generation.
    #[serde(default = "default_crossover_repeat")]
    pub crossover_repeat: usize,
    /// Mutations per generation.
    #[serde(default = "default_mutation_repeat")]
    pub mutation_repeat: usize,
    /// Stop as soon as the top score reaches this value.
    #[serde(default = "default_cutoff_score")]
    pub cutoff_score: f64,
    /// Hard cap on generations after the initial evaluation.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Number of candidates reported when the cap is reached.
    #[serde(default = "default_report_size")]
    pub report_size: usize,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            selection_fraction: default_selection_fraction(),
            crossover_repeat: default_crossover_repeat(),
            mutation_repeat: default_mutation_repeat(),
            cutoff_score: default_cutoff_score(),
            max_generations: default_max_generations(),
            report_size: default_report_size(),
            random_seed: None,
        }
    }
}

fn default_population_size() -> usize {
    15
}
fn default_selection_fraction() -> f64 {
    0.7
}
fn default_crossover_repeat() -> usize {
    3
}
fn default_mutation_repeat() -> usize {
    2
}
fn default_cutoff_score() -> f64 {
    1.0
}
fn default_max_generations() -> usize {
    70
}
fn default_report_size() -> usize {
    10
}

/// Complete search input: what to search over and how.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Algorithms, tuned parameters and legal values.
    #[serde(default)]
    pub space: SearchSpace,
    /// Genetic search settings.
    #[serde(default)]
    pub evolution: EvolutionConfig,
}

// ============================================================================
// Progress and Result Types
// ============================================================================

/// Serializable report of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    /// Unique identifier.
    pub id: u64,
    /// Algorithm the candidate configures.
    pub algorithm: AlgorithmKind,
    /// Full native parameter mapping.
    pub params: ParamMap,
    /// Fitness score (-1 for failed fits).
    pub score: f64,
    /// Generation this candidate was created.
    pub generation: usize,
    /// Parent IDs (two for crossover, one for mutation, none initially).
    pub parents: Vec<u64>,
}

/// Progress update, emitted after every population evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Current generation number (0 = initial population).
    pub generation: usize,
    /// Generation cap.
    pub max_generations: usize,
    /// Current phase of the search.
    pub phase: EvolutionPhase,
    /// Top score this generation.
    pub generation_best: f64,
    /// Best score seen so far.
    pub best_score: f64,
    /// Average score of the current population.
    pub avg_score: f64,
    /// Number of candidates evaluated this generation.
    pub population_size: usize,
    /// Candidates that failed to fit or score this generation.
    pub failures: usize,
    /// Top candidate this generation.
    pub best_candidate: Option<CandidateSnapshot>,
}

/// Current phase of the search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    /// Evaluating the initial population.
    #[default]
    Initializing,
    /// Iterating generations.
    Evolving,
    /// Cutoff score reached.
    Converged,
    /// Generation cap reached.
    Exhausted,
    /// Selection left no survivors.
    Collapsed,
}

/// Score history per evaluated generation (generation 0 included).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EvolutionHistory {
    /// Top score per generation.
    pub best_score: Vec<f64>,
    /// Average score per generation.
    pub avg_score: Vec<f64>,
    /// Population size per generation.
    pub population_size: Vec<usize>,
    /// Failed evaluations per generation.
    pub failures: Vec<usize>,
}

impl EvolutionHistory {
    /// Number of recorded generations.
    pub fn len(&self) -> usize {
        self.best_score.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best_score.is_empty()
    }
}

/// What the search returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum EvolutionOutcome {
    /// A candidate reached the cutoff score.
    Converged {
        best: CandidateSnapshot,
        score: f64,
        generation: usize,
    },
    /// The cutoff was never reached; best generation tops, descending.
    Exhausted { top: Vec<CandidateSnapshot> },
}

impl EvolutionOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, EvolutionOutcome::Converged { .. })
    }

    /// Best reported candidate, if any.
    pub fn best(&self) -> Option<&CandidateSnapshot> {
        match self {
            EvolutionOutcome::Converged { best, .. } => Some(best),
            EvolutionOutcome::Exhausted { top } => top.first(),
        }
    }
}

/// Final result of a search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Converged candidate or top-N report.
    pub outcome: EvolutionOutcome,
    /// Statistics from the run.
    pub stats: EvolutionStats,
    /// Full history for analysis.
    pub history: EvolutionHistory,
}

/// Statistics from a search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations run after the initial evaluation.
    pub generations: usize,
    /// Total fits attempted.
    pub total_evaluations: u64,
    /// Fits that failed and scored -1.
    pub failed_evaluations: u64,
    /// Best score seen.
    pub best_score: f64,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason the search stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the cutoff score.
    TargetReached,
    /// Reached the generation cap.
    MaxGenerations,
    /// Selection kept no candidates.
    PopulationCollapsed,
}

// ============================================================================
// Validation
// ============================================================================

/// Evolution configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionConfigError {
    #[error("Population size must be at least 1")]
    EmptyPopulation,
    #[error("Selection fraction {0} must be in (0, 1]")]
    InvalidSelectionFraction(f64),
    #[error("Cutoff score must be a number")]
    InvalidCutoff,
    #[error("Report size must be at least 1")]
    EmptyReport,
    #[error("Search space validation failed: {0}")]
    SearchSpace(#[from] SearchSpaceError),
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    ///
    /// Cutoff scores outside [-1, 1] are accepted: below -1 converges
    /// immediately, above 1 always runs to the cap.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        if self.population_size == 0 {
            return Err(EvolutionConfigError::EmptyPopulation);
        }

        if !(self.selection_fraction > 0.0 && self.selection_fraction <= 1.0) {
            return Err(EvolutionConfigError::InvalidSelectionFraction(
                self.selection_fraction,
            ));
        }

        if self.cutoff_score.is_nan() {
            return Err(EvolutionConfigError::InvalidCutoff);
        }

        if self.report_size == 0 {
            return Err(EvolutionConfigError::EmptyReport);
        }

        Ok(())
    }
}

impl SearchConfig {
    /// Validate both the search space and the evolution settings.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        self.space.validate()?;
        self.evolution.validate()
    }
}
