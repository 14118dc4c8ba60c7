//! Genetic search over clustering algorithms and their hyperparameters.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::compute::models::AlgorithmKind;
use crate::schema::{
    AlgorithmDescriptor, CandidateSnapshot, Dataset, EvolutionConfig, EvolutionConfigError,
    EvolutionHistory, EvolutionOutcome, EvolutionPhase, EvolutionProgress, EvolutionResult,
    EvolutionStats, ParamCatalog, SearchSpace, StopReason,
};

use super::candidate::{Candidate, CandidateFactory, CandidateId};
use super::fitness::{FitnessEvaluator, Ranking};
use super::genome::{SearchRng, splice_params};

/// Mutation lookups that miss the catalog are retried, up to this many
/// attempts per requested mutation.
const MUTATION_ATTEMPTS_PER_REPEAT: usize = 32;

/// Build `count` candidates, each a uniformly chosen algorithm with one
/// uniformly sampled legal value per tuned parameter.
pub fn init_population(
    space: &SearchSpace,
    count: usize,
    rng: &mut SearchRng,
    factory: &mut CandidateFactory,
) -> Vec<Candidate> {
    (0..count)
        .filter_map(|_| rng.random_params(space))
        .map(|(kind, params)| factory.spawn(kind, &params, Vec::new()))
        .collect()
}

/// Fit and score every candidate against `data`, ranked by descending score.
pub fn cluster_fitness(population: Vec<Candidate>, data: &Dataset) -> Ranking {
    FitnessEvaluator::new(data).evaluate(population)
}

/// Keep the top `floor(fraction * len)` of an evaluated ranking.
pub fn population_selection(ranking: Ranking, fraction: f64) -> Ranking {
    ranking.select(fraction)
}

/// Add up to `repeat` offspring, each spliced from two survivors of the same
/// algorithm. An attempt that draws an algorithm with fewer than two
/// survivors adds nothing but still counts.
pub fn crossover(
    mut survivors: Ranking,
    descriptors: &[AlgorithmDescriptor],
    repeat: usize,
    rng: &mut SearchRng,
    factory: &mut CandidateFactory,
) -> Ranking {
    let mut groups: BTreeMap<AlgorithmKind, Vec<usize>> = BTreeMap::new();
    for (i, entry) in survivors.iter().enumerate() {
        groups.entry(entry.candidate.algorithm()).or_default().push(i);
    }

    let mut offspring = Vec::new();
    for _ in 0..repeat {
        let Some((kind, _)) = rng.choose_algorithm(descriptors) else {
            break;
        };
        let group = groups.get(&kind).map_or(&[][..], Vec::as_slice);
        let Some((x, y)) = rng.pick_pair(group.len()) else {
            log::trace!("Crossover miss: fewer than two {} survivors", kind);
            continue;
        };

        let (Some(a), Some(b)) = (survivors.get(group[x]), survivors.get(group[y])) else {
            continue;
        };
        let (a, b) = (&a.candidate, &b.candidate);
        let params = splice_params(a.params(), b.params());
        offspring.push(factory.spawn(kind, &params, vec![a.id, b.id]));
    }

    for child in offspring {
        survivors.push_offspring(child);
    }
    survivors
}

/// Add `repeat` offspring, each a survivor with one parameter resampled from
/// the catalog. Each mutant joins the survivors at once, so later repeats may
/// mutate it again. Lookups that miss the catalog are retried, up to a
/// bounded number of attempts.
pub fn mutation(
    mut survivors: Ranking,
    catalog: &ParamCatalog,
    repeat: usize,
    rng: &mut SearchRng,
    factory: &mut CandidateFactory,
) -> Ranking {
    let mut added = 0;
    let mut attempts = 0;

    while added < repeat && attempts < repeat * MUTATION_ATTEMPTS_PER_REPEAT {
        attempts += 1;
        let Some(i) = rng.pick(survivors.len()) else {
            break;
        };
        let Some(source) = survivors.get(i).map(|e| &e.candidate) else {
            break;
        };

        let kind = source.algorithm();
        let Some((name, params)) = rng.mutate(kind, source.params(), catalog) else {
            continue;
        };
        log::trace!("Mutated {} of candidate {}", name, source.id);
        let child = factory.spawn(kind, &params, vec![source.id]);
        survivors.push_offspring(child);
        added += 1;
    }

    if added < repeat {
        log::debug!(
            "Mutation produced {} of {} offspring after {} attempts",
            added,
            repeat,
            attempts
        );
    }

    survivors
}

/// Run a complete search with the given space and settings.
pub fn evolution(
    space: SearchSpace,
    config: EvolutionConfig,
    data: &Dataset,
) -> Result<EvolutionResult, EvolutionConfigError> {
    let mut engine = EvolutionEngine::new(config, space)?;
    Ok(engine.run(data))
}

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    space: SearchSpace,
    rng: SearchRng,
    factory: CandidateFactory,
    history: EvolutionHistory,
    total_evaluations: u64,
    failed_evaluations: u64,
    best_score: f64,
}

impl EvolutionEngine {
    /// Create a new evolution engine after validating its configuration.
    pub fn new(config: EvolutionConfig, space: SearchSpace) -> Result<Self, EvolutionConfigError> {
        space.validate()?;
        config.validate()?;

        for (algorithm, param) in space.uncatalogued_params() {
            log::warn!(
                "{} parameter '{}' has no catalog values and will not be sampled",
                algorithm,
                param
            );
        }

        let rng = match config.random_seed {
            Some(seed) => SearchRng::new(seed),
            None => SearchRng::random(),
        };

        Ok(Self {
            config,
            space,
            rng,
            factory: CandidateFactory::new(),
            history: EvolutionHistory::default(),
            total_evaluations: 0,
            failed_evaluations: 0,
            best_score: f64::NEG_INFINITY,
        })
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Evaluate a population and record it in the history.
    fn evaluate(&mut self, population: Vec<Candidate>, data: &Dataset) -> Ranking {
        let ranking = cluster_fitness(population, data);

        let top = ranking.top().map_or(f64::NEG_INFINITY, |t| t.score);
        self.best_score = self.best_score.max(top);
        self.total_evaluations += ranking.len() as u64;
        self.failed_evaluations += ranking.failures() as u64;

        self.history.best_score.push(top);
        self.history.avg_score.push(ranking.mean_score());
        self.history.population_size.push(ranking.len());
        self.history.failures.push(ranking.failures());

        ranking
    }

    /// Select, breed and re-evaluate one generation.
    fn step_generation(&mut self, ranking: Ranking, generation: usize, data: &Dataset) -> Ranking {
        self.factory.set_generation(generation);

        let survivors = population_selection(ranking, self.config.selection_fraction);
        let crossed = crossover(
            survivors,
            &self.space.algorithms,
            self.config.crossover_repeat,
            &mut self.rng,
            &mut self.factory,
        );
        let mutated = mutation(
            crossed,
            &self.space.values,
            self.config.mutation_repeat,
            &mut self.rng,
            &mut self.factory,
        );

        self.evaluate(mutated.into_candidates(), data)
    }

    fn progress(&self, ranking: &Ranking, generation: usize, phase: EvolutionPhase) -> EvolutionProgress {
        let top = ranking.top();
        EvolutionProgress {
            generation,
            max_generations: self.config.max_generations,
            phase,
            generation_best: top.map_or(f64::NEG_INFINITY, |t| t.score),
            best_score: self.best_score,
            avg_score: ranking.mean_score(),
            population_size: ranking.len(),
            failures: ranking.failures(),
            best_candidate: top.map(|t| t.candidate.to_snapshot(t.score)),
        }
    }

    fn finish(
        &self,
        outcome: EvolutionOutcome,
        generations: usize,
        stop_reason: StopReason,
        start: Instant,
    ) -> EvolutionResult {
        EvolutionResult {
            outcome,
            stats: EvolutionStats {
                generations,
                total_evaluations: self.total_evaluations,
                failed_evaluations: self.failed_evaluations,
                best_score: self.best_score,
                elapsed_seconds: start.elapsed().as_secs_f64(),
                stop_reason,
            },
            history: self.history.clone(),
        }
    }

    /// Run the search with a progress callback, invoked after every
    /// population evaluation.
    pub fn run_with_callback<F>(&mut self, data: &Dataset, mut callback: F) -> EvolutionResult
    where
        F: FnMut(&EvolutionProgress),
    {
        let start = Instant::now();
        self.history = EvolutionHistory::default();
        self.total_evaluations = 0;
        self.failed_evaluations = 0;
        self.best_score = f64::NEG_INFINITY;
        self.factory.set_generation(0);

        let cutoff = self.config.cutoff_score;
        let population = init_population(
            &self.space,
            self.config.population_size,
            &mut self.rng,
            &mut self.factory,
        );
        let mut ranking = self.evaluate(population, data);

        if let Some(top) = ranking.top()
            && top.score >= cutoff
        {
            log::info!(
                "Initial population reached cutoff: {} {}, score {:.4}",
                top.candidate.algorithm(),
                top.candidate.params(),
                top.score
            );
            callback(&self.progress(&ranking, 0, EvolutionPhase::Converged));
            let outcome = EvolutionOutcome::Converged {
                best: top.candidate.to_snapshot(top.score),
                score: top.score,
                generation: 0,
            };
            return self.finish(outcome, 0, StopReason::TargetReached, start);
        }
        callback(&self.progress(&ranking, 0, EvolutionPhase::Initializing));

        // Top of each generation, keyed by candidate identity
        let mut generation_tops: HashMap<CandidateId, CandidateSnapshot> = HashMap::new();
        let mut generation = 0;

        let stop_reason = loop {
            if generation >= self.config.max_generations {
                break StopReason::MaxGenerations;
            }
            if (self.config.selection_fraction * ranking.len() as f64).floor() < 1.0 {
                log::warn!(
                    "Selection keeps no candidates from a population of {}",
                    ranking.len()
                );
                if generation_tops.is_empty()
                    && let Some(top) = ranking.top()
                {
                    generation_tops.insert(top.candidate.id, top.candidate.to_snapshot(top.score));
                }
                callback(&self.progress(&ranking, generation, EvolutionPhase::Collapsed));
                break StopReason::PopulationCollapsed;
            }

            generation += 1;
            ranking = self.step_generation(ranking, generation, data);

            let Some(top) = ranking.top() else {
                break StopReason::PopulationCollapsed;
            };
            log::info!(
                "Generation {}: top model {} {}, score {:.4}",
                generation,
                top.candidate.algorithm(),
                top.candidate.params(),
                top.score
            );
            generation_tops.insert(top.candidate.id, top.candidate.to_snapshot(top.score));

            if top.score >= cutoff {
                log::info!("Cutoff {} reached at generation {}", cutoff, generation);
                callback(&self.progress(&ranking, generation, EvolutionPhase::Converged));
                let outcome = EvolutionOutcome::Converged {
                    best: top.candidate.to_snapshot(top.score),
                    score: top.score,
                    generation,
                };
                return self.finish(outcome, generation, StopReason::TargetReached, start);
            }

            let phase = if generation >= self.config.max_generations {
                EvolutionPhase::Exhausted
            } else {
                EvolutionPhase::Evolving
            };
            callback(&self.progress(&ranking, generation, phase));
        };

        if stop_reason == StopReason::MaxGenerations {
            log::info!(
                "Reached {} generations without meeting cutoff {}",
                generation,
                cutoff
            );
        }

        let mut top: Vec<CandidateSnapshot> = generation_tops.into_values().collect();
        top.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        top.truncate(self.config.report_size);

        self.finish(EvolutionOutcome::Exhausted { top }, generation, stop_reason, start)
    }

    /// Run the search (blocking).
    pub fn run(&mut self, data: &Dataset) -> EvolutionResult {
        self.run_with_callback(data, |_| {})
    }
}
