//! Fitness evaluation and ranking.
//!
//! Each candidate is fitted against the dataset and scored with the
//! silhouette coefficient. Any failure scores -1 and never aborts the rest of
//! the evaluation.

use crate::compute::metrics::{ScoreError, silhouette_score};
use crate::compute::models::ModelError;
use crate::schema::Dataset;

use super::candidate::Candidate;

/// Score assigned to candidates whose fit or scoring fails.
pub const FAILURE_SCORE: f64 = -1.0;

/// Why a candidate could not be scored.
#[derive(Debug, thiserror::Error)]
pub enum FitnessError {
    #[error("fit failed: {0}")]
    Fit(#[from] ModelError),
    #[error("scoring failed: {0}")]
    Score(#[from] ScoreError),
}

/// Fits candidates against a shared, read-only dataset.
pub struct FitnessEvaluator<'a> {
    data: &'a Dataset,
}

impl<'a> FitnessEvaluator<'a> {
    /// Create a new fitness evaluator.
    pub fn new(data: &'a Dataset) -> Self {
        Self { data }
    }

    /// Fit one candidate and score its labels.
    pub fn score(&self, candidate: &mut Candidate) -> Result<f64, FitnessError> {
        candidate.model.fit(self.data)?;
        let labels = candidate.model.labels().ok_or(ModelError::NotFitted)?;
        Ok(silhouette_score(self.data, labels)?)
    }

    /// Evaluate a population and rank it by descending score.
    pub fn evaluate(&self, population: Vec<Candidate>) -> Ranking {
        let mut failures = 0;
        let entries = population
            .into_iter()
            .map(|mut candidate| {
                let score = match self.score(&mut candidate) {
                    Ok(score) => score,
                    Err(e) => {
                        log::debug!(
                            "Candidate {} ({} {}) failed: {}",
                            candidate.id,
                            candidate.algorithm(),
                            candidate.params(),
                            e
                        );
                        failures += 1;
                        FAILURE_SCORE
                    }
                };
                Scored { candidate, score }
            })
            .collect();

        let mut ranking = Ranking::from_entries(entries);
        ranking.failures = failures;
        ranking
    }
}

/// A candidate paired with its score.
#[derive(Debug)]
pub struct Scored {
    pub candidate: Candidate,
    pub score: f64,
}

/// Candidates ordered by descending score, ties kept in insertion order.
///
/// Entries appended after ranking (offspring awaiting evaluation) sit at the
/// end with a placeholder score.
#[derive(Debug, Default)]
pub struct Ranking {
    entries: Vec<Scored>,
    failures: usize,
}

impl Ranking {
    /// Stable-sort entries by descending score.
    pub fn from_entries(mut entries: Vec<Scored>) -> Self {
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self {
            entries,
            failures: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest-scoring entry.
    pub fn top(&self) -> Option<&Scored> {
        self.entries.first()
    }

    pub fn get(&self, index: usize) -> Option<&Scored> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scored> {
        self.entries.iter()
    }

    /// Candidates that failed during the evaluation that built this ranking.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Mean score over all entries.
    pub fn mean_score(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.iter().map(|e| e.score).sum::<f64>() / self.entries.len() as f64
    }

    /// Keep the top `floor(fraction * len)` entries, preserving order.
    pub fn select(mut self, fraction: f64) -> Self {
        let keep = (fraction * self.entries.len() as f64).floor() as usize;
        self.entries.truncate(keep);
        self
    }

    /// Append an unevaluated candidate with a placeholder score of 0.
    pub fn push_offspring(&mut self, candidate: Candidate) {
        self.entries.push(Scored {
            candidate,
            score: 0.0,
        });
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.entries.into_iter().map(|e| e.candidate).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::CandidateFactory;
    use crate::compute::models::AlgorithmKind;
    use crate::schema::{ParamMap, ParamValue};
    use proptest::prelude::*;

    fn blobs() -> Dataset {
        Dataset::gaussian_blobs(&[vec![0.0, 0.0], vec![10.0, 10.0]], 10, 0.5, 2).unwrap()
    }

    fn kmeans(factory: &mut CandidateFactory, n_clusters: i64) -> Candidate {
        let params: ParamMap = [("n_clusters", ParamValue::Int(n_clusters))]
            .into_iter()
            .collect();
        factory.spawn(AlgorithmKind::KMeans, &params, Vec::new())
    }

    fn ranking_of(scores: &[f64]) -> Ranking {
        let mut factory = CandidateFactory::new();
        let entries = scores
            .iter()
            .map(|&score| Scored {
                candidate: factory.spawn(AlgorithmKind::KMeans, &ParamMap::new(), Vec::new()),
                score,
            })
            .collect();
        Ranking::from_entries(entries)
    }

    #[test]
    fn test_failure_scores_minus_one() {
        let data = blobs();
        let mut factory = CandidateFactory::new();
        let population = vec![kmeans(&mut factory, 2), kmeans(&mut factory, 50)];

        let ranking = FitnessEvaluator::new(&data).evaluate(population);
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking.failures(), 1);

        let scores: Vec<f64> = ranking.iter().map(|e| e.score).collect();
        assert!(scores[0] > 0.8);
        assert_eq!(scores[1], FAILURE_SCORE);
        assert_eq!(ranking.top().unwrap().candidate.id.0, 0);
    }

    #[test]
    fn test_single_label_scores_minus_one() {
        // One cluster cannot be scored
        let data = blobs();
        let mut factory = CandidateFactory::new();
        let ranking = FitnessEvaluator::new(&data).evaluate(vec![kmeans(&mut factory, 1)]);
        assert_eq!(ranking.top().unwrap().score, FAILURE_SCORE);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let ranking = ranking_of(&[0.1, 0.5, 0.1, 0.5]);
        let ids: Vec<u64> = ranking.iter().map(|e| e.candidate.id.0).collect();
        assert_eq!(ids, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_select_below_one_is_empty() {
        let ranking = ranking_of(&[0.3]);
        assert!(ranking.select(0.7).is_empty());
    }

    proptest! {
        #[test]
        fn prop_select_keeps_floor_prefix(
            scores in prop::collection::vec(-1.0f64..1.0, 0..30),
            fraction in 0.01f64..=1.0,
        ) {
            let ranking = ranking_of(&scores);
            let before: Vec<u64> = ranking.iter().map(|e| e.candidate.id.0).collect();
            let expected = (fraction * scores.len() as f64).floor() as usize;

            let selected = ranking.select(fraction);
            prop_assert_eq!(selected.len(), expected);
            let after: Vec<u64> = selected.iter().map(|e| e.candidate.id.0).collect();
            prop_assert_eq!(&after[..], &before[..expected]);

            let again: Vec<u64> = selected.select(1.0).iter().map(|e| e.candidate.id.0).collect();
            prop_assert_eq!(again, after);
        }
    }
}
