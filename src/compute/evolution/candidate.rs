//! Candidate representation: an identified, configured clustering model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compute::models::{AlgorithmKind, ClusterModel};
use crate::schema::{CandidateSnapshot, ParamMap};

/// Unique candidate handle. Two candidates with identical configurations
/// still have distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(pub u64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A configured clustering model under evaluation.
///
/// The parameter mapping lives in the model itself, so it is always the full
/// native mapping the model will be fitted with. A changed configuration
/// always produces a new candidate.
#[derive(Debug)]
pub struct Candidate {
    /// Unique identifier.
    pub id: CandidateId,
    /// Configured model.
    pub model: Box<dyn ClusterModel>,
    /// Generation created.
    pub generation: usize,
    /// Parent IDs.
    pub parents: Vec<CandidateId>,
}

impl Candidate {
    pub fn algorithm(&self) -> AlgorithmKind {
        self.model.kind()
    }

    /// Full native parameter mapping.
    pub fn params(&self) -> &ParamMap {
        self.model.params()
    }

    /// Convert to snapshot for serialization.
    pub fn to_snapshot(&self, score: f64) -> CandidateSnapshot {
        CandidateSnapshot {
            id: self.id.0,
            algorithm: self.algorithm(),
            params: self.params().clone(),
            score,
            generation: self.generation,
            parents: self.parents.iter().map(|p| p.0).collect(),
        }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Candidate {}

/// Builds candidates with fresh ids, stamped with the current generation.
#[derive(Debug, Default)]
pub struct CandidateFactory {
    next_id: u64,
    generation: usize,
}

impl CandidateFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Stamp subsequent candidates with `generation`.
    pub fn set_generation(&mut self, generation: usize) {
        self.generation = generation;
    }

    /// Instantiate `algorithm` through the registry and apply `params`.
    pub fn spawn(
        &mut self,
        algorithm: AlgorithmKind,
        params: &ParamMap,
        parents: Vec<CandidateId>,
    ) -> Candidate {
        let mut model = algorithm.instantiate();
        model.set_params(params);

        let id = CandidateId(self.next_id);
        self.next_id += 1;

        Candidate {
            id,
            model,
            generation: self.generation,
            parents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParamValue;

    #[test]
    fn test_identity_not_value() {
        let mut factory = CandidateFactory::new();
        let params: ParamMap = [("n_clusters", ParamValue::Int(3))].into_iter().collect();
        let a = factory.spawn(AlgorithmKind::KMeans, &params, Vec::new());
        let b = factory.spawn(AlgorithmKind::KMeans, &params, Vec::new());

        assert_eq!(a.params(), b.params());
        assert_ne!(a, b);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_spawn_applies_params() {
        let mut factory = CandidateFactory::new();
        assert_eq!(factory.generation(), 0);
        factory.set_generation(4);
        assert_eq!(factory.generation(), 4);
        let params: ParamMap = [("eps", ParamValue::Float(0.3))].into_iter().collect();
        let c = factory.spawn(AlgorithmKind::Dbscan, &params, vec![CandidateId(1)]);

        assert_eq!(c.algorithm(), AlgorithmKind::Dbscan);
        assert_eq!(c.params().get("eps"), Some(&ParamValue::Float(0.3)));
        assert_eq!(c.params().get("min_samples"), Some(&ParamValue::Int(5)));

        let snapshot = c.to_snapshot(0.5);
        assert_eq!(snapshot.generation, 4);
        assert_eq!(snapshot.parents, vec![1]);
        assert_eq!(snapshot.algorithm, AlgorithmKind::Dbscan);
    }
}
