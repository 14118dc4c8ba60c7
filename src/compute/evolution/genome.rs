//! Parameter-mapping operations for evolutionary search.
//!
//! Provides random sampling, crossover splicing, and mutation over the
//! parameter mappings that configure candidates.

use rand::prelude::*;

use crate::compute::models::AlgorithmKind;
use crate::schema::{AlgorithmDescriptor, ParamCatalog, ParamMap, SearchSpace};

/// Random number generator wrapper for search operations.
pub struct SearchRng {
    rng: StdRng,
}

impl SearchRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Uniformly pick a descriptor and resolve its algorithm.
    pub fn choose_algorithm<'a>(
        &mut self,
        descriptors: &'a [AlgorithmDescriptor],
    ) -> Option<(AlgorithmKind, &'a AlgorithmDescriptor)> {
        descriptors
            .choose(&mut self.rng)
            .map(|d| (AlgorithmKind::resolve(&d.algorithm), d))
    }

    /// Sample an algorithm and one legal value for each of its tuned
    /// parameters, keyed by native name.
    ///
    /// Parameters without catalog values are skipped.
    pub fn random_params(&mut self, space: &SearchSpace) -> Option<(AlgorithmKind, ParamMap)> {
        let (kind, descriptor) = self.choose_algorithm(&space.algorithms)?;

        let mut params = ParamMap::new();
        for canonical in &descriptor.params {
            let Some(value) = space
                .values
                .get(canonical)
                .and_then(|values| values.choose(&mut self.rng))
            else {
                log::trace!("No catalog values for '{}', skipping", canonical);
                continue;
            };
            params.insert(kind.native_param_name(canonical), value.clone());
        }

        Some((kind, params))
    }

    /// Two distinct indices below `len`, or `None` if `len < 2`.
    pub fn pick_pair(&mut self, len: usize) -> Option<(usize, usize)> {
        if len < 2 {
            return None;
        }
        let picked = rand::seq::index::sample(&mut self.rng, len, 2);
        Some((picked.index(0), picked.index(1)))
    }

    /// Uniform index below `len`.
    pub fn pick(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.rng.gen_range(0..len))
    }

    /// Replace one randomly chosen parameter with a value sampled from the
    /// catalog. The current value may be drawn again.
    ///
    /// Returns the changed native name and the new mapping, or `None` when
    /// the chosen parameter has no catalog entry.
    pub fn mutate(
        &mut self,
        algorithm: AlgorithmKind,
        params: &ParamMap,
        catalog: &ParamCatalog,
    ) -> Option<(String, ParamMap)> {
        let native = params.name_at(self.pick(params.len())?)?;
        let canonical = algorithm.canonical_param_name(native);

        let Some(value) = catalog
            .get(canonical)
            .and_then(|values| values.choose(&mut self.rng))
        else {
            log::trace!("{}: no catalog values for '{}'", algorithm, canonical);
            return None;
        };

        let native = algorithm.native_param_name(canonical).to_string();
        let mut mutated = params.clone();
        mutated.insert(native.clone(), value.clone());
        Some((native, mutated))
    }
}

/// First half of `a` followed by the second half of `b`, split at the
/// midpoint of `a`. On overlapping names the later insertion wins.
pub fn splice_params(a: &ParamMap, b: &ParamMap) -> ParamMap {
    let half = a.len() / 2;
    a.iter()
        .take(half)
        .chain(b.iter().skip(half))
        .map(|(name, value)| (name, value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParamValue;
    use proptest::prelude::*;

    fn kmedoids_params(n_clusters: i64, metric: &str) -> ParamMap {
        let mut model = AlgorithmKind::KMedoids.instantiate();
        let overrides: ParamMap = [
            ("n_clusters", ParamValue::Int(n_clusters)),
            ("metric", ParamValue::from(metric)),
        ]
        .into_iter()
        .collect();
        model.set_params(&overrides);
        model.params().clone()
    }

    #[test]
    fn test_splice_midpoint() {
        let a = kmedoids_params(2, "cosine");
        let b = kmedoids_params(9, "manhattan");
        let child = splice_params(&a, &b);

        // init, max_iter, method from a; metric, n_clusters, random_state from b
        assert_eq!(child.len(), 6);
        assert_eq!(child.names().collect::<Vec<_>>(), a.names().collect::<Vec<_>>());
        assert_eq!(child.get("metric"), Some(&ParamValue::from("manhattan")));
        assert_eq!(child.get("n_clusters"), Some(&ParamValue::Int(9)));
        assert_eq!(child.get("method"), a.get("method"));
    }

    #[test]
    fn test_random_params_resolve_aliases() {
        let space = SearchSpace::default();
        let mut rng = SearchRng::new(11);
        for _ in 0..50 {
            let (kind, params) = rng.random_params(&space).unwrap();
            assert!(!params.contains("metric_1"));
            assert!(!params.contains("metric_2"));
            if kind == AlgorithmKind::Hdbscan {
                assert!(params.contains("cluster_selection_epsilon"));
                assert!(!params.contains("eps"));
            }
        }
    }

    #[test]
    fn test_uncatalogued_params_skipped() {
        let space = SearchSpace {
            algorithms: vec![AlgorithmDescriptor::new("KMeans", &["n_clusters", "n_init"])],
            values: ParamCatalog::new().with("n_clusters", vec![ParamValue::Int(3)]),
        };
        let mut rng = SearchRng::new(0);
        let (kind, params) = rng.random_params(&space).unwrap();
        assert_eq!(kind, AlgorithmKind::KMeans);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("n_clusters"), Some(&ParamValue::Int(3)));
    }

    #[test]
    fn test_pick_pair_distinct() {
        let mut rng = SearchRng::new(5);
        assert!(rng.pick_pair(1).is_none());
        for _ in 0..100 {
            let (a, b) = rng.pick_pair(3).unwrap();
            assert_ne!(a, b);
            assert!(a < 3 && b < 3);
        }
    }

    #[test]
    fn test_mutate_miss_on_uncatalogued() {
        let catalog = ParamCatalog::new().with("n_clusters", vec![ParamValue::Int(4)]);
        let params: ParamMap = [("random_state", ParamValue::Int(0))].into_iter().collect();
        let mut rng = SearchRng::new(1);
        assert!(rng.mutate(AlgorithmKind::KMeans, &params, &catalog).is_none());
    }

    proptest! {
        #[test]
        fn prop_mutation_changes_at_most_one_value(seed in any::<u64>()) {
            let space = SearchSpace::default();
            let mut rng = SearchRng::new(seed);
            let (kind, sampled) = rng.random_params(&space).unwrap();
            let mut model = kind.instantiate();
            model.set_params(&sampled);
            let source = model.params().clone();

            if let Some((name, mutated)) = rng.mutate(kind, &source, &space.values) {
                prop_assert_eq!(mutated.len(), source.len());
                let changed: Vec<&str> = source
                    .iter()
                    .filter(|(n, v)| mutated.get(n) != Some(*v))
                    .map(|(n, _)| n)
                    .collect();
                prop_assert!(changed.len() <= 1);

                let canonical = kind.canonical_param_name(&name);
                let value = mutated.get(&name).unwrap();
                prop_assert!(space.values.allows(canonical, value));
            }
        }

        #[test]
        fn prop_splice_values_come_from_parent_halves(seed in any::<u64>()) {
            let mut rng = SearchRng::new(seed);
            let space = SearchSpace::default();
            let (kind, first) = rng.random_params(&space).unwrap();
            let (_, second) = loop {
                let (k, p) = rng.random_params(&space).unwrap();
                if k == kind {
                    break (k, p);
                }
            };

            let mut a = kind.instantiate();
            a.set_params(&first);
            let mut b = kind.instantiate();
            b.set_params(&second);

            let child = splice_params(a.params(), b.params());
            let half = a.params().len() / 2;
            for (i, (name, value)) in child.iter().enumerate() {
                let parent = if i < half { a.params() } else { b.params() };
                prop_assert_eq!(parent.get(name), Some(value));
            }
        }
    }
}
