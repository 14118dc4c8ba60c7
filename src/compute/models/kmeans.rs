//! K-means (Lloyd's algorithm) with k-means++ or random initialization.

use rand::distributions::WeightedIndex;
use rand::prelude::*;

use crate::schema::{Dataset, ParamMap, ParamValue};

use super::{
    AlgorithmKind, ClusterModel, ModelError, check_known, choice_param, non_negative_param,
    random_state_param, usize_param,
};

const PARAM_NAMES: [&str; 6] = [
    "init",
    "max_iter",
    "n_clusters",
    "n_init",
    "random_state",
    "tol",
];

/// K-means clustering.
#[derive(Debug, Clone)]
pub struct KMeans {
    params: ParamMap,
    labels: Option<Vec<i64>>,
    centroids: Vec<Vec<f64>>,
    inertia: f64,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new()
    }
}

impl KMeans {
    pub fn new() -> Self {
        let params = [
            ("init", ParamValue::from("k-means++")),
            ("max_iter", ParamValue::Int(300)),
            ("n_clusters", ParamValue::Int(8)),
            ("n_init", ParamValue::Int(1)),
            ("random_state", ParamValue::Int(0)),
            ("tol", ParamValue::Float(1e-4)),
        ]
        .into_iter()
        .collect();

        Self {
            params,
            labels: None,
            centroids: Vec::new(),
            inertia: f64::INFINITY,
        }
    }

    /// Cluster centers from the last fit.
    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    /// Sum of squared distances to the closest centroid.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    fn init_centroids(
        &self,
        data: &Dataset,
        k: usize,
        plus_plus: bool,
        rng: &mut StdRng,
    ) -> Vec<Vec<f64>> {
        let n = data.n_rows();
        if !plus_plus {
            return rand::seq::index::sample(rng, n, k)
                .into_iter()
                .map(|i| data.row(i).to_vec())
                .collect();
        }

        let mut centroids = Vec::with_capacity(k);
        centroids.push(data.row(rng.gen_range(0..n)).to_vec());
        let mut min_dist: Vec<f64> = data
            .rows()
            .map(|r| squared_distance(r, &centroids[0]))
            .collect();

        while centroids.len() < k {
            // D^2 weighting; all-zero weights mean every point is already a center
            let idx = match WeightedIndex::new(&min_dist) {
                Ok(dist) => dist.sample(rng),
                Err(_) => rng.gen_range(0..n),
            };
            let next = data.row(idx).to_vec();
            for (d, row) in min_dist.iter_mut().zip(data.rows()) {
                *d = d.min(squared_distance(row, &next));
            }
            centroids.push(next);
        }

        centroids
    }
}

impl ClusterModel for KMeans {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::KMeans
    }

    fn params(&self) -> &ParamMap {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamMap {
        &mut self.params
    }

    fn fit(&mut self, data: &Dataset) -> Result<(), ModelError> {
        self.labels = None;
        check_known(self.kind(), &self.params, &PARAM_NAMES)?;

        let plus_plus = choice_param(
            &self.params,
            "init",
            &["k-means++", "random"],
            "'k-means++' or 'random'",
        )? == "k-means++";
        let max_iter = usize_param(&self.params, "max_iter", 1)?;
        let k = usize_param(&self.params, "n_clusters", 1)?;
        let n_init = usize_param(&self.params, "n_init", 1)?;
        let mut rng = StdRng::seed_from_u64(random_state_param(&self.params)?);
        let tol = non_negative_param(&self.params, "tol")? * mean_variance(data);

        let n = data.n_rows();
        if k > n {
            return Err(ModelError::TooFewSamples {
                n_samples: n,
                n_clusters: k,
            });
        }

        let mut best: Option<(f64, Vec<Vec<f64>>, Vec<usize>)> = None;
        for _ in 0..n_init {
            let mut centroids = self.init_centroids(data, k, plus_plus, &mut rng);
            let mut assignment = assign(data, &centroids);

            for _ in 0..max_iter {
                let updated = recompute_centroids(data, &assignment, &centroids);
                let shift: f64 = centroids
                    .iter()
                    .zip(&updated)
                    .map(|(a, b)| squared_distance(a, b))
                    .sum();
                centroids = updated;
                assignment = assign(data, &centroids);
                if shift <= tol {
                    break;
                }
            }

            let inertia: f64 = data
                .rows()
                .zip(&assignment)
                .map(|(row, &c)| squared_distance(row, &centroids[c]))
                .sum();
            if best.as_ref().is_none_or(|(b, _, _)| inertia < *b) {
                best = Some((inertia, centroids, assignment));
            }
        }

        let (inertia, centroids, assignment) = best.ok_or(ModelError::NotFitted)?;
        self.inertia = inertia;
        self.centroids = centroids;
        self.labels = Some(assignment.into_iter().map(|c| c as i64).collect());
        Ok(())
    }

    fn labels(&self) -> Option<&[i64]> {
        self.labels.as_deref()
    }
}

#[inline]
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the nearest centroid for each row.
fn assign(data: &Dataset, centroids: &[Vec<f64>]) -> Vec<usize> {
    data.rows()
        .map(|row| {
            centroids
                .iter()
                .enumerate()
                .map(|(i, c)| (i, squared_distance(row, c)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i)
                .unwrap_or(0)
        })
        .collect()
}

/// Mean of assigned rows per cluster. An empty cluster is moved to the row
/// farthest from its current centroid.
fn recompute_centroids(
    data: &Dataset,
    assignment: &[usize],
    previous: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    let k = previous.len();
    let dims = data.n_cols();
    let mut sums = vec![vec![0.0; dims]; k];
    let mut counts = vec![0usize; k];

    for (row, &c) in data.rows().zip(assignment) {
        counts[c] += 1;
        for (s, v) in sums[c].iter_mut().zip(row) {
            *s += v;
        }
    }

    sums.into_iter()
        .zip(counts)
        .enumerate()
        .map(|(c, (mut sum, count))| {
            if count == 0 {
                let far = data
                    .rows()
                    .zip(assignment)
                    .max_by(|(a, ca), (b, cb)| {
                        squared_distance(a, &previous[**ca])
                            .total_cmp(&squared_distance(b, &previous[**cb]))
                    })
                    .map(|(row, _)| row.to_vec());
                return far.unwrap_or_else(|| previous[c].clone());
            }
            for s in sum.iter_mut() {
                *s /= count as f64;
            }
            sum
        })
        .collect()
}

/// Average per-feature variance, used to scale `tol`.
fn mean_variance(data: &Dataset) -> f64 {
    let n = data.n_rows() as f64;
    let dims = data.n_cols();
    let mut total = 0.0;
    for c in 0..dims {
        let mean = data.rows().map(|r| r[c]).sum::<f64>() / n;
        total += data.rows().map(|r| (r[c] - mean).powi(2)).sum::<f64>() / n;
    }
    total / dims as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Dataset {
        Dataset::gaussian_blobs(
            &[vec![0.0, 0.0], vec![8.0, 8.0], vec![-8.0, 8.0]],
            20,
            0.4,
            1,
        )
        .unwrap()
    }

    fn with(n_clusters: i64) -> KMeans {
        let mut model = KMeans::new();
        let overrides: ParamMap = [("n_clusters", ParamValue::Int(n_clusters))]
            .into_iter()
            .collect();
        model.set_params(&overrides);
        model
    }

    #[test]
    fn test_default_params_sorted() {
        let model = KMeans::new();
        let names: Vec<_> = model.params().names().collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names, PARAM_NAMES.to_vec());
    }

    #[test]
    fn test_fit_separates_blobs() {
        let data = blobs();
        let mut model = with(3);
        model.fit(&data).unwrap();

        let labels = model.labels().unwrap();
        assert_eq!(labels.len(), 60);
        // Each blob gets a single, distinct label
        for blob in 0..3 {
            let first = labels[blob * 20];
            assert!(labels[blob * 20..(blob + 1) * 20].iter().all(|&l| l == first));
        }
        assert_ne!(labels[0], labels[20]);
        assert_ne!(labels[20], labels[40]);
        assert_ne!(labels[0], labels[40]);
        assert_eq!(model.centroids().len(), 3);
        assert!(model.inertia() < 60.0);
    }

    #[test]
    fn test_inertia_shrinks_with_more_clusters() {
        let data = blobs();
        let mut inertias = Vec::new();
        for k in 1..=3 {
            let mut model = with(k);
            model.fit(&data).unwrap();
            assert_eq!(model.centroids().len(), k as usize);
            inertias.push(model.inertia());
        }
        assert!(inertias[0] > inertias[1]);
        assert!(inertias[1] > inertias[2]);
    }

    #[test]
    fn test_random_init() {
        let data = blobs();
        let mut model = with(3);
        let overrides: ParamMap = [
            ("init", ParamValue::from("random")),
            ("n_init", ParamValue::Int(5)),
        ]
        .into_iter()
        .collect();
        model.set_params(&overrides);
        model.fit(&data).unwrap();
        assert_eq!(model.labels().unwrap().len(), 60);
    }

    #[test]
    fn test_too_many_clusters_fails() {
        let data = Dataset::from_rows(vec![vec![0.0], vec![1.0]]).unwrap();
        let mut model = with(5);
        assert_eq!(
            model.fit(&data),
            Err(ModelError::TooFewSamples {
                n_samples: 2,
                n_clusters: 5
            })
        );
        assert!(model.labels().is_none());
    }

    #[test]
    fn test_invalid_values_fail() {
        let data = blobs();
        let mut model = KMeans::new();
        let overrides: ParamMap = [("tol", ParamValue::from("tight"))].into_iter().collect();
        model.set_params(&overrides);
        assert!(matches!(
            model.fit(&data),
            Err(ModelError::InvalidParameter { .. })
        ));

        let mut model = with(0);
        assert!(model.fit(&data).is_err());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let data = blobs();
        let mut a = with(4);
        let mut b = with(4);
        a.fit(&data).unwrap();
        b.fit(&data).unwrap();
        assert_eq!(a.labels(), b.labels());
    }
}
