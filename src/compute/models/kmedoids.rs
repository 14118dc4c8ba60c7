//! K-medoids with alternating (Voronoi iteration) or PAM swap updates.

use rand::distributions::WeightedIndex;
use rand::prelude::*;

use crate::schema::{Dataset, ParamMap, ParamValue};

use super::{
    AlgorithmKind, ClusterModel, ModelError, check_known, choice_param, metric_param,
    pairwise_distances, random_state_param, usize_param,
};

const PARAM_NAMES: [&str; 6] = [
    "init",
    "max_iter",
    "method",
    "metric",
    "n_clusters",
    "random_state",
];

/// K-medoids clustering over an arbitrary distance metric.
#[derive(Debug, Clone)]
pub struct KMedoids {
    params: ParamMap,
    labels: Option<Vec<i64>>,
    medoids: Vec<usize>,
}

impl Default for KMedoids {
    fn default() -> Self {
        Self::new()
    }
}

impl KMedoids {
    pub fn new() -> Self {
        let params = [
            ("init", ParamValue::from("heuristic")),
            ("max_iter", ParamValue::Int(300)),
            ("method", ParamValue::from("alternate")),
            ("metric", ParamValue::from("euclidean")),
            ("n_clusters", ParamValue::Int(8)),
            ("random_state", ParamValue::Int(0)),
        ]
        .into_iter()
        .collect();

        Self {
            params,
            labels: None,
            medoids: Vec::new(),
        }
    }

    /// Row indices of the medoids from the last fit.
    pub fn medoid_indices(&self) -> &[usize] {
        &self.medoids
    }
}

impl ClusterModel for KMedoids {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::KMedoids
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

        let init = choice_param(
            &self.params,
            "init",
            &["random", "heuristic", "k-medoids++", "build"],
            "'random', 'heuristic', 'k-medoids++' or 'build'",
        )?;
        let max_iter = usize_param(&self.params, "max_iter", 0)?;
        let pam = choice_param(
            &self.params,
            "method",
            &["alternate", "pam"],
            "'alternate' or 'pam'",
        )? == "pam";
        let metric = metric_param(&self.params, data)?;
        let k = usize_param(&self.params, "n_clusters", 1)?;
        let mut rng = StdRng::seed_from_u64(random_state_param(&self.params)?);

        let n = data.n_rows();
        if k > n {
            return Err(ModelError::TooFewSamples {
                n_samples: n,
                n_clusters: k,
            });
        }

        let dist = pairwise_distances(data, metric);
        let mut medoids = match init {
            "random" => rand::seq::index::sample(&mut rng, n, k).into_vec(),
            "heuristic" => heuristic_init(&dist, k),
            "k-medoids++" => plus_plus_init(&dist, k, &mut rng),
            _ => build_init(&dist, k),
        };

        if pam {
            swap_phase(&dist, &mut medoids, max_iter);
        } else {
            alternate_phase(&dist, &mut medoids, max_iter);
        }

        let labels = nearest(&dist, &medoids)
            .into_iter()
            .map(|c| c as i64)
            .collect();
        self.medoids = medoids;
        self.labels = Some(labels);
        Ok(())
    }

    fn labels(&self) -> Option<&[i64]> {
        self.labels.as_deref()
    }
}

/// Index into `medoids` of the closest medoid for every point.
fn nearest(dist: &[Vec<f64>], medoids: &[usize]) -> Vec<usize> {
    (0..dist.len())
        .map(|i| {
            medoids
                .iter()
                .enumerate()
                .min_by(|a, b| dist[i][*a.1].total_cmp(&dist[i][*b.1]))
                .map(|(c, _)| c)
                .unwrap_or(0)
        })
        .collect()
}

/// Sum of distances from each point to its closest medoid.
fn total_cost(dist: &[Vec<f64>], medoids: &[usize]) -> f64 {
    (0..dist.len())
        .map(|i| {
            medoids
                .iter()
                .map(|&m| dist[i][m])
                .fold(f64::INFINITY, f64::min)
        })
        .sum()
}

/// The k points with the smallest total distance to all others.
fn heuristic_init(dist: &[Vec<f64>], k: usize) -> Vec<usize> {
    let mut order: Vec<(usize, f64)> = dist
        .iter()
        .enumerate()
        .map(|(i, row)| (i, row.iter().sum()))
        .collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1));
    order.into_iter().take(k).map(|(i, _)| i).collect()
}

/// Seeding with probability proportional to squared distance.
fn plus_plus_init(dist: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<usize> {
    let n = dist.len();
    let mut medoids = vec![rng.gen_range(0..n)];
    while medoids.len() < k {
        let weights: Vec<f64> = (0..n)
            .map(|i| {
                medoids
                    .iter()
                    .map(|&m| dist[i][m])
                    .fold(f64::INFINITY, f64::min)
                    .powi(2)
            })
            .collect();
        let next = match WeightedIndex::new(&weights) {
            Ok(w) => w.sample(rng),
            Err(_) => match (0..n).find(|i| !medoids.contains(i)) {
                Some(i) => i,
                None => break,
            },
        };
        medoids.push(next);
    }
    medoids
}

/// Greedy PAM BUILD: add the point that lowers total cost the most.
fn build_init(dist: &[Vec<f64>], k: usize) -> Vec<usize> {
    let n = dist.len();
    let mut medoids = Vec::with_capacity(k);
    while medoids.len() < k {
        let mut best: Option<(usize, f64)> = None;
        for candidate in 0..n {
            if medoids.contains(&candidate) {
                continue;
            }
            medoids.push(candidate);
            let cost = total_cost(dist, &medoids);
            medoids.pop();
            if best.is_none_or(|(_, c)| cost < c) {
                best = Some((candidate, cost));
            }
        }
        match best {
            Some((i, _)) => medoids.push(i),
            None => break,
        }
    }
    medoids
}

/// Voronoi iteration: reassign points, then move each medoid to the member
/// minimizing in-cluster distance.
fn alternate_phase(dist: &[Vec<f64>], medoids: &mut [usize], max_iter: usize) {
    for _ in 0..max_iter {
        let labels = nearest(dist, medoids);
        let mut changed = false;

        for (c, medoid) in medoids.iter_mut().enumerate() {
            let members: Vec<usize> = (0..dist.len()).filter(|&i| labels[i] == c).collect();
            let best = members
                .iter()
                .map(|&m| (m, members.iter().map(|&j| dist[m][j]).sum::<f64>()))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(m, _)| m);
            if let Some(m) = best
                && m != *medoid
            {
                *medoid = m;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }
}

/// PAM SWAP: apply the best cost-reducing (medoid, non-medoid) exchange
/// until none improves.
fn swap_phase(dist: &[Vec<f64>], medoids: &mut [usize], max_iter: usize) {
    let n = dist.len();
    let mut cost = total_cost(dist, medoids);

    for _ in 0..max_iter {
        let mut best: Option<(usize, usize, f64)> = None;
        for slot in 0..medoids.len() {
            let original = medoids[slot];
            for h in 0..n {
                if medoids.contains(&h) {
                    continue;
                }
                medoids[slot] = h;
                let swapped = total_cost(dist, medoids);
                medoids[slot] = original;
                if swapped < best.map_or(cost, |(_, _, c)| c) {
                    best = Some((slot, h, swapped));
                }
            }
        }

        match best {
            Some((slot, h, c)) => {
                medoids[slot] = h;
                cost = c;
            }
            None => break,
        }
    }
}
