//! DBSCAN density-based clustering.

use std::collections::VecDeque;

use crate::schema::{Dataset, ParamMap, ParamValue};

use super::{
    AlgorithmKind, ClusterModel, ModelError, NOISE, check_known, metric_param, positive_param,
    usize_param,
};

const PARAM_NAMES: [&str; 3] = ["eps", "metric", "min_samples"];

/// Density-based clustering with a fixed neighborhood radius.
#[derive(Debug, Clone)]
pub struct Dbscan {
    params: ParamMap,
    labels: Option<Vec<i64>>,
    core_samples: Vec<usize>,
}

impl Default for Dbscan {
    fn default() -> Self {
        Self::new()
    }
}

impl Dbscan {
    pub fn new() -> Self {
        let params = [
            ("eps", ParamValue::Float(0.5)),
            ("metric", ParamValue::from("euclidean")),
            ("min_samples", ParamValue::Int(5)),
        ]
        .into_iter()
        .collect();

        Self {
            params,
            labels: None,
            core_samples: Vec::new(),
        }
    }

    /// Indices of core points from the last fit.
    pub fn core_sample_indices(&self) -> &[usize] {
        &self.core_samples
    }
}

impl ClusterModel for Dbscan {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Dbscan
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

        let eps = positive_param(&self.params, "eps")?;
        let metric = metric_param(&self.params, data)?;
        let min_samples = usize_param(&self.params, "min_samples", 1)?;

        let n = data.n_rows();
        // Neighborhoods include the point itself
        let neighborhoods: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                (0..n)
                    .filter(|&j| metric.distance(data.row(i), data.row(j)) <= eps)
                    .collect()
            })
            .collect();
        let is_core: Vec<bool> = neighborhoods
            .iter()
            .map(|nb| nb.len() >= min_samples)
            .collect();

        let mut labels = vec![NOISE; n];
        let mut next_label = 0i64;
        let mut queue = VecDeque::new();

        for start in 0..n {
            if labels[start] != NOISE || !is_core[start] {
                continue;
            }
            labels[start] = next_label;
            queue.push_back(start);

            while let Some(p) = queue.pop_front() {
                if !is_core[p] {
                    continue;
                }
                for &q in &neighborhoods[p] {
                    if labels[q] == NOISE {
                        labels[q] = next_label;
                        queue.push_back(q);
                    }
                }
            }
            next_label += 1;
        }

        self.core_samples = (0..n).filter(|&i| is_core[i]).collect();
        self.labels = Some(labels);
        Ok(())
    }

    fn labels(&self) -> Option<&[i64]> {
        self.labels.as_deref()
    }
}
