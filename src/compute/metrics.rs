//! Cluster quality scoring.

use crate::schema::Dataset;

use super::models::Metric;

/// Errors raised when a labelling cannot be scored.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreError {
    #[error("Got {labels} labels for {samples} samples")]
    LengthMismatch { samples: usize, labels: usize },
    #[error(
        "Number of labels is {n_labels}. Valid values are 2 to n_samples - 1 (inclusive) with n_samples={n_samples}"
    )]
    InvalidLabelCount { n_labels: usize, n_samples: usize },
}

/// Mean silhouette coefficient over all samples, using euclidean distance.
///
/// Every distinct label, noise (-1) included, counts as a cluster. Samples in
/// singleton clusters contribute 0. The result lies in [-1, 1].
pub fn silhouette_score(data: &Dataset, labels: &[i64]) -> Result<f64, ScoreError> {
    let n = data.n_rows();
    if labels.len() != n {
        return Err(ScoreError::LengthMismatch {
            samples: n,
            labels: labels.len(),
        });
    }

    let mut distinct = labels.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    let k = distinct.len();
    if k < 2 || k > n - 1 {
        return Err(ScoreError::InvalidLabelCount {
            n_labels: k,
            n_samples: n,
        });
    }

    // Dense cluster index per sample
    let cluster: Vec<usize> = labels
        .iter()
        .map(|l| distinct.binary_search(l).unwrap_or(0))
        .collect();
    let mut sizes = vec![0usize; k];
    for &c in &cluster {
        sizes[c] += 1;
    }

    let metric = Metric::Euclidean;
    let mut total = 0.0;
    let mut sums = vec![0.0; k];

    for i in 0..n {
        let own = cluster[i];
        if sizes[own] == 1 {
            continue;
        }

        sums.iter_mut().for_each(|s| *s = 0.0);
        for j in 0..n {
            if i != j {
                sums[cluster[j]] += metric.distance(data.row(i), data.row(j));
            }
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    Ok(total / n as f64)
}
