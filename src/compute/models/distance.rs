//! Distance metrics shared by the clustering models.

use crate::schema::Dataset;

use super::ModelError;

/// Pairwise distance metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Euclidean,
    Manhattan,
    Cosine,
    Chebyshev,
    Canberra,
    BrayCurtis,
    Hamming,
    /// Great-circle distance on the unit sphere; rows are (lat, lon) radians.
    Haversine,
}

impl Metric {
    /// Parse a metric name, including its common aliases.
    pub fn from_name(name: &str) -> Result<Self, ModelError> {
        match name {
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            "manhattan" | "cityblock" | "l1" => Ok(Metric::Manhattan),
            "cosine" => Ok(Metric::Cosine),
            "chebyshev" => Ok(Metric::Chebyshev),
            "canberra" => Ok(Metric::Canberra),
            "braycurtis" => Ok(Metric::BrayCurtis),
            "hamming" => Ok(Metric::Hamming),
            "haversine" => Ok(Metric::Haversine),
            other => Err(ModelError::UnknownMetric(other.to_string())),
        }
    }

    /// Check the metric can be applied to data of this shape.
    pub fn check(&self, data: &Dataset) -> Result<(), ModelError> {
        if *self == Metric::Haversine && data.n_cols() != 2 {
            return Err(ModelError::MetricShape {
                metric: "haversine",
                n_features: data.n_cols(),
            });
        }
        Ok(())
    }

    /// Distance between two points of equal length.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Metric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            Metric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            Metric::Cosine => {
                let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
                let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
                if na == 0.0 || nb == 0.0 {
                    1.0
                } else {
                    (1.0 - dot / (na * nb)).max(0.0)
                }
            }
            Metric::Chebyshev => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).abs())
                .fold(0.0, f64::max),
            Metric::Canberra => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let denom = x.abs() + y.abs();
                    if denom == 0.0 {
                        0.0
                    } else {
                        (x - y).abs() / denom
                    }
                })
                .sum(),
            Metric::BrayCurtis => {
                let num: f64 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
                let denom: f64 = a.iter().zip(b).map(|(x, y)| (x + y).abs()).sum();
                if denom == 0.0 { 0.0 } else { num / denom }
            }
            Metric::Hamming => {
                if a.is_empty() {
                    return 0.0;
                }
                let differing = a.iter().zip(b).filter(|(x, y)| x != y).count();
                differing as f64 / a.len() as f64
            }
            Metric::Haversine => {
                let (lat1, lon1) = (a[0], a[1]);
                let (lat2, lon2) = (b[0], b[1]);
                let h = ((lat2 - lat1) / 2.0).sin().powi(2)
                    + lat1.cos() * lat2.cos() * ((lon2 - lon1) / 2.0).sin().powi(2);
                2.0 * h.sqrt().min(1.0).asin()
            }
        }
    }
}

/// Full symmetric distance matrix for a dataset.
pub fn pairwise_distances(data: &Dataset, metric: Metric) -> Vec<Vec<f64>> {
    let n = data.n_rows();
    let mut dist = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = metric.distance(data.row(i), data.row(j));
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }
    dist
}
