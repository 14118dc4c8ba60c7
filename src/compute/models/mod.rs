//! Clustering models and the registry that builds them by name.
//!
//! Every model keeps its full native parameter mapping (defaults plus any
//! overrides) and reads typed values from it only when fitted, so a bad
//! parameter combination surfaces as a `ModelError` from `fit` rather than
//! at construction time.

mod dbscan;
mod distance;
mod hdbscan;
mod kmeans;
mod kmedoids;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{Dataset, ParamMap, ParamValue};

pub use dbscan::Dbscan;
pub use distance::{Metric, pairwise_distances};
pub use hdbscan::Hdbscan;
pub use kmeans::KMeans;
pub use kmedoids::KMedoids;

/// Label assigned to noise points by density-based models.
pub const NOISE: i64 = -1;

/// A configurable, fittable clustering model.
pub trait ClusterModel: fmt::Debug + Send {
    /// Which algorithm this is.
    fn kind(&self) -> AlgorithmKind;

    /// Full native parameter mapping.
    fn params(&self) -> &ParamMap;

    /// Mutable access for `set_params`.
    fn params_mut(&mut self) -> &mut ParamMap;

    /// Overwrite or add parameters. Never fails; validation happens in `fit`.
    fn set_params(&mut self, params: &ParamMap) {
        let own = self.params_mut();
        for (name, value) in params.iter() {
            own.insert(name, value.clone());
        }
    }

    /// Fit against a dataset, producing per-row labels.
    fn fit(&mut self, data: &Dataset) -> Result<(), ModelError>;

    /// Labels from the last successful fit.
    fn labels(&self) -> Option<&[i64]>;
}

/// Supported clustering algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlgorithmKind {
    KMeans,
    KMedoids,
    #[serde(rename = "DBSCAN")]
    Dbscan,
    #[serde(rename = "HDBSCAN")]
    Hdbscan,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 4] = [
        AlgorithmKind::KMeans,
        AlgorithmKind::KMedoids,
        AlgorithmKind::Dbscan,
        AlgorithmKind::Hdbscan,
    ];

    /// Algorithm used for names the registry does not know.
    pub const FALLBACK: AlgorithmKind = AlgorithmKind::Hdbscan;

    /// Registry name.
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::KMeans => "KMeans",
            AlgorithmKind::KMedoids => "KMedoids",
            AlgorithmKind::Dbscan => "DBSCAN",
            AlgorithmKind::Hdbscan => "HDBSCAN",
        }
    }

    /// Exact registry lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Registry lookup with fallback to `FALLBACK` for unknown names.
    pub fn resolve(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            log::debug!(
                "Unknown algorithm '{}', falling back to {}",
                name,
                Self::FALLBACK.name()
            );
            Self::FALLBACK
        })
    }

    /// Build a default-configured model.
    pub fn instantiate(&self) -> Box<dyn ClusterModel> {
        match self {
            AlgorithmKind::KMeans => Box::new(KMeans::new()),
            AlgorithmKind::KMedoids => Box::new(KMedoids::new()),
            AlgorithmKind::Dbscan => Box::new(Dbscan::new()),
            AlgorithmKind::Hdbscan => Box::new(Hdbscan::new()),
        }
    }

    /// Translate a catalog (canonical) parameter name into this algorithm's
    /// native name.
    pub fn native_param_name<'a>(&self, canonical: &'a str) -> &'a str {
        match (self, canonical) {
            (_, "metric_1" | "metric_2") => "metric",
            (AlgorithmKind::Hdbscan, "eps") => "cluster_selection_epsilon",
            _ => canonical,
        }
    }

    /// Translate a native parameter name back into its catalog name.
    pub fn canonical_param_name<'a>(&self, native: &'a str) -> &'a str {
        match (self, native) {
            (AlgorithmKind::KMedoids | AlgorithmKind::Dbscan, "metric") => "metric_1",
            (AlgorithmKind::Hdbscan, "metric") => "metric_2",
            (AlgorithmKind::Hdbscan, "cluster_selection_epsilon") => "eps",
            _ => native,
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build a default-configured model by registry name.
///
/// Unknown names fall back to HDBSCAN.
pub fn instantiate_model(name: &str) -> Box<dyn ClusterModel> {
    AlgorithmKind::resolve(name).instantiate()
}

/// Errors raised while fitting a model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("{algorithm} has no parameter '{name}'")]
    UnknownParameter {
        algorithm: &'static str,
        name: String,
    },
    #[error("Invalid value {value} for parameter '{name}': expected {expected}")]
    InvalidParameter {
        name: String,
        value: String,
        expected: &'static str,
    },
    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),
    #[error("Metric {metric} cannot be used with {n_features} features")]
    MetricShape {
        metric: &'static str,
        n_features: usize,
    },
    #[error("n_samples={n_samples} should be >= n_clusters={n_clusters}")]
    TooFewSamples { n_samples: usize, n_clusters: usize },
    #[error("Model has not been fitted")]
    NotFitted,
}

/// Reject parameter names the model does not understand.
pub(crate) fn check_known(
    kind: AlgorithmKind,
    params: &ParamMap,
    known: &[&str],
) -> Result<(), ModelError> {
    match params.names().find(|name| !known.contains(name)) {
        Some(name) => Err(ModelError::UnknownParameter {
            algorithm: kind.name(),
            name: name.to_string(),
        }),
        None => Ok(()),
    }
}

fn lookup<'a>(params: &'a ParamMap, name: &str) -> Result<&'a ParamValue, ModelError> {
    params.get(name).ok_or_else(|| ModelError::InvalidParameter {
        name: name.to_string(),
        value: "<missing>".to_string(),
        expected: "a value",
    })
}

fn invalid(name: &str, value: &ParamValue, expected: &'static str) -> ModelError {
    ModelError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        expected,
    }
}

/// Integer parameter that must be at least `min`.
pub(crate) fn usize_param(params: &ParamMap, name: &str, min: usize) -> Result<usize, ModelError> {
    let value = lookup(params, name)?;
    match value.as_int() {
        Some(v) if v >= min as i64 => Ok(v as usize),
        _ => Err(invalid(
            name,
            value,
            if min == 0 {
                "a non-negative integer"
            } else {
                "a positive integer"
            },
        )),
    }
}

/// Numeric parameter that must be non-negative.
pub(crate) fn non_negative_param(params: &ParamMap, name: &str) -> Result<f64, ModelError> {
    let value = lookup(params, name)?;
    match value.as_float() {
        Some(v) if v >= 0.0 && v.is_finite() => Ok(v),
        _ => Err(invalid(name, value, "a non-negative number")),
    }
}

/// Numeric parameter that must be strictly positive.
pub(crate) fn positive_param(params: &ParamMap, name: &str) -> Result<f64, ModelError> {
    let value = lookup(params, name)?;
    match value.as_float() {
        Some(v) if v > 0.0 && v.is_finite() => Ok(v),
        _ => Err(invalid(name, value, "a positive number")),
    }
}

/// String parameter restricted to a fixed set of options.
pub(crate) fn choice_param<'a>(
    params: &'a ParamMap,
    name: &str,
    options: &[&str],
    expected: &'static str,
) -> Result<&'a str, ModelError> {
    let value = lookup(params, name)?;
    match value.as_str() {
        Some(s) if options.contains(&s) => Ok(s),
        _ => Err(invalid(name, value, expected)),
    }
}

pub(crate) fn bool_param(params: &ParamMap, name: &str) -> Result<bool, ModelError> {
    let value = lookup(params, name)?;
    value.as_bool().ok_or_else(|| invalid(name, value, "a boolean"))
}

pub(crate) fn metric_param(params: &ParamMap, data: &Dataset) -> Result<Metric, ModelError> {
    let value = lookup(params, "metric")?;
    let name = value
        .as_str()
        .ok_or_else(|| invalid("metric", value, "a metric name"))?;
    let metric = Metric::from_name(name)?;
    metric.check(data)?;
    Ok(metric)
}

/// Seed for a model's own RNG.
pub(crate) fn random_state_param(params: &ParamMap) -> Result<u64, ModelError> {
    usize_param(params, "random_state", 0).map(|v| v as u64)
}
