//! Parameter types describing the hyperparameter search space.
//!
//! A search space is a list of algorithm descriptors (which parameters of
//! each algorithm are tuned) plus a catalog of legal values per parameter.
//! Descriptors and the catalog use canonical parameter names; models use
//! their own native names (see `AlgorithmKind::native_param_name`).

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Integer value, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value; integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Insertion-ordered parameter mapping.
///
/// Inserting an existing name overwrites its value in place, so the order of
/// names is fixed by first insertion. Crossover relies on this order when it
/// splits a mapping at its midpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap {
    entries: Vec<(String, ParamValue)>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or overwrite a value. Returns the previous value, if any.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Name at a given position.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, ParamValue)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (K, ParamValue)>>(iter: I) -> Self {
        let mut map = ParamMap::new();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>> Extend<(K, ParamValue)> for ParamMap {
    fn extend<I: IntoIterator<Item = (K, ParamValue)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl fmt::Display for ParamMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}

impl Serialize for ParamMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParamMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParamMapVisitor;

        impl<'de> Visitor<'de> for ParamMapVisitor {
            type Value = ParamMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of parameter names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ParamMap, A::Error> {
                let mut map = ParamMap::new();
                while let Some((k, v)) = access.next_entry::<String, ParamValue>()? {
                    map.insert(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(ParamMapVisitor)
    }
}

/// An algorithm and the canonical names of its tuned parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmDescriptor {
    /// Registry name (`KMeans`, `KMedoids`, `DBSCAN`, `HDBSCAN`).
    pub algorithm: String,
    /// Canonical parameter names, in sampling order.
    pub params: Vec<String>,
}

impl AlgorithmDescriptor {
    pub fn new(algorithm: impl Into<String>, params: &[&str]) -> Self {
        Self {
            algorithm: algorithm.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Legal values for each canonical parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamCatalog {
    values: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.insert(name, values);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<ParamValue>) {
        self.values.insert(name.into(), values);
    }

    /// Legal values for a canonical name. Empty lists count as missing.
    pub fn get(&self, name: &str) -> Option<&[ParamValue]> {
        self.values
            .get(name)
            .map(Vec::as_slice)
            .filter(|v| !v.is_empty())
    }

    /// Whether `value` is a legal value for `name`.
    pub fn allows(&self, name: &str, value: &ParamValue) -> bool {
        self.get(name).is_some_and(|vs| vs.contains(value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// The full search space: algorithms to choose from and their value catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub algorithms: Vec<AlgorithmDescriptor>,
    pub values: ParamCatalog,
}

fn ints(values: &[i64]) -> Vec<ParamValue> {
    values.iter().copied().map(ParamValue::Int).collect()
}

fn floats(values: &[f64]) -> Vec<ParamValue> {
    values.iter().copied().map(ParamValue::Float).collect()
}

fn texts(values: &[&str]) -> Vec<ParamValue> {
    values.iter().copied().map(ParamValue::from).collect()
}

impl Default for SearchSpace {
    fn default() -> Self {
        let algorithms = vec![
            AlgorithmDescriptor::new("KMeans", &["n_clusters", "max_iter", "tol"]),
            AlgorithmDescriptor::new("KMedoids", &["n_clusters", "metric_1", "method", "max_iter"]),
            AlgorithmDescriptor::new("DBSCAN", &["eps", "min_samples", "metric_1"]),
            AlgorithmDescriptor::new("HDBSCAN", &["metric_2", "min_samples", "eps"]),
        ];

        let values = ParamCatalog::new()
            .with("n_clusters", ints(&[2, 3, 4, 5, 6, 7, 8, 9, 10]))
            .with(
                "max_iter",
                ints(&[50, 100, 150, 200, 250, 300, 350, 400, 450, 500]),
            )
            .with("tol", floats(&[0.00001, 0.0001, 0.001, 0.01, 0.1]))
            .with(
                "metric_1",
                texts(&[
                    "euclidean",
                    "cosine",
                    "haversine",
                    "l2",
                    "cityblock",
                    "l1",
                    "manhattan",
                ]),
            )
            .with(
                "metric_2",
                texts(&[
                    "l2",
                    "canberra",
                    "manhattan",
                    "euclidean",
                    "braycurtis",
                    "chebyshev",
                    "hamming",
                ]),
            )
            .with("method", texts(&["alternate", "pam"]))
            .with(
                "eps",
                floats(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 1.0, 2.0, 3.0, 4.0]),
            )
            .with("min_samples", ints(&[3, 4, 5, 6, 7, 8, 9, 10]));

        Self { algorithms, values }
    }
}

impl SearchSpace {
    /// Check the caller's preconditions: at least one algorithm, a non-empty
    /// catalog, and no empty value lists.
    pub fn validate(&self) -> Result<(), SearchSpaceError> {
        if self.algorithms.is_empty() {
            return Err(SearchSpaceError::NoAlgorithms);
        }
        if self.values.is_empty() {
            return Err(SearchSpaceError::EmptyCatalog);
        }
        if let Some(name) = self
            .values
            .values
            .iter()
            .find(|(_, vs)| vs.is_empty())
            .map(|(name, _)| name)
        {
            return Err(SearchSpaceError::EmptyValues(name.clone()));
        }
        Ok(())
    }

    /// Descriptor parameters with no catalog entry. These are skipped when
    /// sampling.
    pub fn uncatalogued_params(&self) -> Vec<(&str, &str)> {
        self.algorithms
            .iter()
            .flat_map(|d| {
                d.params
                    .iter()
                    .filter(|p| self.values.get(p).is_none())
                    .map(move |p| (d.algorithm.as_str(), p.as_str()))
            })
            .collect()
    }
}

/// Search space validation errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchSpaceError {
    #[error("Search space has no algorithm descriptors")]
    NoAlgorithms,
    #[error("Parameter value catalog is empty")]
    EmptyCatalog,
    #[error("Parameter '{0}' has an empty value list")]
    EmptyValues(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_map_insert_keeps_position() {
        let mut map = ParamMap::new();
        map.insert("a", ParamValue::Int(1));
        map.insert("b", ParamValue::Int(2));
        let old = map.insert("a", ParamValue::Int(3));

        assert_eq!(old, Some(ParamValue::Int(1)));
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&ParamValue::Int(3)));
    }

    #[test]
    fn test_param_map_json_preserves_order() {
        let map: ParamMap = serde_json::from_str(r#"{"z": 1, "a": 0.5, "m": "pam"}"#).unwrap();
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["z", "a", "m"]);
        assert_eq!(map.get("z"), Some(&ParamValue::Int(1)));
        assert_eq!(map.get("a"), Some(&ParamValue::Float(0.5)));
        assert_eq!(map.get("m"), Some(&ParamValue::from("pam")));

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"z":1,"a":0.5,"m":"pam"}"#);
    }

    #[test]
    fn test_param_value_untagged() {
        let values: Vec<ParamValue> = serde_json::from_str(r#"[true, 3, 0.1, "l2"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Bool(true),
                ParamValue::Int(3),
                ParamValue::Float(0.1),
                ParamValue::from("l2"),
            ]
        );
        assert_eq!(values[1].as_float(), Some(3.0));
        assert_eq!(values[2].as_int(), None);
    }

    #[test]
    fn test_default_space_valid() {
        let space = SearchSpace::default();
        assert!(space.validate().is_ok());
        assert!(space.uncatalogued_params().is_empty());
        assert!(space.values.allows("method", &ParamValue::from("pam")));
        assert!(!space.values.allows("method", &ParamValue::from("build")));
    }

    #[test]
    fn test_validation_rejects_empty_space() {
        let mut space = SearchSpace::default();
        space.algorithms.clear();
        assert!(matches!(
            space.validate(),
            Err(SearchSpaceError::NoAlgorithms)
        ));

        let space = SearchSpace {
            values: ParamCatalog::new(),
            ..SearchSpace::default()
        };
        assert!(matches!(space.validate(), Err(SearchSpaceError::EmptyCatalog)));

        let space = SearchSpace {
            values: ParamCatalog::new().with("eps", vec![]),
            ..SearchSpace::default()
        };
        assert!(matches!(
            space.validate(),
            Err(SearchSpaceError::EmptyValues(name)) if name == "eps"
        ));
    }

    #[test]
    fn test_uncatalogued_params() {
        let space = SearchSpace {
            algorithms: vec![AlgorithmDescriptor::new("KMeans", &["n_clusters", "init"])],
            values: ParamCatalog::new().with("n_clusters", ints(&[2, 3])),
        };
        assert_eq!(space.uncatalogued_params(), vec![("KMeans", "init")]);
    }

    #[test]
    fn test_search_space_serialization() {
        let space = SearchSpace::default();
        let json = serde_json::to_string(&space).unwrap();
        let parsed: SearchSpace = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, space);
    }
}
