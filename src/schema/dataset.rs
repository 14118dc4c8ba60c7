//! In-memory tabular dataset shared read-only by every candidate fit.

use std::fs;
use std::io;
use std::path::Path;

use rand::prelude::*;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Row-major matrix of observations (rows) by features (columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    n_rows: usize,
    n_cols: usize,
    values: Vec<f64>,
}

impl Dataset {
    /// Build from rows. All rows must have the same non-zero length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, DatasetError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        if n_rows == 0 || n_cols == 0 {
            return Err(DatasetError::Empty);
        }

        let mut values = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(DatasetError::Ragged {
                    row: i,
                    expected: n_cols,
                    found: row.len(),
                });
            }
            if let Some(col) = row.iter().position(|v| !v.is_finite()) {
                return Err(DatasetError::NonFinite { row: i, col });
            }
            values.extend(row);
        }

        Ok(Self {
            n_rows,
            n_cols,
            values,
        })
    }

    /// Parse comma-separated numeric values. A first line that does not
    /// parse as numbers is treated as a header.
    pub fn from_csv_str(content: &str) -> Result<Self, DatasetError> {
        let mut rows = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let parsed: Result<Vec<f64>, _> =
                line.split(',').map(|f| f.trim().parse::<f64>()).collect();
            match parsed {
                Ok(row) => rows.push(row),
                Err(_) if rows.is_empty() && line_no == 0 => continue,
                Err(_) => {
                    return Err(DatasetError::Parse {
                        line: line_no + 1,
                        content: line.to_string(),
                    });
                }
            }
        }
        Self::from_rows(rows)
    }

    /// Parse a JSON array of numeric arrays.
    pub fn from_json_str(content: &str) -> Result<Self, DatasetError> {
        let rows: Vec<Vec<f64>> = serde_json::from_str(content)?;
        Self::from_rows(rows)
    }

    /// Load a `.csv` or `.json` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_csv_str(&content),
        }
    }

    /// Generate isotropic Gaussian blobs around the given centers.
    pub fn gaussian_blobs(
        centers: &[Vec<f64>],
        per_center: usize,
        std_dev: f64,
        seed: u64,
    ) -> Result<Self, DatasetError> {
        if !(std_dev >= 0.0 && std_dev.is_finite()) {
            return Err(DatasetError::InvalidStdDev(std_dev));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, std_dev).map_err(|_| DatasetError::InvalidStdDev(std_dev))?;

        let rows: Vec<Vec<f64>> = centers
            .iter()
            .flat_map(|center| std::iter::repeat_n(center, per_center))
            .map(|center| center.iter().map(|c| c + noise.sample(&mut rng)).collect())
            .collect();

        Self::from_rows(rows)
    }

    /// Swap rows and columns.
    pub fn transpose(&self) -> Self {
        let mut values = Vec::with_capacity(self.values.len());
        for c in 0..self.n_cols {
            for r in 0..self.n_rows {
                values.push(self.values[r * self.n_cols + c]);
            }
        }
        Self {
            n_rows: self.n_cols,
            n_cols: self.n_rows,
            values,
        }
    }

    /// Number of observations.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of features.
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.n_cols)
    }
}

/// Dataset construction and loading errors.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset has no rows or no columns")]
    Empty,
    #[error("Row {row} has {found} columns, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Non-finite value at row {row}, column {col}")]
    NonFinite { row: usize, col: usize },
    #[error("Line {line} is not numeric: {content}")]
    Parse { line: usize, content: String },
    #[error("Invalid standard deviation: {0}")]
    InvalidStdDev(f64),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_from_rows() {
        let data = Dataset::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(data.n_rows(), 3);
        assert_eq!(data.n_cols(), 2);
        assert_eq!(data.row(1), &[3.0, 4.0]);
        assert_eq!(data.rows().count(), 3);
    }

    #[test]
    fn test_from_rows_rejects_bad_shapes() {
        assert!(matches!(Dataset::from_rows(vec![]), Err(DatasetError::Empty)));
        assert!(matches!(
            Dataset::from_rows(vec![vec![1.0, 2.0], vec![3.0]]),
            Err(DatasetError::Ragged { row: 1, .. })
        ));
        assert!(matches!(
            Dataset::from_rows(vec![vec![1.0, f64::NAN]]),
            Err(DatasetError::NonFinite { row: 0, col: 1 })
        ));
    }

    #[test]
    fn test_transpose() {
        let data = Dataset::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        let t = data.transpose();
        assert_eq!(t.n_rows(), 3);
        assert_eq!(t.n_cols(), 2);
        assert_eq!(t.row(0), &[1.0, 4.0]);
        assert_eq!(t.row(2), &[3.0, 6.0]);
        assert_eq!(t.transpose(), data);
    }

    #[test]
    fn test_csv_with_header() {
        let data = Dataset::from_csv_str("x,y\n1,2\n3.5, 4\n\n").unwrap();
        assert_eq!(data.n_rows(), 2);
        assert_eq!(data.row(1), &[3.5, 4.0]);

        assert!(matches!(
            Dataset::from_csv_str("1,2\nfoo,3\n"),
            Err(DatasetError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_load_files() {
        let dir = tempdir().unwrap();

        let csv_path = dir.path().join("data.csv");
        let mut file = fs::File::create(&csv_path).unwrap();
        writeln!(file, "a,b\n0,0\n1,1").unwrap();
        let csv = Dataset::load(&csv_path).unwrap();
        assert_eq!(csv.n_rows(), 2);

        let json_path = dir.path().join("data.json");
        fs::write(&json_path, "[[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]").unwrap();
        let json = Dataset::load(&json_path).unwrap();
        assert_eq!(json.n_cols(), 3);

        assert!(matches!(
            Dataset::load(dir.path().join("missing.csv")),
            Err(DatasetError::Io(_))
        ));
    }

    #[test]
    fn test_gaussian_blobs() {
        let centers = vec![vec![0.0, 0.0], vec![10.0, 10.0]];
        let data = Dataset::gaussian_blobs(&centers, 25, 0.5, 7).unwrap();
        assert_eq!(data.n_rows(), 50);
        assert_eq!(data.n_cols(), 2);

        // Points stay near their own center
        assert!(data.rows().take(25).all(|r| r[0] < 5.0));
        assert!(data.rows().skip(25).all(|r| r[0] > 5.0));

        let again = Dataset::gaussian_blobs(&centers, 25, 0.5, 7).unwrap();
        assert_eq!(data, again);

        assert!(matches!(
            Dataset::gaussian_blobs(&centers, 5, -1.0, 0),
            Err(DatasetError::InvalidStdDev(_))
        ));
        assert!(matches!(
            Dataset::gaussian_blobs(&centers, 5, f64::NAN, 0),
            Err(DatasetError::InvalidStdDev(_))
        ));
        assert!(Dataset::gaussian_blobs(&centers, 5, 0.0, 0).is_ok());
    }
}
