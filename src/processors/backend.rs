//! Matrix-based clustering backends.
//!
//! The grid-based algorithm works on the sensor grid directly. Other
//! algorithms take a feature matrix (one row per detection, see
//! [`feature_matrix`]) and are reached through the [`ClusteringBackend`]
//! trait, selected by method name with [`backend_for`].
//!
//! The crate ships one backend, [`DensityBackend`]: point DBSCAN over up to
//! three feature columns, optionally gated by a time column (ST-DBSCAN).
//! Neighbourhoods come from a `kiddo` KD-tree, queried in parallel with
//! `rayon`; clusters then grow by the same FIFO expansion the grid algorithm
//! uses, so labels follow the same conventions.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use radar_gbdbscan::processors::backend::backend_for;
//!
//! let mut options = HashMap::new();
//! options.insert("eps".to_string(), 1.5);
//! options.insert("min_samples".to_string(), 2.0);
//!
//! let backend = backend_for("dbscan", &options).unwrap();
//! let data = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![50.0, 50.0]];
//! let output = backend.fit(&data).unwrap();
//! assert_eq!(output.labels, vec![1, 1, -1]);
//! ```

use std::collections::{HashMap, VecDeque};

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::DensityConfig;
use crate::core::detections::{feature_matrix, Detection, FeatureColumn};
use crate::error::ClusterError;
use crate::processors::expansion::{NOISE, UNCLASSIFIED};

/// Errors raised by clustering backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("input matrix has no rows")]
    EmptyInput,

    #[error("unsupported clustering method: {0}")]
    UnsupportedMethod(String),

    #[error("invalid option '{name}': {message}")]
    InvalidOption { name: String, message: String },

    #[error("row {row} has {found} columns, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("cannot build feature matrix: {0}")]
    Features(#[from] ClusterError),
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Labels returned by a backend, one per input row.
///
/// Labels follow the crate convention: `-1` for noise, clusters from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOutput {
    pub labels: Vec<i32>,
    /// Per-row noise flags, for methods that report them.
    pub noise: Option<Vec<bool>>,
}

/// A clustering algorithm over a feature matrix.
pub trait ClusteringBackend: Send + Sync {
    /// Method name this backend answers to.
    fn method(&self) -> &'static str;

    /// Cluster the rows of `data`.
    fn fit(&self, data: &[Vec<f32>]) -> Result<BackendOutput>;
}

/// Cluster-validity scoring of a labelled feature matrix.
///
/// Integration point for downstream scoring (silhouette, Calinski-Harabasz
/// and the like). The crate defines the signature only and ships no
/// implementation.
pub trait SkillEvaluator {
    /// Score names mapped to values.
    fn evaluate(&self, data: &[Vec<f32>], labels: &[i32]) -> Result<HashMap<String, f64>>;
}

/// Build the backend registered under `method`.
///
/// # Arguments
///
/// * `method` - `"dbscan"` or `"st_dbscan"`
/// * `options` - Method options. `dbscan` takes `eps` and `min_samples`;
///   `st_dbscan` takes `eps_space`, `eps_time`, `min_samples` and
///   `time_column` (defaults to the last column).
///
/// # Errors
///
/// `UnsupportedMethod` for unknown names, `InvalidOption` for unknown keys
/// or out-of-range values.
pub fn backend_for(
    method: &str,
    options: &HashMap<String, f64>,
) -> Result<Box<dyn ClusteringBackend>> {
    match method {
        "dbscan" => {
            check_keys(options, &["eps", "min_samples"])?;
            let eps = positive(options, "eps", 0.5)?;
            let min_samples = min_samples(options, 5)?;
            Ok(Box::new(DensityBackend::spatial(eps, min_samples)))
        }
        "st_dbscan" => {
            check_keys(
                options,
                &["eps_space", "eps_time", "min_samples", "time_column"],
            )?;
            let eps_space = positive(options, "eps_space", 2.0)?;
            let eps_time = positive(options, "eps_time", 1.0)?;
            let min_samples = min_samples(options, 5)?;
            let time_column = match options.get("time_column") {
                Some(&value) => Some(index_option("time_column", value)?),
                None => None,
            };
            Ok(Box::new(DensityBackend::spatio_temporal(
                eps_space,
                eps_time,
                min_samples,
                time_column,
            )))
        }
        other => Err(BackendError::UnsupportedMethod(other.to_string())),
    }
}

/// Build the backend described by the `density` section of a pipeline config.
pub fn backend_from_config(config: &DensityConfig) -> Result<Box<dyn ClusteringBackend>> {
    backend_for(&config.method, &config.options)
}

/// Cluster a detection stream with a matrix backend.
///
/// The feature matrix holds `columns` in the given order; for `st_dbscan`
/// without an explicit `time_column`, put [`FeatureColumn::TimeIndex`] last.
/// Returns one label per detection in stream order.
pub fn fit_detections(
    backend: &dyn ClusteringBackend,
    stream: &[Detection],
    columns: &[FeatureColumn],
) -> Result<BackendOutput> {
    let data = feature_matrix(stream, columns)?;
    log::debug!(
        "{}: {} detections over columns {:?}",
        backend.method(),
        data.len(),
        columns
    );
    backend.fit(&data)
}

fn check_keys(options: &HashMap<String, f64>, allowed: &[&str]) -> Result<()> {
    let mut keys: Vec<&String> = options.keys().collect();
    keys.sort();
    for key in keys {
        if !allowed.contains(&key.as_str()) {
            return Err(BackendError::InvalidOption {
                name: key.clone(),
                message: format!("not one of {:?}", allowed),
            });
        }
    }
    Ok(())
}

fn positive(options: &HashMap<String, f64>, name: &str, default: f64) -> Result<f32> {
    let value = options.get(name).copied().unwrap_or(default);
    if !value.is_finite() || value <= 0.0 {
        return Err(BackendError::InvalidOption {
            name: name.to_string(),
            message: format!("must be positive, got {}", value),
        });
    }
    Ok(value as f32)
}

fn index_option(name: &str, value: f64) -> Result<usize> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(BackendError::InvalidOption {
            name: name.to_string(),
            message: format!("must be a non-negative integer, got {}", value),
        });
    }
    Ok(value as usize)
}

fn min_samples(options: &HashMap<String, f64>, default: usize) -> Result<usize> {
    let value = match options.get("min_samples") {
        Some(&value) => index_option("min_samples", value)?,
        None => default,
    };
    if value == 0 {
        return Err(BackendError::InvalidOption {
            name: "min_samples".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

/// Density clustering of feature rows, optionally with a time column.
///
/// Rows are neighbours if they are within `eps_space` over the spatial
/// columns and within `eps_time` on the time column. A core row has at least
/// `min_samples` neighbours, itself included.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityBackend {
    eps_space: f32,
    eps_time: f32,
    min_samples: usize,
    temporal: bool,
    time_column: Option<usize>,
}

impl DensityBackend {
    /// Plain DBSCAN over every column.
    pub fn spatial(eps: f32, min_samples: usize) -> Self {
        Self {
            eps_space: eps,
            eps_time: f32::INFINITY,
            min_samples,
            temporal: false,
            time_column: None,
        }
    }

    /// ST-DBSCAN; `time_column` defaults to the last column.
    pub fn spatio_temporal(
        eps_space: f32,
        eps_time: f32,
        min_samples: usize,
        time_column: Option<usize>,
    ) -> Self {
        Self {
            eps_space,
            eps_time,
            min_samples,
            temporal: true,
            time_column,
        }
    }

    /// Split rows into zero-padded 3D coordinates and times.
    fn split_columns(&self, data: &[Vec<f32>]) -> Result<(Vec<[f32; 3]>, Vec<f32>)> {
        let width = data[0].len();
        if let Some((row, found)) = data
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != width)
            .map(|(i, r)| (i, r.len()))
        {
            return Err(BackendError::DimensionMismatch {
                row,
                expected: width,
                found,
            });
        }

        let time_column = if self.temporal {
            let column = self.time_column.unwrap_or(width.saturating_sub(1));
            if column >= width {
                return Err(BackendError::InvalidOption {
                    name: "time_column".to_string(),
                    message: format!("column {} outside {} columns", column, width),
                });
            }
            Some(column)
        } else {
            None
        };

        let spatial_width = width - usize::from(time_column.is_some());
        if spatial_width == 0 || spatial_width > 3 {
            return Err(BackendError::InvalidOption {
                name: "columns".to_string(),
                message: format!("need 1 to 3 spatial columns, got {}", spatial_width),
            });
        }

        let mut coords = Vec::with_capacity(data.len());
        let mut times = Vec::with_capacity(data.len());
        for row in data {
            let mut coord = [0.0f32; 3];
            let spatial = row
                .iter()
                .enumerate()
                .filter(|&(column, _)| Some(column) != time_column);
            for (axis, (_, &value)) in spatial.enumerate() {
                coord[axis] = value;
            }
            coords.push(coord);
            times.push(time_column.map_or(0.0, |c| row[c]));
        }
        Ok((coords, times))
    }

    /// Neighbour lists of every row, ascending, each row included in its own.
    fn neighborhoods(&self, coords: &[[f32; 3]], times: &[f32]) -> Vec<Vec<usize>> {
        let tree: ImmutableKdTree<f32, 3> = ImmutableKdTree::new_from_slice(coords);
        let radius_sq = self.eps_space * self.eps_space;

        coords
            .par_iter()
            .zip(times.par_iter())
            .map(|(coord, &time)| {
                let mut found: Vec<usize> = tree
                    .within::<SquaredEuclidean>(coord, radius_sq)
                    .into_iter()
                    .map(|nn| nn.item as usize)
                    .filter(|&j| (times[j] - time).abs() <= self.eps_time)
                    .collect();
                found.sort_unstable();
                found
            })
            .collect()
    }
}

impl ClusteringBackend for DensityBackend {
    fn method(&self) -> &'static str {
        if self.temporal {
            "st_dbscan"
        } else {
            "dbscan"
        }
    }

    fn fit(&self, data: &[Vec<f32>]) -> Result<BackendOutput> {
        if data.is_empty() {
            return Err(BackendError::EmptyInput);
        }
        let (coords, times) = self.split_columns(data)?;
        let neighbors = self.neighborhoods(&coords, &times);
        let labels = expand_rows(&neighbors, self.min_samples);

        let clusters = labels.iter().copied().max().unwrap_or(0).max(0);
        log::debug!(
            "{}: {} clusters over {} rows",
            self.method(),
            clusters,
            labels.len()
        );

        let noise = labels.iter().map(|&l| l == NOISE).collect();
        Ok(BackendOutput {
            labels,
            noise: Some(noise),
        })
    }
}

/// Label rows from precomputed neighbourhoods.
///
/// Rows are visited in index order. An unvisited core row starts a cluster
/// that grows through core rows in FIFO order; non-core rows it reaches
/// become border rows, reclaiming noise. As in the grid algorithm, a row
/// already in a cluster keeps its label.
fn expand_rows(neighbors: &[Vec<usize>], min_samples: usize) -> Vec<i32> {
    let is_core = |row: usize| neighbors[row].len() >= min_samples;
    let mut labels = vec![UNCLASSIFIED; neighbors.len()];
    let mut queue = VecDeque::new();
    let mut next_cluster_id: i32 = 1;

    for seed in 0..neighbors.len() {
        if labels[seed] != UNCLASSIFIED {
            continue;
        }
        if !is_core(seed) {
            labels[seed] = NOISE;
            continue;
        }

        labels[seed] = next_cluster_id;
        queue.push_back(seed);
        while let Some(row) = queue.pop_front() {
            if !is_core(row) {
                continue;
            }
            for &neighbor in &neighbors[row] {
                match labels[neighbor] {
                    UNCLASSIFIED => {
                        labels[neighbor] = next_cluster_id;
                        queue.push_back(neighbor);
                    }
                    NOISE => labels[neighbor] = next_cluster_id,
                    _ => {}
                }
            }
        }
        next_cluster_id += 1;
    }
    labels
}
