//! Configuration types for grid-based clustering.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{invalid_param, ClusterError};

/// Radar grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarConfig {
    /// Number of range gates along each beam
    #[serde(default = "default_nrang")]
    pub nrang: usize,

    /// Number of beams in a scan
    #[serde(default = "default_nbeam")]
    pub nbeam: usize,
}

fn default_nrang() -> usize {
    75
}

fn default_nbeam() -> usize {
    16
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            nrang: default_nrang(),
            nbeam: default_nbeam(),
        }
    }
}

/// Parameters of one grid-based DBSCAN run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Radial size of a range gate (km)
    #[serde(default = "default_dr")]
    pub dr: f64,

    /// Angular width of a beam (degrees)
    #[serde(default = "default_dtheta")]
    pub dtheta: f64,

    /// Range of the first gate (km)
    #[serde(default = "default_r_init")]
    pub r_init: f64,

    /// Ellipse height in gates
    #[serde(default = "default_g")]
    pub g: f64,

    /// Scaling factor applied to the ellipse width
    #[serde(default = "default_f")]
    pub f: f64,

    /// Fraction of possible neighbours that must be occupied for a core cell
    #[serde(default = "default_pts_ratio")]
    pub pts_ratio: f64,

    /// Scans searched on each side of the query scan
    #[serde(default = "default_scan_eps")]
    pub scan_eps: usize,
}

fn default_dr() -> f64 {
    45.0
}

fn default_dtheta() -> f64 {
    3.3
}

fn default_r_init() -> f64 {
    180.0
}

fn default_g() -> f64 {
    1.0
}

fn default_f() -> f64 {
    0.2
}

fn default_pts_ratio() -> f64 {
    0.3
}

fn default_scan_eps() -> usize {
    1
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            dr: default_dr(),
            dtheta: default_dtheta(),
            r_init: default_r_init(),
            g: default_g(),
            f: default_f(),
            pts_ratio: default_pts_ratio(),
            scan_eps: default_scan_eps(),
        }
    }
}

impl ClusterParams {
    /// Check the density parameters `g`, `f` and `pts_ratio`.
    ///
    /// Geometry fields (`dr`, `dtheta`, `r_init`) are checked when the
    /// [`RatioGeometry`](crate::processors::geometry::RatioGeometry) is built.
    pub fn validate(&self) -> Result<(), ClusterError> {
        for (name, value) in [("g", self.g), ("f", self.f), ("pts_ratio", self.pts_ratio)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid_param(
                    name,
                    format!("must be positive and finite, got {}", value),
                ));
            }
        }
        Ok(())
    }

    /// Angular beam width in radians.
    #[inline]
    pub fn dtheta_rad(&self) -> f64 {
        self.dtheta.to_radians()
    }
}

/// Options for the matrix-based density backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityConfig {
    /// Backend method name ("dbscan" or "st_dbscan")
    #[serde(default = "default_method")]
    pub method: String,

    /// Method options forwarded to the backend
    #[serde(default = "default_options")]
    pub options: HashMap<String, f64>,
}

fn default_method() -> String {
    "st_dbscan".to_string()
}

fn default_options() -> HashMap<String, f64> {
    let mut options = HashMap::new();
    options.insert("eps_space".to_string(), 2.0);
    options.insert("eps_time".to_string(), 1.0);
    options.insert("min_samples".to_string(), 5.0);
    options
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            options: default_options(),
        }
    }
}

/// Main configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub radar: RadarConfig,

    #[serde(default)]
    pub clustering: ClusterParams,

    #[serde(default)]
    pub density: DensityConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: PipelineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config
            .clustering
            .validate()
            .with_context(|| format!("invalid clustering section in {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(())
    }
}
