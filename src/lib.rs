//! Grid-based, time-windowed DBSCAN for radar backscatter.
//!
//! This crate provides tools for:
//! - Grouping a timestamped detection stream into scans on a (gate, beam) grid
//! - Range-aware elliptical neighbourhoods over a window of adjacent scans
//! - Cluster expansion with a density threshold scaled to the ellipse size
//! - Running independent clusterings in parallel
//! - A KD-tree DBSCAN / ST-DBSCAN backend over arbitrary feature columns
//!
//! # Example
//!
//! ```
//! use radar_gbdbscan::{cluster_detections, ClusterParams, Detection, RadarConfig};
//!
//! let stream: Vec<Detection> = (0..4).map(|g| Detection::at(0.0, 7, 30 + g)).collect();
//! let params = ClusterParams {
//!     g: 2.0,
//!     f: 10.0,
//!     pts_ratio: 0.3,
//!     scan_eps: 0,
//!     ..Default::default()
//! };
//!
//! let labels = cluster_detections(&stream, &RadarConfig::default(), &params).unwrap();
//! assert_eq!(labels, vec![1, 1, 1, 1]);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod processors;

pub use config::{ClusterParams, DensityConfig, PipelineConfig, RadarConfig};
pub use core::{assemble_scans, Detection, ScanAssembly};
pub use error::ClusterError;
pub use processors::{
    cluster_detections, Clustering, GridBasedDbscan, RatioGeometry, ScanOccupancy, NOISE,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
