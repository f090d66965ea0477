//! Clustering modules.

pub mod backend;
pub mod expansion;
pub mod gbdbscan;
pub mod geometry;
pub mod occupancy;
pub mod region;
pub mod runner;

// Re-export key types for convenience
pub use backend::{
    backend_for, backend_from_config, fit_detections, BackendError, BackendOutput,
    ClusteringBackend, DensityBackend, SkillEvaluator,
};
pub use expansion::{expand_cluster, LabelGrid, NOISE, UNCLASSIFIED};
pub use gbdbscan::{cluster_scans, ClusterSummary, Clustering, GridBasedDbscan};
pub use geometry::RatioGeometry;
pub use occupancy::{CellId, ScanOccupancy};
pub use region::{ellipse_axes, region_query, Neighborhood, ScanCell};
pub use runner::{cluster_batches, cluster_detections, sweep_params};
