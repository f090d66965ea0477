//! Detection streams and their conversion to scans.

pub mod detections;
pub mod transforms;

pub use detections::{feature_matrix, Detection, FeatureColumn};
pub use transforms::{assemble_scans, time_sec_to_index, ScanAssembly};
