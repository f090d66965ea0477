//! Error types shared by the grid clustering components.

use thiserror::Error;

/// Errors raised while validating a clustering run.
///
/// Input and parameter errors are raised before any cell is labelled, so a
/// failed run never yields partial labels.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClusterError {
    /// Radar geometry cannot produce a ratio matrix.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A detection lies outside the (nrang, nbeam) grid.
    #[error("detection {index} at gate {gate}, beam {beam} is outside the {nrang}x{nbeam} grid")]
    OutOfRange {
        index: usize,
        gate: usize,
        beam: usize,
        nrang: usize,
        nbeam: usize,
    },

    /// Clustering parameter outside its valid domain.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParams { name: &'static str, message: String },

    /// Parallel input arrays disagree in length.
    #[error("array length mismatch: {gates_len} gates but {beams_len} beams")]
    LengthMismatch { gates_len: usize, beams_len: usize },

    /// A scan was built for a different grid than the one being clustered.
    #[error("scan {scan} is a {found_nrang}x{found_nbeam} grid, expected {nrang}x{nbeam}")]
    GridMismatch {
        scan: usize,
        found_nrang: usize,
        found_nbeam: usize,
        nrang: usize,
        nbeam: usize,
    },

    /// Label slices handed back for re-projection do not match the scans.
    #[error("expected labels for {expected} scans, got {found}")]
    ScanCountMismatch { expected: usize, found: usize },

    /// The caller raised the cancellation flag between outer-loop cells.
    #[error("clustering run cancelled")]
    Cancelled,
}

/// Result type for clustering operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

pub(crate) fn invalid_param(name: &'static str, message: impl Into<String>) -> ClusterError {
    ClusterError::InvalidParams {
        name,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let err = ClusterError::OutOfRange {
            index: 3,
            gate: 80,
            beam: 2,
            nrang: 75,
            nbeam: 16,
        };
        assert_eq!(
            err.to_string(),
            "detection 3 at gate 80, beam 2 is outside the 75x16 grid"
        );
    }

    #[test]
    fn test_invalid_param_helper() {
        let err = invalid_param("g", "must be positive");
        assert_eq!(err.to_string(), "invalid parameter 'g': must be positive");
    }
}
