//! Conversions between a flat detection stream and ordered scans.
//!
//! Detections arrive as one stream with timestamps. The grid algorithm needs
//! them grouped into scans on a regular time axis, and its labels have to be
//! mapped back onto the stream afterwards.

use crate::config::RadarConfig;
use crate::core::detections::Detection;
use crate::error::{invalid_param, ClusterError, Result};
use crate::processors::occupancy::ScanOccupancy;

/// Convert timestamps (seconds) to fractional scan indices.
///
/// The scan cadence is the smallest gap between distinct timestamps; the
/// earliest timestamp maps to index 0. With fewer than two distinct
/// timestamps every detection is in scan 0.
///
/// # Errors
///
/// Returns `InvalidParams` if a timestamp is not finite.
pub fn time_sec_to_index(times: &[f64]) -> Result<Vec<f64>> {
    if let Some(bad) = times.iter().find(|t| !t.is_finite()) {
        return Err(invalid_param(
            "time_sec",
            format!("timestamps must be finite, got {}", bad),
        ));
    }

    let mut unique: Vec<f64> = times.to_vec();
    unique.sort_by(f64::total_cmp);
    unique.dedup();

    let Some(&t0) = unique.first() else {
        return Ok(Vec::new());
    };
    let cadence = unique
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(f64::INFINITY, f64::min);
    if !cadence.is_finite() {
        return Ok(vec![0.0; times.len()]);
    }

    Ok(times.iter().map(|&t| (t - t0) / cadence).collect())
}

/// Detections grouped into consecutive scans.
#[derive(Debug, Clone)]
pub struct ScanAssembly {
    /// Occupancy of each scan; scans without detections are kept empty.
    pub scans: Vec<ScanOccupancy>,
    /// Stream indices of the detections of each scan, in stream order.
    pub members: Vec<Vec<usize>>,
    stream_len: usize,
}

impl ScanAssembly {
    #[inline]
    pub fn num_scans(&self) -> usize {
        self.scans.len()
    }

    /// Map per-scan labels back to one label per stream detection.
    ///
    /// `scan_labels[s][k]` is the label of `members[s][k]`.
    ///
    /// # Errors
    ///
    /// Returns `ScanCountMismatch` if `scan_labels` does not have one entry
    /// per scan, or `LengthMismatch` if a scan's labels differ in length
    /// from its detections.
    pub fn reproject(&self, scan_labels: &[Vec<i32>]) -> Result<Vec<i32>> {
        if scan_labels.len() != self.members.len() {
            return Err(ClusterError::ScanCountMismatch {
                expected: self.members.len(),
                found: scan_labels.len(),
            });
        }

        let mut labels = vec![0; self.stream_len];
        for (members, scan) in self.members.iter().zip(scan_labels) {
            if members.len() != scan.len() {
                return Err(ClusterError::LengthMismatch {
                    gates_len: members.len(),
                    beams_len: scan.len(),
                });
            }
            for (&index, &label) in members.iter().zip(scan) {
                labels[index] = label;
            }
        }
        Ok(labels)
    }
}

/// Upper bound on assembled scans per distinct timestamp.
///
/// Gap filling is meant for a few dropped scans. A cadence far below the real
/// scan period (one jittered timestamp) would otherwise allocate a grid for
/// every tiny period.
pub const MAX_SCANS_PER_TIMESTAMP: usize = 100;

/// Group a detection stream into scans on a regular time axis.
///
/// Each detection goes to the scan at its rounded time index. Missing scans
/// between the first and last are inserted empty so that the scan window of
/// the grid algorithm counts in scan periods.
///
/// # Errors
///
/// Returns `OutOfRange` (with the stream index) for a detection outside the
/// radar grid. Returns `InvalidParams` for non-finite timestamps, or when the
/// cadence would need more than [`MAX_SCANS_PER_TIMESTAMP`] scans per
/// distinct timestamp.
pub fn assemble_scans(stream: &[Detection], radar: &RadarConfig) -> Result<ScanAssembly> {
    if stream.is_empty() {
        return Ok(ScanAssembly {
            scans: Vec::new(),
            members: Vec::new(),
            stream_len: 0,
        });
    }

    let times: Vec<f64> = stream.iter().map(|d| d.time_sec).collect();
    let index = time_sec_to_index(&times)?;

    let mut distinct = times.clone();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    let limit = distinct.len().saturating_mul(MAX_SCANS_PER_TIMESTAMP);

    // `last < limit` keeps the float to usize casts below in range
    let last = index.iter().map(|t| t.round()).fold(0.0, f64::max);
    let num_scans = if last < limit as f64 {
        (last as usize).checked_add(1)
    } else {
        None
    };
    let Some(num_scans) = num_scans.filter(|&n| n <= limit) else {
        return Err(invalid_param(
            "time_sec",
            format!(
                "{} distinct timestamps would span {:e} scan periods (limit {})",
                distinct.len(),
                last + 1.0,
                limit
            ),
        ));
    };

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); num_scans];
    for (i, &t) in index.iter().enumerate() {
        members[t.round() as usize].push(i);
    }
    let non_empty = members.iter().filter(|m| !m.is_empty()).count();

    let mut scans = Vec::with_capacity(num_scans);
    for indices in &members {
        let gates: Vec<usize> = indices.iter().map(|&i| stream[i].gate).collect();
        let beams: Vec<usize> = indices.iter().map(|&i| stream[i].beam).collect();
        let occupancy = ScanOccupancy::new(&gates, &beams, radar.nrang, radar.nbeam)
            .map_err(|e| match e {
                ClusterError::OutOfRange {
                    index,
                    gate,
                    beam,
                    nrang,
                    nbeam,
                } => ClusterError::OutOfRange {
                    index: indices[index],
                    gate,
                    beam,
                    nrang,
                    nbeam,
                },
                other => other,
            })?;
        scans.push(occupancy);
    }

    log::debug!(
        "assembled {} detections into {} scans ({} non-empty)",
        stream.len(),
        scans.len(),
        non_empty
    );

    Ok(ScanAssembly {
        scans,
        members,
        stream_len: stream.len(),
    })
}
