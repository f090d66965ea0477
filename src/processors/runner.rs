//! Running grid-based DBSCAN over detection streams and independent batches.
//!
//! A single run is sequential. Independent runs (other radars, time windows
//! or parameter sets) share nothing mutable and are spread over the rayon
//! thread pool; runs on the same radar borrow one [`RatioGeometry`].

use rayon::prelude::*;

use crate::config::{ClusterParams, RadarConfig};
use crate::core::detections::Detection;
use crate::core::transforms::assemble_scans;
use crate::error::Result;
use crate::processors::gbdbscan::{Clustering, GridBasedDbscan};
use crate::processors::geometry::RatioGeometry;
use crate::processors::occupancy::ScanOccupancy;

/// Cluster a detection stream and return one label per detection in stream order.
///
/// # Example
///
/// ```
/// use radar_gbdbscan::config::{ClusterParams, RadarConfig};
/// use radar_gbdbscan::core::detections::Detection;
/// use radar_gbdbscan::processors::runner::cluster_detections;
///
/// let stream = vec![
///     Detection::at(0.0, 3, 20),
///     Detection::at(0.0, 3, 21),
///     Detection::at(60.0, 3, 20),
/// ];
/// let params = ClusterParams::default();
/// let labels = cluster_detections(&stream, &RadarConfig::default(), &params).unwrap();
/// assert_eq!(labels.len(), 3);
/// ```
pub fn cluster_detections(
    stream: &[Detection],
    radar: &RadarConfig,
    params: &ClusterParams,
) -> Result<Vec<i32>> {
    let geometry = RatioGeometry::from_config(radar, params)?;
    let algo = GridBasedDbscan::new(*params, &geometry)?;
    let assembly = assemble_scans(stream, radar)?;
    let clustering = algo.fit(&assembly.scans)?;
    assembly.reproject(&clustering.scan_labels)
}

/// Cluster independent scan batches in parallel.
///
/// Results are returned in batch order; one failing batch does not affect
/// the others.
pub fn cluster_batches(
    batches: &[Vec<ScanOccupancy>],
    params: &ClusterParams,
    geometry: &RatioGeometry,
) -> Vec<Result<Clustering>> {
    log::debug!("clustering {} batches in parallel", batches.len());
    batches
        .par_iter()
        .map(|scans| GridBasedDbscan::new(*params, geometry)?.fit(scans))
        .collect()
}

/// Run one parameter set per entry over the same scans, in parallel.
pub fn sweep_params(
    scans: &[ScanOccupancy],
    param_sets: &[ClusterParams],
    geometry: &RatioGeometry,
) -> Vec<Result<Clustering>> {
    param_sets
        .par_iter()
        .map(|params| GridBasedDbscan::new(*params, geometry)?.fit(scans))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClusterError;
    use crate::processors::expansion::NOISE;

    fn params(pts_ratio: f64) -> ClusterParams {
        ClusterParams {
            g: 2.0,
            f: 10.0,
            pts_ratio,
            scan_eps: 1,
            ..ClusterParams::default()
        }
    }

    fn batch(offset: usize) -> Vec<ScanOccupancy> {
        (0..3)
            .map(|t| {
                let gates = [offset, offset + 1, offset + 2, (offset + 7 * t) % 30];
                let beams = [t % 16, t % 16, t % 16, 9];
                ScanOccupancy::new(&gates, &beams, 30, 16).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_batches_match_sequential_runs() {
        let p = params(0.2);
        let geom = RatioGeometry::new(30, 16, p.dtheta_rad(), p.dr, p.r_init).unwrap();
        let batches: Vec<Vec<ScanOccupancy>> = (0..6).map(|i| batch(i * 3)).collect();

        let parallel = cluster_batches(&batches, &p, &geom);
        assert_eq!(parallel.len(), batches.len());

        for (scans, result) in batches.iter().zip(parallel) {
            let sequential = GridBasedDbscan::new(p, &geom).unwrap().fit(scans).unwrap();
            assert_eq!(result.unwrap(), sequential);
        }
    }

    #[test]
    fn test_batch_errors_are_isolated() {
        let p = params(0.2);
        let geom = RatioGeometry::new(30, 16, p.dtheta_rad(), p.dr, p.r_init).unwrap();
        let batches = vec![batch(0), vec![ScanOccupancy::empty(10, 16)]];

        let results = cluster_batches(&batches, &p, &geom);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ClusterError::GridMismatch { .. })));
    }

    #[test]
    fn test_sweep_params_noise_is_monotonic() {
        let p = params(0.1);
        let geom = RatioGeometry::new(30, 16, p.dtheta_rad(), p.dr, p.r_init).unwrap();
        let scans = batch(4);
        let sets: Vec<ClusterParams> = [0.1, 0.3, 0.6, 0.9].map(params).to_vec();

        let noise: Vec<usize> = sweep_params(&scans, &sets, &geom)
            .into_iter()
            .map(|r| r.unwrap().summary().noise)
            .collect();
        assert!(noise.windows(2).all(|w| w[0] <= w[1]), "{:?}", noise);
    }

    #[test]
    fn test_cluster_detections_stream_order() {
        let radar = RadarConfig { nrang: 30, nbeam: 16 };
        let p = ClusterParams {
            scan_eps: 0,
            ..params(0.3)
        };
        // A column of three gates in one scan, listed out of time order with
        // an isolated detection from the next scan in between.
        let stream = vec![
            Detection::at(60.0, 2, 10),
            Detection::at(60.0, 2, 11),
            Detection::at(120.0, 9, 25),
            Detection::at(60.0, 2, 12),
        ];

        let labels = cluster_detections(&stream, &radar, &p).unwrap();
        assert_eq!(labels, vec![1, 1, NOISE, 1]);
    }

    #[test]
    fn test_cluster_detections_invalid_params() {
        let p = ClusterParams {
            g: 0.0,
            ..ClusterParams::default()
        };
        let stream = [Detection::at(0.0, 0, 0)];
        let result = cluster_detections(&stream, &RadarConfig::default(), &p);
        assert!(matches!(result, Err(ClusterError::InvalidParams { name: "g", .. })));
    }
}
