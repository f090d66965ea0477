//! Grid-based DBSCAN with a time window.
//!
//! Drives [`expand_cluster`] over every occupied cell of every scan in
//! discovery order and projects the resulting label grid back onto the
//! original detections.
//!
//! # Example
//!
//! ```
//! use radar_gbdbscan::config::ClusterParams;
//! use radar_gbdbscan::processors::geometry::RatioGeometry;
//! use radar_gbdbscan::processors::gbdbscan::GridBasedDbscan;
//! use radar_gbdbscan::processors::occupancy::ScanOccupancy;
//!
//! let params = ClusterParams {
//!     g: 2.0,
//!     f: 1.0,
//!     pts_ratio: 0.1,
//!     scan_eps: 0,
//!     ..Default::default()
//! };
//! let geometry =
//!     RatioGeometry::new(5, 5, params.dtheta_rad(), params.dr, params.r_init).unwrap();
//! let scans = vec![ScanOccupancy::new(&[1, 1, 2, 2], &[1, 2, 1, 2], 5, 5).unwrap()];
//!
//! let clustering = GridBasedDbscan::new(params, &geometry).unwrap().fit(&scans).unwrap();
//! assert_eq!(clustering.labels, vec![1, 1, 1, 1]);
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ClusterParams;
use crate::error::{ClusterError, Result};
use crate::processors::expansion::{expand_cluster, LabelGrid, NOISE, UNCLASSIFIED};
use crate::processors::geometry::RatioGeometry;
use crate::processors::occupancy::ScanOccupancy;
use crate::processors::region::ScanCell;

/// Labels produced by one clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Final label of every (scan, gate, beam) cell.
    pub label_grid: LabelGrid,
    /// One label per detection, grouped by scan in input order.
    pub scan_labels: Vec<Vec<i32>>,
    /// `scan_labels` flattened scan-major.
    pub labels: Vec<i32>,
    /// Number of clusters; ids run from 1 to `n_clusters`.
    pub n_clusters: usize,
}

impl Clustering {
    /// Count noise detections and detections per cluster.
    pub fn summary(&self) -> ClusterSummary {
        ClusterSummary::from_labels(&self.labels)
    }
}

/// Detection counts of a clustering result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSummary {
    pub n_clusters: usize,
    pub noise: usize,
    /// Detections per cluster id.
    pub sizes: BTreeMap<i32, usize>,
}

impl ClusterSummary {
    pub fn from_labels(labels: &[i32]) -> Self {
        let mut summary = ClusterSummary::default();
        for &label in labels {
            if label == NOISE {
                summary.noise += 1;
            } else {
                *summary.sizes.entry(label).or_insert(0) += 1;
            }
        }
        summary.n_clusters = summary.sizes.len();
        summary
    }
}

/// Grid-based DBSCAN bound to one parameter set and geometry.
///
/// The geometry is borrowed so that independent runs can share it.
#[derive(Debug, Clone, Copy)]
pub struct GridBasedDbscan<'g> {
    params: ClusterParams,
    geometry: &'g RatioGeometry,
}

impl<'g> GridBasedDbscan<'g> {
    /// Validate the parameters and bind them to a geometry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParams` for non-positive `g`, `f` or `pts_ratio`.
    pub fn new(params: ClusterParams, geometry: &'g RatioGeometry) -> Result<Self> {
        params.validate()?;
        Ok(Self { params, geometry })
    }

    #[inline]
    pub fn params(&self) -> &ClusterParams {
        &self.params
    }

    #[inline]
    pub fn geometry(&self) -> &'g RatioGeometry {
        self.geometry
    }

    /// Cluster a sequence of scans.
    pub fn fit(&self, scans: &[ScanOccupancy]) -> Result<Clustering> {
        self.run(scans, || false)
    }

    /// Cluster a sequence of scans, stopping early once `cancel` is set.
    ///
    /// The flag is checked before each occupied cell of the outer loop.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if the flag was observed; no labels are returned.
    pub fn fit_with_cancel(
        &self,
        scans: &[ScanOccupancy],
        cancel: &AtomicBool,
    ) -> Result<Clustering> {
        self.run(scans, || cancel.load(Ordering::Relaxed))
    }

    fn check_scans(&self, scans: &[ScanOccupancy]) -> Result<()> {
        let (nrang, nbeam) = (self.geometry.nrang(), self.geometry.nbeam());
        for (scan, occupancy) in scans.iter().enumerate() {
            if occupancy.nrang() != nrang || occupancy.nbeam() != nbeam {
                return Err(ClusterError::GridMismatch {
                    scan,
                    found_nrang: occupancy.nrang(),
                    found_nbeam: occupancy.nbeam(),
                    nrang,
                    nbeam,
                });
            }
        }
        Ok(())
    }

    /// `stop` is polled before each occupied cell of the outer loop.
    fn run(&self, scans: &[ScanOccupancy], mut stop: impl FnMut() -> bool) -> Result<Clustering> {
        self.check_scans(scans)?;

        let total: usize = scans.iter().map(ScanOccupancy::num_detections).sum();
        log::debug!(
            "gbdbscan: {} scans, {} detections, g={} f={} pts_ratio={} scan_eps={}",
            scans.len(),
            total,
            self.params.g,
            self.params.f,
            self.params.pts_ratio,
            self.params.scan_eps
        );

        let (nrang, nbeam) = (self.geometry.nrang(), self.geometry.nbeam());
        let mut label_grid = LabelGrid::for_scans(scans, nrang, nbeam);
        let mut next_cluster_id: i32 = 1;

        for (scan_index, scan) in scans.iter().enumerate() {
            for &cell in scan.occupied_cells() {
                if stop() {
                    log::warn!(
                        "gbdbscan: cancelled at scan {} of {}",
                        scan_index,
                        scans.len()
                    );
                    return Err(ClusterError::Cancelled);
                }

                let seed = ScanCell::new(scan_index, cell);
                if label_grid.get(seed) != UNCLASSIFIED {
                    continue;
                }
                let created = expand_cluster(
                    scans,
                    &mut label_grid,
                    seed,
                    next_cluster_id,
                    &self.params,
                    self.geometry,
                );
                if created {
                    next_cluster_id += 1;
                }
            }
        }

        let scan_labels = reproject(scans, &label_grid);
        let labels: Vec<i32> = scan_labels.iter().flatten().copied().collect();
        let n_clusters = (next_cluster_id - 1) as usize;

        let summary = ClusterSummary::from_labels(&labels);
        log::info!(
            "gbdbscan: {} clusters, {} noise of {} detections",
            n_clusters,
            summary.noise,
            labels.len()
        );
        log::debug!("gbdbscan: cluster sizes {:?}", summary.sizes);

        Ok(Clustering {
            label_grid,
            scan_labels,
            labels,
            n_clusters,
        })
    }
}

/// Read the label of every original detection from the label grid.
///
/// # Panics
///
/// Panics if an occupied cell is still `UNCLASSIFIED`, which would mean the
/// outer loop skipped a cell.
fn reproject(scans: &[ScanOccupancy], label_grid: &LabelGrid) -> Vec<Vec<i32>> {
    scans
        .iter()
        .enumerate()
        .map(|(scan_index, scan)| {
            scan.detection_cells()
                .iter()
                .map(|&cell| {
                    let label = label_grid.get(ScanCell::new(scan_index, cell));
                    assert!(
                        label != UNCLASSIFIED,
                        "cell ({}, {}) of scan {} left unclassified",
                        cell.gate,
                        cell.beam,
                        scan_index
                    );
                    label
                })
                .collect()
        })
        .collect()
}

/// Cluster scans with a one-off geometry built from `nrang`, `nbeam` and `params`.
///
/// Returns one label per detection, scan-major.
pub fn cluster_scans(
    scans: &[ScanOccupancy],
    nrang: usize,
    nbeam: usize,
    params: &ClusterParams,
) -> Result<Vec<i32>> {
    let geometry = RatioGeometry::new(
        nrang,
        nbeam,
        params.dtheta_rad(),
        params.dr,
        params.r_init,
    )?;
    let clustering = GridBasedDbscan::new(*params, &geometry)?.fit(scans)?;
    Ok(clustering.labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_params(pts_ratio: f64, scan_eps: usize) -> ClusterParams {
        ClusterParams {
            g: 2.0,
            f: 1.0,
            pts_ratio,
            scan_eps,
            ..ClusterParams::default()
        }
    }

    /// Ellipse narrower than one beam: a column of 2g+1 gates.
    fn column_params(pts_ratio: f64, scan_eps: usize) -> ClusterParams {
        ClusterParams {
            f: 10.0,
            ..square_params(pts_ratio, scan_eps)
        }
    }

    fn geometry(nrang: usize, nbeam: usize, params: &ClusterParams) -> RatioGeometry {
        RatioGeometry::new(
            nrang,
            nbeam,
            params.dtheta_rad(),
            params.dr,
            params.r_init,
        )
        .unwrap()
    }

    #[test]
    fn test_tight_square_forms_one_cluster() {
        let params = square_params(0.1, 0);
        let geom = geometry(5, 5, &params);
        let scans = vec![ScanOccupancy::new(&[1, 1, 2, 2], &[1, 2, 1, 2], 5, 5).unwrap()];

        let clustering = GridBasedDbscan::new(params, &geom).unwrap().fit(&scans).unwrap();

        assert_eq!(clustering.labels, vec![1, 1, 1, 1]);
        assert_eq!(clustering.n_clusters, 1);
    }

    #[test]
    fn test_isolated_cell_is_noise() {
        let params = square_params(0.5, 0);
        let geom = geometry(5, 5, &params);
        let scans = vec![ScanOccupancy::new(&[2], &[2], 5, 5).unwrap()];

        let clustering = GridBasedDbscan::new(params, &geom).unwrap().fit(&scans).unwrap();

        assert_eq!(clustering.labels, vec![NOISE]);
        assert_eq!(clustering.n_clusters, 0);
    }

    #[test]
    fn test_scan_window_links_scans() {
        // Same cell in two consecutive scans; 5 possible cells per scan.
        let params = column_params(0.2, 1);
        let geom = geometry(5, 5, &params);
        let scans = vec![
            ScanOccupancy::new(&[2], &[2], 5, 5).unwrap(),
            ScanOccupancy::new(&[2], &[2], 5, 5).unwrap(),
        ];

        // 2 of 10 possible cells
        let linked = GridBasedDbscan::new(params, &geom).unwrap().fit(&scans).unwrap();
        assert_eq!(linked.labels, vec![1, 1]);

        // Each scan alone: 1 of 5 possible cells
        let params = column_params(0.3, 0);
        let separate = GridBasedDbscan::new(params, &geom).unwrap().fit(&scans).unwrap();
        assert_eq!(separate.labels, vec![NOISE, NOISE]);

        let params = column_params(0.2, 0);
        let separate = GridBasedDbscan::new(params, &geom).unwrap().fit(&scans).unwrap();
        assert_eq!(separate.labels, vec![1, 2]);
    }

    #[test]
    fn test_duplicate_detections_share_label() {
        let params = square_params(0.1, 0);
        let geom = geometry(5, 5, &params);
        let scans = vec![ScanOccupancy::new(&[1, 1, 1, 2], &[1, 1, 2, 2], 5, 5).unwrap()];

        let clustering = GridBasedDbscan::new(params, &geom).unwrap().fit(&scans).unwrap();
        assert_eq!(clustering.scan_labels, vec![vec![1, 1, 1, 1]]);
    }

    #[test]
    fn test_two_separated_groups() {
        let params = column_params(0.2, 0);
        let geom = geometry(20, 10, &params);
        let scans = vec![ScanOccupancy::new(
            &[1, 2, 3, 15, 16, 17],
            &[4, 4, 4, 4, 4, 4],
            20,
            10,
        )
        .unwrap()];

        let clustering = GridBasedDbscan::new(params, &geom).unwrap().fit(&scans).unwrap();
        assert_eq!(clustering.labels, vec![1, 1, 1, 2, 2, 2]);

        let summary = clustering.summary();
        assert_eq!(summary.n_clusters, 2);
        assert_eq!(summary.noise, 0);
        assert_eq!(summary.sizes.get(&2), Some(&3));
    }

    #[test]
    fn test_every_cell_labelled_and_deterministic() {
        let params = square_params(0.25, 1);
        let geom = geometry(30, 16, &params);
        let scans: Vec<ScanOccupancy> = (0..4)
            .map(|t| {
                let gates: Vec<usize> = (0..12).map(|i| (i * 7 + t * 3) % 30).collect();
                let beams: Vec<usize> = (0..12).map(|i| (i * 5 + t) % 16).collect();
                ScanOccupancy::new(&gates, &beams, 30, 16).unwrap()
            })
            .collect();

        let algo = GridBasedDbscan::new(params, &geom).unwrap();
        let first = algo.fit(&scans).unwrap();
        let second = algo.fit(&scans).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.labels.len(), 48);
        assert!(first
            .labels
            .iter()
            .all(|&l| l == NOISE || (1..=first.n_clusters as i32).contains(&l)));
    }

    #[test]
    fn test_stricter_ratio_never_reduces_noise() {
        let geom_params = square_params(0.1, 1);
        let geom = geometry(30, 16, &geom_params);
        let scans: Vec<ScanOccupancy> = (0..3)
            .map(|t| {
                let gates: Vec<usize> = (0..15).map(|i| (i * 11 + t * 2) % 30).collect();
                let beams: Vec<usize> = (0..15).map(|i| (i * 3 + t) % 16).collect();
                ScanOccupancy::new(&gates, &beams, 30, 16).unwrap()
            })
            .collect();

        let mut previous_noise = 0;
        for pts_ratio in [0.05, 0.1, 0.2, 0.3, 0.5, 0.8, 1.0] {
            let params = square_params(pts_ratio, 1);
            let clustering = GridBasedDbscan::new(params, &geom).unwrap().fit(&scans).unwrap();
            let noise = clustering.summary().noise;
            assert!(noise >= previous_noise, "pts_ratio {}", pts_ratio);
            previous_noise = noise;
        }
    }

    #[test]
    fn test_cancel_before_start() {
        let params = square_params(0.1, 0);
        let geom = geometry(5, 5, &params);
        let scans = vec![ScanOccupancy::new(&[1], &[1], 5, 5).unwrap()];
        let cancel = AtomicBool::new(true);

        let result = GridBasedDbscan::new(params, &geom)
            .unwrap()
            .fit_with_cancel(&scans, &cancel);
        assert_eq!(result, Err(ClusterError::Cancelled));
    }

    #[test]
    fn test_cancel_mid_run() {
        // Two separate columns; the first is labelled when the flag rises at gate 15.
        let params = column_params(0.2, 0);
        let geom = geometry(20, 10, &params);
        let gates = [1, 2, 3, 15, 16, 17];
        let scans = vec![ScanOccupancy::new(&gates, &[4; 6], 20, 10).unwrap()];
        let algo = GridBasedDbscan::new(params, &geom).unwrap();

        let mut polled = 0;
        let result = algo.run(&scans, || {
            polled += 1;
            polled > 3
        });
        assert_eq!(result, Err(ClusterError::Cancelled));
        assert_eq!(polled, 4);

        // Same input without the flag completes
        assert_eq!(algo.fit(&scans).unwrap().n_clusters, 2);
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let params = square_params(0.25, 1);
        let geom = geometry(30, 16, &params);
        let scans: Vec<ScanOccupancy> = (0..40)
            .map(|t| {
                let gates: Vec<usize> = (0..20).map(|i| (i * 7 + t) % 30).collect();
                let beams: Vec<usize> = (0..20).map(|i| (i * 3 + t) % 16).collect();
                ScanOccupancy::new(&gates, &beams, 30, 16).unwrap()
            })
            .collect();
        let algo = GridBasedDbscan::new(params, &geom).unwrap();
        let cancel = AtomicBool::new(false);
        let reached = AtomicBool::new(false);
        let mut polled = 0;

        // The flag is raised from another thread once ten cells have been polled
        let result = std::thread::scope(|scope| {
            scope.spawn(|| {
                while !reached.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                cancel.store(true, Ordering::Release);
            });
            algo.run(&scans, || {
                polled += 1;
                if polled == 10 {
                    reached.store(true, Ordering::Release);
                    while !cancel.load(Ordering::Acquire) {
                        std::hint::spin_loop();
                    }
                }
                cancel.load(Ordering::Relaxed)
            })
        });
        assert_eq!(result, Err(ClusterError::Cancelled));
        assert_eq!(polled, 10);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = square_params(0.0, 0);
        let geom = geometry(5, 5, &params);
        assert!(matches!(
            GridBasedDbscan::new(params, &geom),
            Err(ClusterError::InvalidParams { name: "pts_ratio", .. })
        ));
    }

    #[test]
    fn test_grid_mismatch() {
        let params = square_params(0.1, 0);
        let geom = geometry(5, 5, &params);
        let scans = vec![ScanOccupancy::new(&[1], &[1], 6, 5).unwrap()];

        let result = GridBasedDbscan::new(params, &geom).unwrap().fit(&scans);
        assert!(matches!(result, Err(ClusterError::GridMismatch { scan: 0, .. })));
    }

    #[test]
    fn test_empty_input() {
        let params = square_params(0.1, 0);
        let labels = cluster_scans(&[], 5, 5, &params).unwrap();
        assert!(labels.is_empty());

        let scans = vec![ScanOccupancy::empty(5, 5), ScanOccupancy::new(&[0], &[0], 5, 5).unwrap()];
        let labels = cluster_scans(&scans, 5, 5, &params).unwrap();
        assert_eq!(labels.len(), 1);
    }
}
