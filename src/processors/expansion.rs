//! Seeded cluster expansion over the (scan, cell) label space.
//!
//! Cell states move `UNCLASSIFIED -> NOISE | cluster`, `NOISE -> cluster`;
//! a cluster label is terminal. Expansion is a FIFO flood fill that only
//! grows through cells whose own neighbourhood passes the density test
//! (core cells), while any reached cell is labelled (border cells).

use std::collections::VecDeque;

use crate::config::ClusterParams;
use crate::processors::geometry::RatioGeometry;
use crate::processors::occupancy::{CellId, ScanOccupancy};
use crate::processors::region::{region_query, ScanCell};

/// Label of a cell not yet visited.
pub const UNCLASSIFIED: i32 = 0;

/// Label of a cell whose neighbourhood is too sparse and that no cluster reached.
pub const NOISE: i32 = -1;

/// Per-scan label arrays over the (gate, beam) grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelGrid {
    nrang: usize,
    nbeam: usize,
    scans: Vec<Vec<i32>>,
}

impl LabelGrid {
    /// Allocate `num_scans` grids filled with `UNCLASSIFIED`.
    pub fn new(num_scans: usize, nrang: usize, nbeam: usize) -> Self {
        Self {
            nrang,
            nbeam,
            scans: vec![vec![UNCLASSIFIED; nrang * nbeam]; num_scans],
        }
    }

    /// Allocate labels only for scans that have detections.
    ///
    /// Empty scans hold no label array; their cells are never read because
    /// no cell of theirs is occupied.
    pub fn for_scans(scans: &[ScanOccupancy], nrang: usize, nbeam: usize) -> Self {
        let scans = scans
            .iter()
            .map(|scan| {
                if scan.is_empty() {
                    Vec::new()
                } else {
                    vec![UNCLASSIFIED; nrang * nbeam]
                }
            })
            .collect();
        Self { nrang, nbeam, scans }
    }

    #[inline]
    fn offset(&self, cell: CellId) -> usize {
        debug_assert!(cell.gate < self.nrang && cell.beam < self.nbeam);
        cell.gate * self.nbeam + cell.beam
    }

    #[inline]
    pub fn get(&self, at: ScanCell) -> i32 {
        self.scans[at.scan][self.offset(at.cell)]
    }

    #[inline]
    pub fn set(&mut self, at: ScanCell, label: i32) {
        let offset = self.offset(at.cell);
        self.scans[at.scan][offset] = label;
    }

    #[inline]
    pub fn num_scans(&self) -> usize {
        self.scans.len()
    }

    /// Labels of one scan, row-major `[gate][beam]`; empty for a scan
    /// allocated without detections by [`LabelGrid::for_scans`].
    #[inline]
    pub fn scan(&self, scan: usize) -> &[i32] {
        &self.scans[scan]
    }
}

/// Grow a cluster from `seed`, or mark it noise.
///
/// Returns `true` if `cluster_id` was used for a new cluster.
///
/// # Arguments
///
/// * `scans` - Occupancy of every scan
/// * `labels` - Label grid mutated in place
/// * `seed` - Unclassified occupied cell to expand from
/// * `cluster_id` - Id given to every cell reached
/// * `params` - Region and density parameters
/// * `geometry` - Ratio matrix of the grid
pub fn expand_cluster(
    scans: &[ScanOccupancy],
    labels: &mut LabelGrid,
    seed: ScanCell,
    cluster_id: i32,
    params: &ClusterParams,
    geometry: &RatioGeometry,
) -> bool {
    debug_assert!(cluster_id > 0, "cluster ids start at 1");

    let seeds = region_query(scans, seed.scan, seed.cell, params, geometry);
    if !seeds.is_dense(params.pts_ratio) {
        labels.set(seed, NOISE);
        return false;
    }

    labels.set(seed, cluster_id);
    let mut queue: VecDeque<ScanCell> = VecDeque::with_capacity(seeds.neighbors.len());
    for &neighbor in &seeds.neighbors {
        match labels.get(neighbor) {
            UNCLASSIFIED => {
                labels.set(neighbor, cluster_id);
                queue.push_back(neighbor);
            }
            NOISE => labels.set(neighbor, cluster_id),
            _ => {}
        }
    }

    while let Some(current) = queue.pop_front() {
        let hood = region_query(scans, current.scan, current.cell, params, geometry);
        if !hood.is_dense(params.pts_ratio) {
            continue;
        }
        for &neighbor in &hood.neighbors {
            match labels.get(neighbor) {
                UNCLASSIFIED => {
                    labels.set(neighbor, cluster_id);
                    queue.push_back(neighbor);
                }
                NOISE => labels.set(neighbor, cluster_id),
                _ => {}
            }
        }
    }

    true
}
