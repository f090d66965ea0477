//! Elliptical, time-windowed region query.
//!
//! The neighbourhood of a cell is an ellipse `g` gates tall and
//! `g / (f * ratio)` beams wide, repeated over `scan_eps` scans on each side
//! of the query scan. Besides the occupied neighbours the query reports how
//! many cells *could* have been occupied, which the expansion uses to scale
//! its density threshold.

use crate::config::ClusterParams;
use crate::processors::geometry::RatioGeometry;
use crate::processors::occupancy::{CellId, ScanOccupancy};

/// A cell in a specific scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanCell {
    pub scan: usize,
    pub cell: CellId,
}

impl ScanCell {
    #[inline]
    pub const fn new(scan: usize, cell: CellId) -> Self {
        Self { scan, cell }
    }
}

/// Result of a region query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighborhood {
    /// Occupied cells inside the ellipse, query cell included.
    pub neighbors: Vec<ScanCell>,
    /// Cells inside the ellipse summed over the temporal window, occupied or not.
    pub possible: usize,
}

impl Neighborhood {
    /// Density test: at least `pts_ratio` of the possible cells are occupied.
    #[inline]
    pub fn is_dense(&self, pts_ratio: f64) -> bool {
        self.neighbors.len() as f64 >= self.possible as f64 * pts_ratio
    }
}

/// Ellipse semi-axes `(height in gates, width in beams)` at a cell.
#[inline]
pub fn ellipse_axes(cell: CellId, params: &ClusterParams, geometry: &RatioGeometry) -> (f64, f64) {
    let hgt = params.g;
    let wid = params.g / (params.f * geometry.ratio_at(cell));
    (hgt, wid)
}

/// Number of whole cells an axis reaches past the centre.
#[inline]
fn reach(axis: f64) -> usize {
    if axis.is_finite() {
        axis.ceil() as usize
    } else {
        usize::MAX
    }
}

/// Inclusive `[centre - extent, centre + extent]` clipped to `[0, len)`.
#[inline]
fn clipped_span(centre: usize, extent: usize, len: usize) -> std::ops::RangeInclusive<usize> {
    let lo = centre.saturating_sub(extent);
    let hi = centre.saturating_add(extent).min(len - 1);
    lo..=hi
}

/// Collect occupied cells inside the ellipse around `cell` over the scan window.
///
/// Iteration is gate ascending, then beam ascending, then scan ascending, so
/// identical inputs always give identical neighbour order.
///
/// # Arguments
///
/// * `scans` - Occupancy of every scan, in time order
/// * `scan_index` - Scan containing the query cell
/// * `cell` - Query cell
/// * `params` - Ellipse and window parameters
/// * `geometry` - Ratio matrix of the grid
pub fn region_query(
    scans: &[ScanOccupancy],
    scan_index: usize,
    cell: CellId,
    params: &ClusterParams,
    geometry: &RatioGeometry,
) -> Neighborhood {
    debug_assert!(scan_index < scans.len(), "scan index out of bounds");

    let (hgt, wid) = ellipse_axes(cell, params, geometry);
    let gates = clipped_span(cell.gate, reach(hgt), geometry.nrang());
    let beams = clipped_span(cell.beam, reach(wid), geometry.nbeam());
    let window = clipped_span(scan_index, params.scan_eps, scans.len());

    let hgt_sq = hgt * hgt;
    let wid_sq = wid * wid;

    let mut neighborhood = Neighborhood::default();
    for g in gates {
        let dg = g as f64 - cell.gate as f64;
        let gate_term = dg * dg / hgt_sq;
        for b in beams.clone() {
            let db = b as f64 - cell.beam as f64;
            if db * db / wid_sq + gate_term > 1.0 {
                continue;
            }
            for s in window.clone() {
                neighborhood.possible += 1;
                if scans[s].contains(g, b) {
                    neighborhood.neighbors.push(ScanCell::new(s, CellId::new(g, b)));
                }
            }
        }
    }
    neighborhood
}
