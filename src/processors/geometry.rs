//! Range/angle ratio matrix for a fixed radar grid.
//!
//! Angular bins widen with range: two beam-adjacent cells at a far gate are
//! farther apart on the ground than two cells at a near gate. The ratio at
//! `(gate, beam)` compares the angular cell spacing to the radial step `dr`
//! and is used to size the ellipse width of every region query.

use crate::config::{ClusterParams, RadarConfig};
use crate::error::{ClusterError, Result};
use crate::processors::occupancy::CellId;

/// Precomputed ratio of angular to radial cell spacing on a (gate, beam) grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioGeometry {
    nrang: usize,
    nbeam: usize,
    dtheta_rad: f64,
    dr: f64,
    r_init: f64,
    /// Row-major `[gate][beam]`.
    ratio: Vec<f64>,
}

impl RatioGeometry {
    /// Build the ratio matrix for a grid.
    ///
    /// # Arguments
    ///
    /// * `nrang` - Number of range gates
    /// * `nbeam` - Number of beams
    /// * `dtheta_rad` - Beam width in radians
    /// * `dr` - Radial gate size
    /// * `r_init` - Range of gate 0
    ///
    /// # Errors
    ///
    /// Returns `InvalidGeometry` if a dimension is zero, `dr` or `dtheta_rad`
    /// is not positive, `r_init` is negative, or any value is not finite.
    pub fn new(nrang: usize, nbeam: usize, dtheta_rad: f64, dr: f64, r_init: f64) -> Result<Self> {
        if nrang == 0 || nbeam == 0 {
            return Err(ClusterError::InvalidGeometry(format!(
                "grid must have at least one gate and one beam, got {}x{}",
                nrang, nbeam
            )));
        }
        if !dr.is_finite() || dr <= 0.0 {
            return Err(ClusterError::InvalidGeometry(format!(
                "dr must be positive, got {}",
                dr
            )));
        }
        if !dtheta_rad.is_finite() || dtheta_rad <= 0.0 {
            return Err(ClusterError::InvalidGeometry(format!(
                "dtheta must be positive, got {}",
                dtheta_rad
            )));
        }
        if !r_init.is_finite() || r_init < 0.0 {
            return Err(ClusterError::InvalidGeometry(format!(
                "r_init must be non-negative, got {}",
                r_init
            )));
        }

        let mut ratio = Vec::with_capacity(nrang * nbeam);
        for i in 0..nrang {
            let range = r_init + dr * i as f64;
            for j in 0..nbeam {
                let j = j as f64;
                let ahead = (dtheta_rad * (j + 1.0) - dtheta_rad * j).sin();
                let behind = (dtheta_rad * j - dtheta_rad * (j - 1.0)).sin();
                ratio.push(range / (2.0 * dr) * (ahead + behind));
            }
        }

        Ok(Self {
            nrang,
            nbeam,
            dtheta_rad,
            dr,
            r_init,
            ratio,
        })
    }

    /// Build the geometry from radar dimensions and clustering parameters.
    pub fn from_config(radar: &RadarConfig, params: &ClusterParams) -> Result<Self> {
        Self::new(
            radar.nrang,
            radar.nbeam,
            params.dtheta_rad(),
            params.dr,
            params.r_init,
        )
    }

    /// Ratio at a cell.
    ///
    /// # Panics
    ///
    /// Panics if `gate >= nrang` or `beam >= nbeam`.
    #[inline]
    pub fn ratio(&self, gate: usize, beam: usize) -> f64 {
        assert!(
            gate < self.nrang && beam < self.nbeam,
            "cell ({}, {}) outside {}x{} grid",
            gate,
            beam,
            self.nrang,
            self.nbeam
        );
        self.ratio[gate * self.nbeam + beam]
    }

    #[inline]
    pub fn ratio_at(&self, cell: CellId) -> f64 {
        self.ratio(cell.gate, cell.beam)
    }

    #[inline]
    pub fn nrang(&self) -> usize {
        self.nrang
    }

    #[inline]
    pub fn nbeam(&self) -> usize {
        self.nbeam
    }

    #[inline]
    pub fn dtheta_rad(&self) -> f64 {
        self.dtheta_rad
    }

    #[inline]
    pub fn dr(&self) -> f64 {
        self.dr
    }

    #[inline]
    pub fn r_init(&self) -> f64 {
        self.r_init
    }
}
