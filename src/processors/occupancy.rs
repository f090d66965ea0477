//! Per-scan occupancy of the (gate, beam) grid.

use crate::error::{ClusterError, Result};

/// Coordinate of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    pub gate: usize,
    pub beam: usize,
}

impl CellId {
    #[inline]
    pub const fn new(gate: usize, beam: usize) -> Self {
        Self { gate, beam }
    }
}

/// Occupied cells of one scan.
///
/// Several detections may fall in the same cell; the cell is stored once but
/// every detection keeps its cell so labels can be projected back.
#[derive(Debug, Clone)]
pub struct ScanOccupancy {
    nrang: usize,
    nbeam: usize,
    /// Dense bitset, row-major `[gate][beam]`; not allocated for an empty scan.
    occupied: Vec<bool>,
    /// Distinct cells in first-seen order.
    cells: Vec<CellId>,
    /// Cell of every input detection, in input order.
    detections: Vec<CellId>,
}

impl ScanOccupancy {
    /// Build the occupancy of one scan from parallel gate/beam arrays.
    ///
    /// # Errors
    ///
    /// Returns `LengthMismatch` if the arrays differ in length and
    /// `OutOfRange` for the first detection outside the grid.
    pub fn new(gates: &[usize], beams: &[usize], nrang: usize, nbeam: usize) -> Result<Self> {
        if gates.len() != beams.len() {
            return Err(ClusterError::LengthMismatch {
                gates_len: gates.len(),
                beams_len: beams.len(),
            });
        }
        if gates.is_empty() {
            return Ok(Self::empty(nrang, nbeam));
        }

        let mut occupied = vec![false; nrang * nbeam];
        let mut cells = Vec::new();
        let mut detections = Vec::with_capacity(gates.len());

        for (index, (&gate, &beam)) in gates.iter().zip(beams).enumerate() {
            if gate >= nrang || beam >= nbeam {
                return Err(ClusterError::OutOfRange {
                    index,
                    gate,
                    beam,
                    nrang,
                    nbeam,
                });
            }
            let cell = CellId::new(gate, beam);
            let slot = &mut occupied[gate * nbeam + beam];
            if !*slot {
                *slot = true;
                cells.push(cell);
            }
            detections.push(cell);
        }

        Ok(Self {
            nrang,
            nbeam,
            occupied,
            cells,
            detections,
        })
    }

    /// Scan with no detections. Allocates nothing.
    pub fn empty(nrang: usize, nbeam: usize) -> Self {
        Self {
            nrang,
            nbeam,
            occupied: Vec::new(),
            cells: Vec::new(),
            detections: Vec::new(),
        }
    }

    /// True if at least one detection falls in `(gate, beam)`.
    ///
    /// Coordinates outside the grid are never occupied.
    #[inline]
    pub fn contains(&self, gate: usize, beam: usize) -> bool {
        !self.cells.is_empty()
            && gate < self.nrang
            && beam < self.nbeam
            && self.occupied[gate * self.nbeam + beam]
    }

    /// Distinct occupied cells in input order.
    #[inline]
    pub fn occupied_cells(&self) -> &[CellId] {
        &self.cells
    }

    /// Cell of each original detection, in input order.
    #[inline]
    pub fn detection_cells(&self) -> &[CellId] {
        &self.detections
    }

    #[inline]
    pub fn num_detections(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    #[inline]
    pub fn nrang(&self) -> usize {
        self.nrang
    }

    #[inline]
    pub fn nbeam(&self) -> usize {
        self.nbeam
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_and_order() {
        let scan = ScanOccupancy::new(&[3, 1, 3, 0], &[2, 0, 2, 4], 5, 5).unwrap();

        assert!(scan.contains(3, 2));
        assert!(scan.contains(1, 0));
        assert!(scan.contains(0, 4));
        assert!(!scan.contains(2, 2));
        assert!(!scan.contains(10, 0));

        // Duplicate (3, 2) collapsed, first-seen order kept
        assert_eq!(
            scan.occupied_cells(),
            &[CellId::new(3, 2), CellId::new(1, 0), CellId::new(0, 4)]
        );
        assert_eq!(scan.num_detections(), 4);
        assert_eq!(scan.detection_cells()[2], CellId::new(3, 2));
    }

    #[test]
    fn test_out_of_range() {
        let result = ScanOccupancy::new(&[0, 5], &[0, 1], 5, 5);
        match result {
            Err(ClusterError::OutOfRange { index, gate, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(gate, 5);
            }
            other => panic!("Expected OutOfRange, got {:?}", other),
        }

        assert!(ScanOccupancy::new(&[0], &[5], 5, 5).is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let result = ScanOccupancy::new(&[0, 1], &[0], 5, 5);
        assert!(matches!(
            result,
            Err(ClusterError::LengthMismatch {
                gates_len: 2,
                beams_len: 1
            })
        ));
    }

    #[test]
    fn test_empty_scan() {
        let scan = ScanOccupancy::empty(5, 5);
        assert!(scan.is_empty());
        assert!(scan.occupied_cells().is_empty());
        assert!(!scan.contains(0, 0));
        assert!(!scan.contains(4, 4));

        let built = ScanOccupancy::new(&[], &[], 5, 5).unwrap();
        assert!(built.is_empty());
        assert!(!built.contains(2, 2));
    }
}
