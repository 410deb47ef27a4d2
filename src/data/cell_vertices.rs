//! Per-cell vertex coordinates, stored flat as `[cell][vertex][dim]`.

use crate::mesh_error::LocalMeshError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellVertices {
    data: Vec<f64>,
    num_cells: usize,
    vertices_per_cell: usize,
    dimension: usize,
}

impl CellVertices {
    /// Zero-filled coordinates for `num_cells` cells.
    pub fn new(num_cells: usize, vertices_per_cell: usize, dimension: usize) -> Self {
        Self {
            data: vec![0.0; num_cells * vertices_per_cell * dimension],
            num_cells,
            vertices_per_cell,
            dimension,
        }
    }

    /// Wrap flat coordinates; `data.len()` must match the extents.
    pub fn from_vec(
        data: Vec<f64>,
        num_cells: usize,
        vertices_per_cell: usize,
        dimension: usize,
    ) -> Result<Self, LocalMeshError> {
        let expected = num_cells * vertices_per_cell * dimension;
        if data.len() != expected {
            return Err(LocalMeshError::ExtentMismatch {
                what: "cell vertex coordinates",
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            data,
            num_cells,
            vertices_per_cell,
            dimension,
        })
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    pub fn vertices_per_cell(&self) -> usize {
        self.vertices_per_cell
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Values per cell.
    pub fn stride(&self) -> usize {
        self.vertices_per_cell * self.dimension
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, cell: usize, vertex: usize, dim: usize) -> f64 {
        self.data[(cell * self.vertices_per_cell + vertex) * self.dimension + dim]
    }

    pub fn cell(&self, cell: usize) -> &[f64] {
        let s = self.stride();
        &self.data[cell * s..(cell + 1) * s]
    }

    pub fn cell_mut(&mut self, cell: usize) -> &mut [f64] {
        let s = self.stride();
        &mut self.data[cell * s..(cell + 1) * s]
    }

    /// Overwrite cell `to` with the coordinates of cell `from`.
    pub fn copy_cell(&mut self, from: usize, to: usize) {
        let s = self.stride();
        self.data.copy_within(from * s..(from + 1) * s, to * s);
    }

    /// Append the cells of `other`; both must share vertex count and dimension.
    pub fn append(&mut self, other: &CellVertices) -> Result<(), LocalMeshError> {
        if self.num_cells == 0 && self.data.is_empty() {
            self.vertices_per_cell = other.vertices_per_cell;
            self.dimension = other.dimension;
        } else if other.num_cells > 0 && other.stride() != self.stride() {
            return Err(LocalMeshError::ExtentMismatch {
                what: "appended cell vertex stride",
                expected: self.stride(),
                found: other.stride(),
            });
        }
        self.data.extend_from_slice(&other.data);
        self.num_cells += other.num_cells;
        Ok(())
    }

    /// Grow to `num_cells` cells, zero-filling the new ones.
    pub fn resize(&mut self, num_cells: usize) {
        self.data.resize(num_cells * self.stride(), 0.0);
        self.num_cells = num_cells;
    }

    /// Coordinates of the listed cells, in order.
    pub fn select(&self, cells: &[usize]) -> CellVertices {
        let mut data = Vec::with_capacity(cells.len() * self.stride());
        for &c in cells {
            data.extend_from_slice(self.cell(c));
        }
        CellVertices {
            data,
            num_cells: cells.len(),
            vertices_per_cell: self.vertices_per_cell,
            dimension: self.dimension,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_segments() -> CellVertices {
        CellVertices::from_vec(vec![0.0, 1.0, 1.0, 2.0], 2, 2, 1).unwrap()
    }

    #[test]
    fn extents_are_checked() {
        let err = CellVertices::from_vec(vec![0.0; 5], 2, 2, 1).unwrap_err();
        assert!(matches!(err, LocalMeshError::ExtentMismatch { expected: 4, found: 5, .. }));
    }

    #[test]
    fn copy_and_select() {
        let mut v = two_segments();
        v.resize(3);
        v.copy_cell(1, 2);
        assert_eq!(v.cell(2), &[1.0, 2.0]);
        assert_eq!(v.get(2, 1, 0), 2.0);
        let picked = v.select(&[2, 0]);
        assert_eq!(picked.as_slice(), &[1.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn append_rejects_other_shapes() {
        let mut v = two_segments();
        let quads = CellVertices::new(1, 4, 2);
        assert!(v.append(&quads).is_err());
        v.append(&two_segments()).unwrap();
        assert_eq!(v.num_cells(), 4);
    }
}
