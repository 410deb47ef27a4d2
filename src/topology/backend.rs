//! The read-only mesh oracle consumed by local mesh construction.
//!
//! A [`MeshBackend`] describes the cells a rank owns. Local cell indices run
//! over `0..num_local_cells()` with element blocks laid out back to back in
//! the order of `element_block_names()`.

use crate::data::cell_vertices::CellVertices;
use crate::mesh_error::LocalMeshError;
use crate::topology::cell_type::CellTopology;
use crate::topology::field_pattern::FieldPattern;

/// Per-cell lists of global ids in compressed row storage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Connectivity {
    offsets: Vec<usize>,
    ids: Vec<u64>,
}

impl Connectivity {
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            ids: Vec::new(),
        }
    }

    /// Append the ids of the next cell.
    pub fn push_cell<I: IntoIterator<Item = u64>>(&mut self, ids: I) {
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        self.ids.extend(ids);
        self.offsets.push(self.ids.len());
    }

    pub fn num_cells(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Number of ids of `cell` (0 if out of range).
    pub fn size(&self, cell: usize) -> usize {
        self.get(cell).map_or(0, <[u64]>::len)
    }

    pub fn get(&self, cell: usize) -> Option<&[u64]> {
        let lo = *self.offsets.get(cell)?;
        let hi = *self.offsets.get(cell + 1)?;
        Some(&self.ids[lo..hi])
    }
}

impl FromIterator<Vec<u64>> for Connectivity {
    fn from_iter<T: IntoIterator<Item = Vec<u64>>>(iter: T) -> Self {
        let mut conn = Connectivity::new();
        for row in iter {
            conn.push_cell(row);
        }
        conn
    }
}

/// `element` touches the sideset through its subcell `(dimension, index)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct SubcellRelation {
    /// Global id of the cell.
    pub element: u64,
    pub dimension: usize,
    pub index: usize,
}

pub trait MeshBackend {
    /// Spatial dimension of vertex coordinates.
    fn dimension(&self) -> usize;

    fn element_block_names(&self) -> Vec<String>;

    fn block_topology(&self, block: &str) -> Result<CellTopology, LocalMeshError>;

    /// Local cells of `block`, ascending.
    fn block_local_cells(&self, block: &str) -> Result<Vec<usize>, LocalMeshError>;

    fn num_local_cells(&self) -> usize;

    /// Block containing `local_cell`.
    fn block_id(&self, local_cell: usize) -> Option<&str>;

    /// Local index of the owned cell with global id `cell`.
    fn element_local_id(&self, cell: u64) -> Option<usize>;

    /// Global ids of the subcells selected by `pattern`, per local cell, in
    /// local subcell order.
    fn connectivity(&self, pattern: FieldPattern) -> Result<Connectivity, LocalMeshError>;

    /// Vertex coordinates of the given local cells.
    fn element_vertices(&self, local_cells: &[usize]) -> Result<CellVertices, LocalMeshError>;

    fn sideset_names(&self) -> Vec<String>;

    /// Global face ids making up `sideset` restricted to `block`. Unknown
    /// names are reported as [`LocalMeshError::UnknownSideset`] or
    /// [`LocalMeshError::UnknownElementBlock`].
    fn side_entities(&self, sideset: &str, block: &str) -> Result<Vec<u64>, LocalMeshError>;

    /// Every owned cell of `block` touching one of `sides`, together with
    /// the subcell it touches through. Cells meeting a side only at an edge
    /// or vertex are reported with that lower-dimensional subcell.
    fn side_element_cascade(
        &self,
        block: &str,
        sides: &[u64],
    ) -> Result<Vec<SubcellRelation>, LocalMeshError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_rows() {
        let conn: Connectivity = vec![vec![1, 2], vec![], vec![7]].into_iter().collect();
        assert_eq!(conn.num_cells(), 3);
        assert_eq!(conn.get(0), Some(&[1u64, 2][..]));
        assert_eq!(conn.size(1), 0);
        assert_eq!(conn.get(2), Some(&[7u64][..]));
        assert_eq!(conn.get(3), None);
    }
}
