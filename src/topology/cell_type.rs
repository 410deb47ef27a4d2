//! Cell topologies with their subcell tables.
//!
//! Local vertex numbering and the subcell tables follow the usual
//! counter-clockwise convention: a triangle's edge `i` runs from vertex `i`
//! to vertex `i + 1`, a hexahedron's bottom face is `0-3-2-1` so that its
//! normal points outward, and so on.

use crate::mesh_error::LocalMeshError;
use serde::{Deserialize, Serialize};

static POINTS: [[usize; 1]; 8] = [[0], [1], [2], [3], [4], [5], [6], [7]];
static ALL: [usize; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

static TRI_EDGES: [&[usize]; 3] = [&[0, 1], &[1, 2], &[2, 0]];
static QUAD_EDGES: [&[usize]; 4] = [&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
static TET_EDGES: [&[usize]; 6] = [&[0, 1], &[1, 2], &[2, 0], &[0, 3], &[1, 3], &[2, 3]];
static TET_FACES: [&[usize]; 4] = [&[0, 1, 3], &[1, 2, 3], &[0, 3, 2], &[0, 2, 1]];
static HEX_EDGES: [&[usize]; 12] = [
    &[0, 1],
    &[1, 2],
    &[2, 3],
    &[3, 0],
    &[4, 5],
    &[5, 6],
    &[6, 7],
    &[7, 4],
    &[0, 4],
    &[1, 5],
    &[2, 6],
    &[3, 7],
];
static HEX_FACES: [&[usize]; 6] = [
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[0, 4, 7, 3],
    &[0, 3, 2, 1],
    &[4, 5, 6, 7],
];

/// Linear cell topologies supported by the local mesh builder.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellTopology {
    /// 2-node segment.
    Line2,
    /// 3-node triangle.
    Tri3,
    /// 4-node quadrilateral.
    Quad4,
    /// 4-node tetrahedron.
    Tet4,
    /// 8-node hexahedron.
    Hex8,
}

impl Default for CellTopology {
    fn default() -> Self {
        CellTopology::Line2
    }
}

impl std::fmt::Display for CellTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl CellTopology {
    /// Topological dimension.
    pub fn dimension(self) -> usize {
        match self {
            CellTopology::Line2 => 1,
            CellTopology::Tri3 | CellTopology::Quad4 => 2,
            CellTopology::Tet4 | CellTopology::Hex8 => 3,
        }
    }

    pub fn vertex_count(self) -> usize {
        match self {
            CellTopology::Line2 => 2,
            CellTopology::Tri3 => 3,
            CellTopology::Quad4 | CellTopology::Tet4 => 4,
            CellTopology::Hex8 => 8,
        }
    }

    /// Number of codimension-1 subcells.
    pub fn face_count(self) -> usize {
        self.subcell_count(self.dimension() - 1)
    }

    /// Number of subcells of dimension `dim` (0 for dimensions above the cell).
    pub fn subcell_count(self, dim: usize) -> usize {
        let d = self.dimension();
        if dim == 0 {
            return self.vertex_count();
        }
        if dim == d {
            return 1;
        }
        match (self, dim) {
            (CellTopology::Tri3, 1) => TRI_EDGES.len(),
            (CellTopology::Quad4, 1) => QUAD_EDGES.len(),
            (CellTopology::Tet4, 1) => TET_EDGES.len(),
            (CellTopology::Tet4, 2) => TET_FACES.len(),
            (CellTopology::Hex8, 1) => HEX_EDGES.len(),
            (CellTopology::Hex8, 2) => HEX_FACES.len(),
            _ => 0,
        }
    }

    /// Local vertices of subcell `index` of dimension `dim`.
    pub fn subcell_vertices(
        self,
        dim: usize,
        index: usize,
    ) -> Result<&'static [usize], LocalMeshError> {
        let unsupported = || LocalMeshError::UnsupportedTopology {
            topology: self.name().to_string(),
            dimension: dim,
        };
        if index >= self.subcell_count(dim) {
            return Err(unsupported());
        }
        if dim == 0 {
            return Ok(&POINTS[index]);
        }
        if dim == self.dimension() {
            return Ok(&ALL[..self.vertex_count()]);
        }
        let table: &[&'static [usize]] = match (self, dim) {
            (CellTopology::Tri3, 1) => &TRI_EDGES,
            (CellTopology::Quad4, 1) => &QUAD_EDGES,
            (CellTopology::Tet4, 1) => &TET_EDGES,
            (CellTopology::Tet4, 2) => &TET_FACES,
            (CellTopology::Hex8, 1) => &HEX_EDGES,
            (CellTopology::Hex8, 2) => &HEX_FACES,
            _ => return Err(unsupported()),
        };
        Ok(table[index])
    }

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            CellTopology::Line2 => "Line_2",
            CellTopology::Tri3 => "Triangle_3",
            CellTopology::Quad4 => "Quadrilateral_4",
            CellTopology::Tet4 => "Tetrahedron_4",
            CellTopology::Hex8 => "Hexahedron_8",
        }
    }

    /// Key identifying the topology; two blocks agree iff their keys agree.
    pub fn key(self) -> u32 {
        ((self.dimension() as u32) << 8) | self.vertex_count() as u32
    }
}
