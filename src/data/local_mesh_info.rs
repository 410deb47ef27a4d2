//! The per-rank local mesh description and its block/sideset views.
//!
//! Local cell indices are laid out as owned cells, then ghost (halo) cells,
//! then virtual cells:
//!
//! ```text
//! [0, num_owned)                         owned
//! [num_owned, num_owned + num_ghost)     ghost
//! [num_owned + num_ghost, num_total)     virtual
//! ```
//!
//! Every face joins two local cells; at least one of them is real (owned or
//! ghost) and the side with the smaller local index is stored first.

use crate::data::cell_vertices::CellVertices;
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::LocalMeshError;
use crate::topology::cell_type::CellTopology;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// `cell -> local face index -> face`, with `None` for faces outside the
/// structure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellToFaces {
    faces_per_cell: usize,
    data: Vec<Option<usize>>,
}

impl CellToFaces {
    pub fn new(num_cells: usize, faces_per_cell: usize) -> Self {
        Self {
            faces_per_cell,
            data: vec![None; num_cells * faces_per_cell],
        }
    }

    pub fn faces_per_cell(&self) -> usize {
        self.faces_per_cell
    }

    pub fn num_cells(&self) -> usize {
        self.data.len().checked_div(self.faces_per_cell).unwrap_or(0)
    }

    pub fn get(&self, cell: usize, lidx: usize) -> Option<usize> {
        if lidx >= self.faces_per_cell {
            return None;
        }
        self.data
            .get(cell * self.faces_per_cell + lidx)
            .copied()
            .flatten()
    }

    /// Record `face` as local face `lidx` of `cell`.
    pub fn set(&mut self, cell: usize, lidx: usize, face: usize) -> Result<(), LocalMeshError> {
        if lidx >= self.faces_per_cell {
            return Err(LocalMeshError::ExtentMismatch {
                what: "local face index",
                expected: self.faces_per_cell,
                found: lidx,
            });
        }
        let num_cells = self.num_cells();
        let slot = self
            .data
            .get_mut(cell * self.faces_per_cell + lidx)
            .ok_or(LocalMeshError::ExtentMismatch {
                what: "cell index in cell to face table",
                expected: num_cells,
                found: cell,
            })?;
        *slot = Some(face);
        Ok(())
    }

    pub fn row(&self, cell: usize) -> &[Option<usize>] {
        &self.data[cell * self.faces_per_cell..(cell + 1) * self.faces_per_cell]
    }
}

/// Tables shared by the full structure and the block/sideset views.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalMeshInfoBase {
    pub num_owned_cells: usize,
    pub num_ghost_cells: usize,
    pub num_virtual_cells: usize,

    /// Backend/parent local index of every cell.
    pub local_cells: Vec<usize>,
    /// Global id of every cell.
    pub global_cells: Vec<u64>,
    pub cell_vertices: CellVertices,

    pub cell_to_faces: CellToFaces,
    pub face_to_cells: Vec<[usize; 2]>,
    pub face_to_lidx: Vec<[usize; 2]>,
}

impl LocalMeshInfoBase {
    pub fn num_real_cells(&self) -> usize {
        self.num_owned_cells + self.num_ghost_cells
    }

    pub fn num_total_cells(&self) -> usize {
        self.num_real_cells() + self.num_virtual_cells
    }

    pub fn num_faces(&self) -> usize {
        self.face_to_cells.len()
    }

    pub fn is_owned(&self, cell: usize) -> bool {
        cell < self.num_owned_cells
    }

    pub fn is_ghost(&self, cell: usize) -> bool {
        (self.num_owned_cells..self.num_real_cells()).contains(&cell)
    }

    pub fn is_virtual(&self, cell: usize) -> bool {
        cell >= self.num_real_cells() && cell < self.num_total_cells()
    }

    /// The side of `face` that is not `cell`, with its local face index.
    pub fn other_side(&self, face: usize, cell: usize) -> (usize, usize) {
        let s = if self.face_to_cells[face][0] == cell { 1 } else { 0 };
        (self.face_to_cells[face][s], self.face_to_lidx[face][s])
    }

    /// Real cell across the single face of virtual cell `cell`.
    pub fn virtual_neighbor(&self, cell: usize) -> Option<usize> {
        self.cell_to_faces
            .row(cell)
            .iter()
            .flatten()
            .map(|&face| self.other_side(face, cell).0)
            .next()
    }

    pub fn owned_global_cells(&self) -> &[u64] {
        &self.global_cells[..self.num_owned_cells]
    }

    pub fn ghost_global_cells(&self) -> &[u64] {
        &self.global_cells[self.num_owned_cells..self.num_real_cells()]
    }

    pub fn virtual_global_cells(&self) -> &[u64] {
        &self.global_cells[self.num_real_cells()..]
    }
}

impl DebugInvariants for LocalMeshInfoBase {
    fn validate_invariants(&self) -> Result<(), LocalMeshError> {
        let total = self.num_total_cells();
        let extents = [
            ("global cells", self.global_cells.len()),
            ("local cells", self.local_cells.len()),
            ("cell vertices", self.cell_vertices.num_cells()),
            ("cell to faces", self.cell_to_faces.num_cells()),
        ];
        for (what, found) in extents {
            if found != total {
                return Err(LocalMeshError::ExtentMismatch {
                    what,
                    expected: total,
                    found,
                });
            }
        }
        if self.face_to_lidx.len() != self.face_to_cells.len() {
            return Err(LocalMeshError::ExtentMismatch {
                what: "face to lidx",
                expected: self.face_to_cells.len(),
                found: self.face_to_lidx.len(),
            });
        }

        let mut seen = HashSet::with_capacity(total);
        for &gid in &self.global_cells {
            if !seen.insert(gid) {
                return Err(LocalMeshError::DuplicateGlobalId(gid));
            }
        }

        let real = self.num_real_cells();
        for (face, (cells, lidx)) in self.face_to_cells.iter().zip(&self.face_to_lidx).enumerate() {
            if cells[0] >= real && cells[1] >= real {
                return Err(LocalMeshError::FaceBetweenVirtualCells { face });
            }
            for side in 0..2 {
                let (cell, l) = (cells[side], lidx[side]);
                if cell >= total {
                    return Err(LocalMeshError::UnknownLocalCell(cell));
                }
                if self.cell_to_faces.get(cell, l) != Some(face) {
                    return Err(LocalMeshError::SubcellMismatch {
                        cell,
                        subcell: l,
                        face: Some(face),
                    });
                }
            }
        }

        for cell in real..total {
            let neighbor = self
                .virtual_neighbor(cell)
                .filter(|&n| n < real)
                .ok_or(LocalMeshError::VirtualCellWithoutNeighbor { cell })?;
            if self.cell_vertices.cell(cell) != self.cell_vertices.cell(neighbor) {
                return Err(LocalMeshError::InvalidMesh(format!(
                    "virtual cell {cell} does not share the geometry of cell {neighbor}"
                )));
            }
        }
        Ok(())
    }
}

/// Local mesh restricted to one element block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalMeshBlockInfo {
    pub base: LocalMeshInfoBase,
    pub element_block_name: String,
    pub cell_topology: Option<CellTopology>,
}

/// Local mesh restricted to the cells touching one sideset of one block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalMeshSidesetInfo {
    pub base: LocalMeshInfoBase,
    pub element_block_name: String,
    pub sideset_name: String,
    pub cell_topology: Option<CellTopology>,
}

/// Full local mesh of one rank.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalMeshInfo {
    pub base: LocalMeshInfoBase,
    pub cell_topology: Option<CellTopology>,
    pub element_blocks: BTreeMap<String, LocalMeshBlockInfo>,
    /// block name -> sideset name -> view
    pub sidesets: BTreeMap<String, BTreeMap<String, LocalMeshSidesetInfo>>,
}

impl LocalMeshInfo {
    pub fn block(&self, name: &str) -> Option<&LocalMeshBlockInfo> {
        self.element_blocks.get(name)
    }

    pub fn sideset(&self, block: &str, sideset: &str) -> Option<&LocalMeshSidesetInfo> {
        self.sidesets.get(block)?.get(sideset)
    }
}

impl std::ops::Deref for LocalMeshInfo {
    type Target = LocalMeshInfoBase;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl std::ops::Deref for LocalMeshBlockInfo {
    type Target = LocalMeshInfoBase;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl std::ops::Deref for LocalMeshSidesetInfo {
    type Target = LocalMeshInfoBase;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl DebugInvariants for LocalMeshInfo {
    fn validate_invariants(&self) -> Result<(), LocalMeshError> {
        self.base.validate_invariants()?;
        if let Some((i, &c)) = self
            .base
            .local_cells
            .iter()
            .enumerate()
            .find(|&(i, &c)| i != c)
        {
            return Err(LocalMeshError::InvalidMesh(format!(
                "local cell {i} maps to {c}"
            )));
        }
        for block in self.element_blocks.values() {
            block.base.validate_invariants()?;
        }
        for sideset in self.sidesets.values().flat_map(BTreeMap::values) {
            sideset.base.validate_invariants()?;
        }
        Ok(())
    }
}

impl DebugInvariants for LocalMeshBlockInfo {
    fn validate_invariants(&self) -> Result<(), LocalMeshError> {
        self.base.validate_invariants()
    }
}

impl DebugInvariants for LocalMeshSidesetInfo {
    fn validate_invariants(&self) -> Result<(), LocalMeshError> {
        self.base.validate_invariants()
    }
}
