//! An in-memory [`MeshBackend`]: a globally described mesh viewed through
//! one rank of a given cell partition.
//!
//! Every rank holds the whole [`GlobalMesh`] (shared through an `Arc`) but
//! only reports its own cells. Global subcell ids for edges and faces are
//! derived from the sorted vertex ids of each subcell, numbered in
//! ascending key order so that all ranks agree on them.

use crate::data::cell_vertices::CellVertices;
use crate::mesh_error::LocalMeshError;
use crate::topology::backend::{Connectivity, MeshBackend, SubcellRelation};
use crate::topology::cell_type::CellTopology;
use crate::topology::field_pattern::FieldPattern;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// One side of a sideset: local face `face` of global cell index `cell`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Side {
    pub cell: usize,
    pub face: usize,
}

/// Whole-mesh description shared by every rank.
#[derive(Clone, Debug, Default)]
pub struct GlobalMesh {
    /// Spatial dimension.
    pub dimension: usize,
    /// Flat node coordinates, `dimension` values per node.
    pub coordinates: Vec<f64>,
    /// Node indices of every cell.
    pub cells: Vec<Vec<usize>>,
    /// Global id of every cell; defaults to the cell index.
    pub cell_ids: Vec<u64>,
    /// Block index of every cell.
    pub cell_blocks: Vec<usize>,
    /// Block names and topologies.
    pub blocks: Vec<(String, CellTopology)>,
    pub sidesets: BTreeMap<String, Vec<Side>>,
}

impl GlobalMesh {
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.coordinates.len() / self.dimension.max(1)
    }

    fn topology_of(&self, cell: usize) -> CellTopology {
        self.blocks[self.cell_blocks[cell]].1
    }

    /// Sorted node ids of subcell `(dim, index)` of `cell`.
    fn subcell_key(
        &self,
        cell: usize,
        dim: usize,
        index: usize,
    ) -> Result<Vec<u64>, LocalMeshError> {
        let topo = self.topology_of(cell);
        let verts = topo.subcell_vertices(dim, index)?;
        Ok(verts
            .iter()
            .map(|&v| self.cells[cell][v] as u64)
            .sorted_unstable()
            .collect())
    }

    /// Global numbering of every subcell of dimension `dim` across the mesh.
    /// Vertices keep their node id.
    fn subcell_numbering(&self, dim: usize) -> Result<HashMap<Vec<u64>, u64>, LocalMeshError> {
        if dim == 0 {
            return Ok((0..self.num_nodes() as u64).map(|n| (vec![n], n)).collect());
        }
        let mut keys = BTreeSet::new();
        for cell in 0..self.num_cells() {
            let topo = self.topology_of(cell);
            for index in 0..topo.subcell_count(dim) {
                keys.insert(self.subcell_key(cell, dim, index)?);
            }
        }
        Ok(keys
            .into_iter()
            .enumerate()
            .map(|(id, key)| (key, id as u64))
            .collect())
    }

    /// Check the description for obvious inconsistencies.
    pub fn validate(&self) -> Result<(), LocalMeshError> {
        let n = self.num_cells();
        if self.cell_ids.len() != n || self.cell_blocks.len() != n {
            return Err(LocalMeshError::InvalidMesh(format!(
                "{n} cells but {} ids and {} block entries",
                self.cell_ids.len(),
                self.cell_blocks.len()
            )));
        }
        let nodes = self.num_nodes();
        for (cell, verts) in self.cells.iter().enumerate() {
            let block = self.cell_blocks[cell];
            let (_, topo) = self.blocks.get(block).ok_or_else(|| {
                LocalMeshError::InvalidMesh(format!("cell {cell} is in missing block {block}"))
            })?;
            if verts.len() != topo.vertex_count() {
                return Err(LocalMeshError::InvalidMesh(format!(
                    "cell {cell} has {} nodes, `{topo}` needs {}",
                    verts.len(),
                    topo.vertex_count()
                )));
            }
            if let Some(&bad) = verts.iter().find(|&&v| v >= nodes) {
                return Err(LocalMeshError::InvalidMesh(format!(
                    "cell {cell} references missing node {bad}"
                )));
            }
        }
        let mut seen = BTreeSet::new();
        if let Some(&dup) = self.cell_ids.iter().find(|&&id| !seen.insert(id)) {
            return Err(LocalMeshError::DuplicateGlobalId(dup));
        }
        if seen.contains(&u64::MAX) {
            return Err(LocalMeshError::ReservedGlobalId(u64::MAX));
        }
        for (name, sides) in &self.sidesets {
            for side in sides {
                let Some(&block) = self.cell_blocks.get(side.cell) else {
                    return Err(LocalMeshError::InvalidMesh(format!(
                        "sideset `{name}` references missing cell {}",
                        side.cell
                    )));
                };
                let topo = self.blocks[block].1;
                if side.face >= topo.face_count() {
                    return Err(LocalMeshError::InvalidMesh(format!(
                        "sideset `{name}` references face {} of cell {}, `{topo}` has {}",
                        side.face,
                        side.cell,
                        topo.face_count()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One rank's view of a partitioned [`GlobalMesh`].
#[derive(Clone, Debug)]
pub struct InMemoryMesh {
    global: Arc<GlobalMesh>,
    /// Global cell index of every local cell, blocks back to back.
    local_to_global: Vec<usize>,
    /// Local cell range of every block.
    block_ranges: Vec<std::ops::Range<usize>>,
    /// Local index of every owned cell id.
    local_ids: HashMap<u64, usize>,
}

impl InMemoryMesh {
    /// View of the cells with `parts[cell] == rank`.
    pub fn new(
        global: Arc<GlobalMesh>,
        parts: &[usize],
        rank: usize,
    ) -> Result<Self, LocalMeshError> {
        global.validate()?;
        if parts.len() != global.num_cells() {
            return Err(LocalMeshError::ExtentMismatch {
                what: "cell partition",
                expected: global.num_cells(),
                found: parts.len(),
            });
        }
        let mut local_to_global = Vec::new();
        let mut block_ranges = Vec::with_capacity(global.blocks.len());
        for block in 0..global.blocks.len() {
            let start = local_to_global.len();
            local_to_global.extend(
                (0..global.num_cells())
                    .filter(|&c| parts[c] == rank && global.cell_blocks[c] == block),
            );
            block_ranges.push(start..local_to_global.len());
        }
        let local_ids = local_to_global
            .iter()
            .enumerate()
            .map(|(local, &cell)| (global.cell_ids[cell], local))
            .collect();
        Ok(Self {
            global,
            local_to_global,
            block_ranges,
            local_ids,
        })
    }

    /// Single-rank view owning every cell.
    pub fn serial(global: Arc<GlobalMesh>) -> Result<Self, LocalMeshError> {
        let parts = vec![0; global.num_cells()];
        Self::new(global, &parts, 0)
    }

    pub fn global_mesh(&self) -> &GlobalMesh {
        &self.global
    }

    /// Global cell index of local cell `local`.
    pub fn global_cell_index(&self, local: usize) -> Option<usize> {
        self.local_to_global.get(local).copied()
    }

    fn block_index(&self, name: &str) -> Option<usize> {
        self.global.blocks.iter().position(|(n, _)| n == name)
    }

    fn unknown_block(&self, name: &str) -> LocalMeshError {
        LocalMeshError::UnknownElementBlock {
            name: name.to_string(),
            available: self.element_block_names(),
        }
    }
}

impl MeshBackend for InMemoryMesh {
    fn dimension(&self) -> usize {
        self.global.dimension
    }

    fn element_block_names(&self) -> Vec<String> {
        self.global.blocks.iter().map(|(n, _)| n.clone()).collect()
    }

    fn block_topology(&self, block: &str) -> Result<CellTopology, LocalMeshError> {
        self.block_index(block)
            .map(|b| self.global.blocks[b].1)
            .ok_or_else(|| self.unknown_block(block))
    }

    fn block_local_cells(&self, block: &str) -> Result<Vec<usize>, LocalMeshError> {
        self.block_index(block)
            .map(|b| self.block_ranges[b].clone().collect())
            .ok_or_else(|| self.unknown_block(block))
    }

    fn num_local_cells(&self) -> usize {
        self.local_to_global.len()
    }

    fn block_id(&self, local_cell: usize) -> Option<&str> {
        let cell = self.global_cell_index(local_cell)?;
        Some(self.global.blocks[self.global.cell_blocks[cell]].0.as_str())
    }

    fn element_local_id(&self, cell: u64) -> Option<usize> {
        self.local_ids.get(&cell).copied()
    }

    fn connectivity(&self, pattern: FieldPattern) -> Result<Connectivity, LocalMeshError> {
        let dim = pattern.subcell_dimension();
        let g = &self.global;
        let numbering = match dim {
            0 => None,
            _ => Some(g.subcell_numbering(dim)?),
        };
        let mut conn = Connectivity::new();
        for &cell in &self.local_to_global {
            let topo = g.topology_of(cell);
            if dim == topo.dimension() {
                conn.push_cell([g.cell_ids[cell]]);
                continue;
            }
            let mut row = Vec::with_capacity(topo.subcell_count(dim));
            for index in 0..topo.subcell_count(dim) {
                let id = match &numbering {
                    None => g.cells[cell][index] as u64,
                    Some(numbers) => {
                        let key = g.subcell_key(cell, dim, index)?;
                        numbers.get(&key).copied().ok_or_else(|| {
                            LocalMeshError::InvalidMesh(format!(
                                "subcell {index} of cell {cell} has no global id"
                            ))
                        })?
                    }
                };
                row.push(id);
            }
            conn.push_cell(row);
        }
        Ok(conn)
    }

    fn element_vertices(&self, local_cells: &[usize]) -> Result<CellVertices, LocalMeshError> {
        let g = &self.global;
        let dim = g.dimension;
        let vertices_per_cell = match local_cells.first() {
            Some(&c) => {
                let cell = self
                    .global_cell_index(c)
                    .ok_or(LocalMeshError::UnknownLocalCell(c))?;
                g.topology_of(cell).vertex_count()
            }
            None => 0,
        };
        let mut data = Vec::with_capacity(local_cells.len() * vertices_per_cell * dim);
        for &local in local_cells {
            let cell = self
                .global_cell_index(local)
                .ok_or(LocalMeshError::UnknownLocalCell(local))?;
            let nodes = &g.cells[cell];
            if nodes.len() != vertices_per_cell {
                return Err(LocalMeshError::ExtentMismatch {
                    what: "element vertices per cell",
                    expected: vertices_per_cell,
                    found: nodes.len(),
                });
            }
            for &n in nodes {
                data.extend_from_slice(&g.coordinates[n * dim..(n + 1) * dim]);
            }
        }
        CellVertices::from_vec(data, local_cells.len(), vertices_per_cell, dim)
    }

    fn sideset_names(&self) -> Vec<String> {
        self.global.sidesets.keys().cloned().collect()
    }

    fn side_entities(&self, sideset: &str, block: &str) -> Result<Vec<u64>, LocalMeshError> {
        let sides = self.global.sidesets.get(sideset).ok_or_else(|| {
            LocalMeshError::UnknownSideset {
                name: sideset.to_string(),
                available: self.sideset_names(),
            }
        })?;
        let b = self
            .block_index(block)
            .ok_or_else(|| self.unknown_block(block))?;
        let g = &self.global;
        let Some(dim) = g.blocks[b].1.dimension().checked_sub(1) else {
            return Ok(Vec::new());
        };
        let numbering = g.subcell_numbering(dim)?;
        let mut ids = Vec::new();
        for side in sides {
            if g.cell_blocks.get(side.cell) != Some(&b) {
                continue;
            }
            let key = g.subcell_key(side.cell, dim, side.face)?;
            let id = numbering.get(&key).copied().ok_or_else(|| {
                LocalMeshError::InvalidMesh(format!(
                    "side {} of cell {} in sideset `{sideset}` has no global id",
                    side.face, side.cell
                ))
            })?;
            ids.push(id);
        }
        Ok(ids.into_iter().sorted_unstable().dedup().collect())
    }

    fn side_element_cascade(
        &self,
        block: &str,
        sides: &[u64],
    ) -> Result<Vec<SubcellRelation>, LocalMeshError> {
        let b = self
            .block_index(block)
            .ok_or_else(|| self.unknown_block(block))?;
        let g = &self.global;
        let topo = g.blocks[b].1;
        let face_dim = topo.dimension() - 1;
        let faces = g.subcell_numbering(face_dim)?;
        let wanted: BTreeSet<u64> = sides.iter().copied().collect();

        // node sets of the sides, and every node on a side
        let side_keys: BTreeSet<Vec<u64>> = faces
            .iter()
            .filter(|(_, id)| wanted.contains(*id))
            .map(|(key, _)| key.clone())
            .collect();
        let side_nodes: BTreeSet<u64> = side_keys.iter().flatten().copied().collect();

        let mut out = Vec::new();
        for local in self.block_ranges[b].clone() {
            let cell = self.local_to_global[local];
            for dim in (0..=face_dim).rev() {
                for index in 0..topo.subcell_count(dim) {
                    let key = g.subcell_key(cell, dim, index)?;
                    let touches = if dim == face_dim {
                        side_keys.contains(&key)
                    } else {
                        key.iter().all(|n| side_nodes.contains(n))
                    };
                    if touches {
                        out.push(SubcellRelation {
                            element: g.cell_ids[cell],
                            dimension: dim,
                            index,
                        });
                    }
                }
            }
        }
        Ok(out)
    }
}
