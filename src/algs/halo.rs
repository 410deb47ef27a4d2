//! One-ring halo discovery through shared nodes.

use crate::algs::communicator::{Communicator, MeshCommTags};
use crate::algs::global_ids::GlobalIdTable;
use crate::algs::incidence::build_node_to_cell_matrix;
use crate::data::crs::CrsIncidence;
use crate::mesh_error::LocalMeshError;
use std::collections::{BTreeSet, HashSet};

/// Cells of `node_to_cell` not in `owned_cells`, ascending and without
/// repeats.
pub fn ghosted_cells_from_incidence(owned_cells: &[u64], node_to_cell: &CrsIncidence) -> Vec<u64> {
    let mut known: HashSet<u64> = owned_cells.iter().copied().collect();
    let mut ghosts = BTreeSet::new();
    for &node in node_to_cell.row_map().global_ids() {
        for cell in node_to_cell.row_columns(node) {
            if known.insert(cell) {
                ghosts.insert(cell);
            }
        }
    }
    ghosts.into_iter().collect()
}

/// Global ids of every cell owned elsewhere that shares at least one node
/// with an owned cell, in ascending order.
///
/// Collective.
pub fn build_ghosted_cell_one_ring<C>(
    comm: &C,
    owned_cells: &[u64],
    owned_cells_to_nodes: &GlobalIdTable,
    tags: &MeshCommTags,
) -> Result<Vec<u64>, LocalMeshError>
where
    C: Communicator + ?Sized,
{
    let node_to_cell = build_node_to_cell_matrix(comm, owned_cells, owned_cells_to_nodes, tags)?;
    let ghosts = ghosted_cells_from_incidence(owned_cells, &node_to_cell);
    log::debug!("rank {}: {} ghost cells in the one-ring", comm.rank(), ghosts.len());
    Ok(ghosts)
}
