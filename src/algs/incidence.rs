//! Node ↔ cell incidence through a distributed transpose.
//!
//! Each rank inserts one row per owned cell (`cell gid -> node gids`, value
//! = local node slot). The matrix is transposed onto a one-to-one node map,
//! which collects every cell of the world touching each uniquely owned node,
//! and the transposed rows are then imported onto the overlapping node map
//! so every node referenced locally sees all of its cells.

use crate::algs::communicator::{Communicator, MeshCommTags};
use crate::algs::global_ids::GlobalIdTable;
use crate::algs::node_map::build_node_map;
use crate::data::crs::CrsIncidence;
use crate::data::dist_map::DistributedMap;
use crate::mesh_error::LocalMeshError;

/// `node gid -> cell gids` for every node referenced by `owned_cells`.
///
/// Collective.
pub fn build_node_to_cell_matrix<C>(
    comm: &C,
    owned_cells: &[u64],
    owned_cells_to_nodes: &GlobalIdTable,
    tags: &MeshCommTags,
) -> Result<CrsIncidence, LocalMeshError>
where
    C: Communicator + ?Sized,
{
    if owned_cells.len() != owned_cells_to_nodes.num_rows() {
        return Err(LocalMeshError::ExtentMismatch {
            what: "owned cells vs cell to node rows",
            expected: owned_cells.len(),
            found: owned_cells_to_nodes.num_rows(),
        });
    }

    let node_map = build_node_map(owned_cells_to_nodes)?;
    let unique_node_map = node_map.create_one_to_one(comm, tags.node_map)?;
    let cell_map = DistributedMap::new(owned_cells.iter().copied())?;

    let mut cell_to_node = CrsIncidence::new(cell_map);
    for (i, &cell) in owned_cells.iter().enumerate() {
        let (slots, nodes): (Vec<i32>, Vec<u64>) = owned_cells_to_nodes
            .nodes(i)
            .map(|(slot, node)| (slot as i32, node))
            .unzip();
        cell_to_node.insert_global_values(cell, &nodes, &slots)?;
    }
    cell_to_node.fill_complete();

    let transposed = cell_to_node.transpose(&unique_node_map, comm, tags.transpose)?;
    let node_to_cell = transposed.import(&node_map, comm, tags.incidence_import)?;
    log::debug!(
        "rank {}: node to cell incidence over {} nodes ({} unique), {} entries",
        comm.rank(),
        node_map.num_local(),
        unique_node_map.num_local(),
        node_to_cell.num_entries()
    );
    Ok(node_to_cell)
}
