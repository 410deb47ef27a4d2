//! Distributed map of the nodes referenced by a rank's cells.

use crate::algs::global_ids::GlobalIdTable;
use crate::data::dist_map::DistributedMap;
use crate::mesh_error::LocalMeshError;
use std::collections::BTreeSet;

/// Map over the distinct node ids of `cells_to_nodes`, ascending.
///
/// The map usually overlaps with other ranks' maps: a node touched here is
/// not necessarily owned here.
pub fn build_node_map(cells_to_nodes: &GlobalIdTable) -> Result<DistributedMap, LocalMeshError> {
    let nodes: BTreeSet<u64> = cells_to_nodes.ids().collect();
    DistributedMap::new(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_are_unique_and_sorted() {
        let table = GlobalIdTable::from_rows(&[vec![7u64, 3, 5], vec![5u64, 3]]);
        let map = build_node_map(&table).unwrap();
        assert_eq!(map.global_ids(), &[3, 5, 7]);
    }
}
