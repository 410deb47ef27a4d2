#![allow(dead_code)]
use local_mesh::algs::communicator::RayonComm;
use local_mesh::topology::in_memory::{GlobalMesh, InMemoryMesh};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Run `f` once per rank of a fresh `size`-rank world, each rank on its own
/// thread. Results come back in rank order.
pub fn run_ranks<F, R>(size: usize, f: F) -> Vec<R>
where
    F: Fn(&RayonComm) -> R + Sync,
    R: Send,
{
    let world = RayonComm::world(size);
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = world.iter().map(|comm| s.spawn(move || f(comm))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Rank `rank`'s view of `global` under `parts`.
pub fn view(global: &Arc<GlobalMesh>, parts: &[usize], rank: usize) -> InMemoryMesh {
    InMemoryMesh::new(Arc::clone(global), parts, rank).unwrap()
}

/// Global ids of the cells not owned by `rank` that share a node with one
/// of its cells.
pub fn expected_one_ring(global: &GlobalMesh, parts: &[usize], rank: usize) -> Vec<u64> {
    let owned_nodes: BTreeSet<usize> = (0..global.num_cells())
        .filter(|&c| parts[c] == rank)
        .flat_map(|c| global.cells[c].iter().copied())
        .collect();
    let ring: BTreeSet<u64> = (0..global.num_cells())
        .filter(|&c| parts[c] != rank)
        .filter(|&c| global.cells[c].iter().any(|n| owned_nodes.contains(n)))
        .map(|c| global.cell_ids[c])
        .collect();
    ring.into_iter().collect()
}

/// Faces (as sorted node lists) of every cell, with the cells touching them.
pub fn face_cells(
    global: &GlobalMesh,
    faces_of: impl Fn(&[usize]) -> Vec<Vec<usize>>,
) -> BTreeMap<Vec<usize>, Vec<usize>> {
    let mut out: BTreeMap<Vec<usize>, Vec<usize>> = BTreeMap::new();
    for (c, nodes) in global.cells.iter().enumerate() {
        for mut face in faces_of(nodes) {
            face.sort_unstable();
            out.entry(face).or_default().push(c);
        }
    }
    out
}

/// Edges of a quadrilateral in local order (bottom, right, top, left).
pub fn quad_edges(nodes: &[usize]) -> Vec<Vec<usize>> {
    vec![
        vec![nodes[0], nodes[1]],
        vec![nodes[1], nodes[2]],
        vec![nodes[2], nodes[3]],
        vec![nodes[3], nodes[0]],
    ]
}
