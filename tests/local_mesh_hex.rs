mod util;

use local_mesh::algs::communicator::CommTag;
use local_mesh::mesh_generation::{DEFAULT_BLOCK, SIDESET_FRONT, block_partition, hex_mesh};
use local_mesh::prelude::*;
use std::sync::Arc;
use util::{expected_one_ring, run_ranks, view};

#[test]
fn hex_cube_on_three_ranks() {
    let global = Arc::new(hex_mesh(2, 2, 2, [0.0; 3], [1.0; 3]).unwrap());
    let parts = block_partition(8, 3);
    let results = run_ranks(3, |comm| {
        let mesh = view(&global, &parts, comm.rank());
        let info = generate_local_mesh_info(&mesh, comm).unwrap();
        let unique = global_ids_are_unique(&info, comm, CommTag::new(0x7000)).unwrap();
        (info, unique)
    });

    let mut virtuals = Vec::new();
    for (rank, (info, unique)) in results.iter().enumerate() {
        assert!(unique);
        // every cell of a 2x2x2 cube shares the centre node
        assert_eq!(info.ghost_global_cells(), &expected_one_ring(&global, &parts, rank)[..]);
        assert_eq!(info.num_owned_cells + info.num_ghost_cells, 8);
        // each hex has three faces on the cube boundary
        assert_eq!(info.num_virtual_cells, 3 * info.num_owned_cells);
        assert_eq!(info.cell_to_faces.faces_per_cell(), 6);
        assert_eq!(info.cell_vertices.vertices_per_cell(), 8);
        assert_eq!(info.cell_vertices.dimension(), 3);
        info.validate_invariants().unwrap();
        virtuals.extend_from_slice(info.virtual_global_cells());
    }
    assert_eq!(virtuals, (8..32).collect::<Vec<u64>>());
}

#[test]
fn hex_front_sideset() {
    let global = Arc::new(hex_mesh(3, 2, 2, [0.0; 3], [3.0, 2.0, 2.0]).unwrap());
    let mesh = InMemoryMesh::serial(global).unwrap();
    let info = generate_local_mesh_info(&mesh, &NoComm).unwrap();
    let front = info.sideset(DEFAULT_BLOCK, SIDESET_FRONT).unwrap();
    assert_eq!(front.num_owned_cells, 6);
    assert_eq!(front.num_virtual_cells, 6);
    assert_eq!(front.num_ghost_cells, 0);
    // virtual cells mirror their real neighbor, which all lie at z in [1, 2]
    for v in front.num_real_cells()..front.num_total_cells() {
        let z_min = (0..8)
            .map(|k| front.cell_vertices.get(v, k, 2))
            .fold(f64::INFINITY, f64::min);
        assert_eq!(z_min, 1.0);
    }
}
