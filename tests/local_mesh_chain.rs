mod util;

use local_mesh::algs::communicator::CommTag;
use local_mesh::mesh_generation::{
    DEFAULT_BLOCK, SIDESET_LEFT, SIDESET_RIGHT, block_partition, line_mesh,
};
use local_mesh::prelude::*;
use std::sync::Arc;
use util::{run_ranks, view};

fn chain_on_two_ranks() -> Vec<LocalMeshInfo> {
    let global = Arc::new(line_mesh(4, 0.0, 1.0).unwrap());
    let parts = block_partition(4, 2);
    run_ranks(2, |comm| {
        let mesh = view(&global, &parts, comm.rank());
        generate_local_mesh_info(&mesh, comm).unwrap()
    })
}

#[test]
fn chain_has_one_ghost_and_one_virtual_per_rank() {
    let infos = chain_on_two_ranks();
    for info in &infos {
        assert_eq!(info.num_owned_cells, 2);
        assert_eq!(info.num_ghost_cells, 1);
        assert_eq!(info.num_virtual_cells, 1);
        assert_eq!(info.num_faces(), 3);
        assert_eq!(info.local_cells, vec![0, 1, 2, 3]);
        info.validate_invariants().unwrap();
    }
    assert_eq!(infos[0].global_cells, vec![0, 1, 2, 4]);
    assert_eq!(infos[1].global_cells, vec![2, 3, 1, 5]);
}

#[test]
fn chain_faces_are_oriented_smaller_first() {
    let infos = chain_on_two_ranks();
    let rank0 = &infos[0];
    // faces are the chain nodes 0, 1, 2
    assert_eq!(rank0.face_to_cells, vec![[0, 3], [0, 1], [1, 2]]);
    assert_eq!(rank0.face_to_lidx, vec![[0, 0], [1, 0], [1, 0]]);
    assert_eq!(rank0.cell_to_faces.row(3), &[Some(0), None]);
    // the ghost only knows the face it shares with an owned cell
    assert_eq!(rank0.cell_to_faces.row(2), &[Some(2), None]);
}

#[test]
fn chain_geometry() {
    let infos = chain_on_two_ranks();
    let rank0 = &infos[0];
    assert_eq!(rank0.cell_vertices.cell(2), &[0.5, 0.75]);
    assert_eq!(rank0.cell_vertices.cell(3), rank0.cell_vertices.cell(0));
    let rank1 = &infos[1];
    assert_eq!(rank1.cell_vertices.cell(2), &[0.25, 0.5]);
    assert_eq!(rank1.cell_vertices.cell(3), &[0.75, 1.0]);
}

#[test]
fn chain_virtual_ids_follow_real_ids_in_rank_order() {
    let infos = chain_on_two_ranks();
    let virtuals: Vec<u64> = infos
        .iter()
        .flat_map(|i| i.virtual_global_cells().to_vec())
        .collect();
    assert_eq!(virtuals, vec![4, 5]);
}

#[test]
fn chain_views() {
    let infos = chain_on_two_ranks();
    let left = infos[0].sideset(DEFAULT_BLOCK, SIDESET_LEFT).unwrap();
    assert_eq!(left.num_owned_cells, 1);
    assert_eq!(left.num_ghost_cells, 0);
    assert_eq!(left.num_virtual_cells, 1);
    assert_eq!(left.global_cells, vec![0, 4]);

    // the right end lives on rank 1 only
    let right0 = infos[0].sideset(DEFAULT_BLOCK, SIDESET_RIGHT).unwrap();
    assert_eq!(right0.num_total_cells(), 0);
    let right1 = infos[1].sideset(DEFAULT_BLOCK, SIDESET_RIGHT).unwrap();
    assert_eq!(right1.global_cells, vec![3, 5]);

    let block = infos[1].block(DEFAULT_BLOCK).unwrap();
    assert_eq!(block.base, infos[1].base);
}

#[test]
fn chain_ids_are_globally_unique() {
    let global = Arc::new(line_mesh(4, 0.0, 1.0).unwrap());
    let parts = block_partition(4, 2);
    let unique = run_ranks(2, |comm| {
        let mesh = view(&global, &parts, comm.rank());
        let info = generate_local_mesh_info(&mesh, comm).unwrap();
        global_ids_are_unique(&info, comm, CommTag::new(0x7000)).unwrap()
    });
    assert_eq!(unique, vec![true, true]);
}
