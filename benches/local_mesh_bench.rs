use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;

use local_mesh::algs::communicator::{Communicator, NoComm, RayonComm};
use local_mesh::algs::local_mesh::{LocalMeshOptions, generate_local_mesh_info_with_options};
use local_mesh::mesh_generation::{block_partition, hex_mesh, quad_mesh};
use local_mesh::topology::in_memory::InMemoryMesh;

fn bench_serial_quad(c: &mut Criterion) {
    let mut group = c.benchmark_group("serial_quad");
    for &n in &[16usize, 32, 64] {
        let global = Arc::new(quad_mesh(n, n, [0.0, 0.0], [1.0, 1.0]).unwrap());
        let mesh = InMemoryMesh::serial(global).unwrap();
        group.bench_with_input(BenchmarkId::new("full", n), &mesh, |b, mesh| {
            b.iter(|| {
                generate_local_mesh_info_with_options(
                    black_box(mesh),
                    &NoComm,
                    &LocalMeshOptions::default(),
                )
                .unwrap()
            });
        });
        let bare = LocalMeshOptions {
            build_blocks: false,
            build_sidesets: false,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::new("no_views", n), &mesh, |b, mesh| {
            b.iter(|| {
                generate_local_mesh_info_with_options(black_box(mesh), &NoComm, &bare).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_threaded_hex(c: &mut Criterion) {
    let mut group = c.benchmark_group("threaded_hex");
    group.sample_size(10);
    for &ranks in &[2usize, 4] {
        let global = Arc::new(hex_mesh(8, 8, 8, [0.0; 3], [1.0; 3]).unwrap());
        let parts = block_partition(global.num_cells(), ranks);
        let meshes: Vec<InMemoryMesh> = (0..ranks)
            .map(|r| InMemoryMesh::new(Arc::clone(&global), &parts, r).unwrap())
            .collect();
        group.bench_with_input(BenchmarkId::new("ranks", ranks), &meshes, |b, meshes| {
            b.iter(|| {
                let world = RayonComm::world(meshes.len());
                std::thread::scope(|s| {
                    for comm in &world {
                        let mesh = &meshes[comm.rank()];
                        s.spawn(move || {
                            generate_local_mesh_info_with_options(
                                mesh,
                                comm,
                                &LocalMeshOptions::default(),
                            )
                            .unwrap()
                        });
                    }
                });
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_serial_quad, bench_threaded_hex);
criterion_main!(benches);
