//! Construction of the per-rank [`LocalMeshInfo`].
//!
//! Stages, every one of them collective and entered in the same order on
//! every rank:
//!
//! 1. owned cell global ids and their node ids from the backend;
//! 2. the one-ring halo through the node ↔ cell incidence;
//! 3. ghost cell vertices imported from their owners;
//! 4. face pairing across ranks, virtual cells on unpaired faces;
//! 5. rank-ordered virtual cell global ids;
//! 6. element block and sideset views.

use crate::algs::communicator::{CommTag, Communicator, MeshCommTags};
use crate::algs::exchange::{all_reduce_sum, all_to_all_records, allgather_u64};
use crate::algs::face_to_element::FaceToElement;
use crate::algs::global_ids::{block_topology, build_cell_global_ids, build_cell_to_nodes};
use crate::algs::halo::build_ghosted_cell_one_ring;
use crate::algs::subset::{setup_local_mesh_block_info, setup_local_mesh_sideset_info};
use crate::algs::vertex_exchange::build_ghosted_vertices;
use crate::algs::wire::WireEntry;
use crate::data::dist_map::{DistributedMap, directory_rank};
use crate::data::importer::Importer;
use crate::data::local_mesh_info::{CellToFaces, LocalMeshInfo, LocalMeshInfoBase};
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::LocalMeshError;
use crate::topology::backend::MeshBackend;
use std::collections::{BTreeMap, HashMap};

/// Knobs for [`generate_local_mesh_info_with_options`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalMeshOptions {
    pub tags: MeshCommTags,
    /// Build one view per element block.
    pub build_blocks: bool,
    /// Build one view per (element block, sideset) pair.
    pub build_sidesets: bool,
}

impl Default for LocalMeshOptions {
    fn default() -> Self {
        Self {
            tags: MeshCommTags::default(),
            build_blocks: true,
            build_sidesets: true,
        }
    }
}

/// Face tables in local numbering, virtual cells appended after the real
/// ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectedFaces {
    pub num_virtual_cells: usize,
    pub cell_to_faces: CellToFaces,
    pub face_to_cells: Vec<[usize; 2]>,
    pub face_to_lidx: Vec<[usize; 2]>,
}

/// Translate paired faces into local indices.
///
/// `global_to_local` covers the `num_real` owned and ghost cells. Every
/// missing side gets the next virtual local index (starting at `num_real`)
/// and presents local face 0. The smaller local index is stored on side 0.
pub fn connect_faces(
    faces: &FaceToElement,
    global_to_local: &HashMap<u64, usize>,
    num_real: usize,
    faces_per_cell: usize,
) -> Result<ConnectedFaces, LocalMeshError> {
    let num_virtual = faces.num_boundary_faces();
    let mut out = ConnectedFaces {
        num_virtual_cells: 0,
        cell_to_faces: CellToFaces::new(num_real + num_virtual, faces_per_cell),
        face_to_cells: Vec::with_capacity(faces.num_faces()),
        face_to_lidx: Vec::with_capacity(faces.num_faces()),
    };

    for (f, record) in faces.faces().iter().enumerate() {
        let mut sides = [(0usize, 0usize); 2];
        let mut virtual_sides = 0;
        for (side, (cell, lidx)) in sides
            .iter_mut()
            .zip(record.cells.iter().zip(record.lidx.iter()))
        {
            *side = match cell {
                Some(gid) => {
                    let local = global_to_local
                        .get(gid)
                        .copied()
                        .ok_or(LocalMeshError::UnknownGlobalId(*gid))?;
                    (local, lidx.unwrap_or_default())
                }
                None => {
                    virtual_sides += 1;
                    let local = num_real + out.num_virtual_cells;
                    out.num_virtual_cells += 1;
                    (local, 0)
                }
            };
        }
        if virtual_sides == 2 {
            return Err(LocalMeshError::FaceBetweenVirtualCells { face: f });
        }
        if sides[1].0 < sides[0].0 {
            sides.swap(0, 1);
        }
        for &(cell, lidx) in &sides {
            out.cell_to_faces.set(cell, lidx, f)?;
        }
        out.face_to_cells.push([sides[0].0, sides[1].0]);
        out.face_to_lidx.push([sides[0].1, sides[1].1]);
    }
    Ok(out)
}

/// Global ids for this rank's virtual cells.
///
/// Virtual ids start past the real id space, `max(total real cells,
/// largest real id + 1)`, and each rank takes a contiguous range in rank
/// order. Fails on every rank alike when the ranges would reach
/// `u64::MAX`, which is reserved.
///
/// Collective.
pub fn assign_virtual_cell_ids<C>(
    comm: &C,
    num_owned: usize,
    num_virtual: usize,
    max_owned_gid: Option<u64>,
) -> Result<Vec<u64>, LocalMeshError>
where
    C: Communicator + ?Sized,
{
    let total_real = all_reduce_sum(&[num_owned as u64], comm)[0];
    let real_end = allgather_u64(max_owned_gid.map_or(0, |g| g.saturating_add(1)), comm)
        .into_iter()
        .max()
        .unwrap_or(0)
        .max(total_real);
    let counts = allgather_u64(num_virtual as u64, comm);
    let total_virtual = counts.iter().fold(0u64, |acc, &c| acc.saturating_add(c));
    if real_end.checked_add(total_virtual).is_none() {
        return Err(LocalMeshError::GlobalIdOverflow {
            start: real_end,
            count: total_virtual,
        });
    }
    let start = real_end + counts[..comm.rank()].iter().sum::<u64>();
    let end = start + num_virtual as u64;
    log::debug!("rank {}: virtual cell ids [{start}, {end})", comm.rank());
    Ok((start..end).collect())
}

const OWNED: i32 = 0;
const GHOST: i32 = 1;
const VIRTUAL: i32 = 2;

/// Check across every rank that each global cell id is owned (or virtual)
/// exactly once, and that every ghost refers to an owned cell.
///
/// Collective; uses tags `tag..tag+1`.
pub fn global_ids_are_unique<C>(
    info: &LocalMeshInfoBase,
    comm: &C,
    tag: CommTag,
) -> Result<bool, LocalMeshError>
where
    C: Communicator + ?Sized,
{
    let size = comm.size();
    let mut send: Vec<Vec<WireEntry>> = vec![Vec::new(); size];
    for (i, &gid) in info.global_cells.iter().enumerate() {
        let kind = if info.is_owned(i) {
            OWNED
        } else if info.is_ghost(i) {
            GHOST
        } else {
            VIRTUAL
        };
        send[directory_rank(gid, size)].push(WireEntry::new(gid, comm.rank() as u64, kind));
    }
    let incoming = all_to_all_records(&send, comm, tag)?;

    let mut counts: BTreeMap<u64, [u64; 3]> = BTreeMap::new();
    for e in incoming.iter().flatten() {
        counts.entry(e.row()).or_default()[e.val() as usize] += 1;
    }
    let violations = counts
        .values()
        .filter(|&&[owned, ghost, virt]| owned + virt != 1 || (ghost > 0 && owned != 1))
        .count() as u64;
    if violations > 0 {
        log::warn!("rank {}: {violations} non-unique global cell ids", comm.rank());
    }
    Ok(all_reduce_sum(&[violations], comm)[0] == 0)
}

/// Build this rank's local mesh with default options.
///
/// Collective.
pub fn generate_local_mesh_info<B, C>(
    backend: &B,
    comm: &C,
) -> Result<LocalMeshInfo, LocalMeshError>
where
    B: MeshBackend + ?Sized,
    C: Communicator + ?Sized,
{
    generate_local_mesh_info_with_options(backend, comm, &LocalMeshOptions::default())
}

/// Build this rank's local mesh.
///
/// Collective. Every rank must pass the same `options`.
pub fn generate_local_mesh_info_with_options<B, C>(
    backend: &B,
    comm: &C,
    options: &LocalMeshOptions,
) -> Result<LocalMeshInfo, LocalMeshError>
where
    B: MeshBackend + ?Sized,
    C: Communicator + ?Sized,
{
    let tags = &options.tags;
    let topology = block_topology(backend)?;
    let cell_to_nodes = build_cell_to_nodes(backend)?;
    let owned_cells = build_cell_global_ids(backend)?;
    let num_owned = owned_cells.len();

    let ghost_cells = build_ghosted_cell_one_ring(comm, &owned_cells, &cell_to_nodes, tags)?;
    let num_ghost = ghost_cells.len();
    let num_real = num_owned + num_ghost;

    let owned_map = DistributedMap::new(owned_cells.iter().copied())?;
    let ghost_map = DistributedMap::new(ghost_cells.iter().copied())?;
    let importer = Importer::new(&owned_map, &ghost_map, comm, tags.cell_import)?;

    let local_ids: Vec<usize> = (0..num_owned).collect();
    let owned_vertices = backend.element_vertices(&local_ids)?;
    if owned_vertices.num_cells() != num_owned {
        return Err(LocalMeshError::ExtentMismatch {
            what: "owned cell vertices",
            expected: num_owned,
            found: owned_vertices.num_cells(),
        });
    }
    if num_owned > 0 && owned_vertices.vertices_per_cell() != topology.vertex_count() {
        return Err(LocalMeshError::ExtentMismatch {
            what: "vertices per cell",
            expected: topology.vertex_count(),
            found: owned_vertices.vertices_per_cell(),
        });
    }
    if num_owned > 0 && owned_vertices.dimension() != backend.dimension() {
        return Err(LocalMeshError::ExtentMismatch {
            what: "vertex coordinate dimension",
            expected: backend.dimension(),
            found: owned_vertices.dimension(),
        });
    }
    let ghost_vertices =
        build_ghosted_vertices(&importer, &owned_vertices, comm, tags.vertex_exchange)?;

    let global_to_local: HashMap<u64, usize> = owned_cells
        .iter()
        .chain(&ghost_cells)
        .enumerate()
        .map(|(i, &gid)| (gid, i))
        .collect();

    let faces = FaceToElement::build(backend, &owned_cells, comm, tags.faces)?;
    let connected = connect_faces(&faces, &global_to_local, num_real, topology.face_count())?;
    let num_virtual = connected.num_virtual_cells;
    let virtual_ids = assign_virtual_cell_ids(
        comm,
        num_owned,
        num_virtual,
        owned_cells.iter().max().copied(),
    )?;

    let mut cell_vertices = owned_vertices;
    cell_vertices.append(&ghost_vertices)?;
    cell_vertices.resize(num_real + num_virtual);

    let mut base = LocalMeshInfoBase {
        num_owned_cells: num_owned,
        num_ghost_cells: num_ghost,
        num_virtual_cells: num_virtual,
        local_cells: (0..num_real + num_virtual).collect(),
        global_cells: owned_cells
            .iter()
            .chain(&ghost_cells)
            .chain(&virtual_ids)
            .copied()
            .collect(),
        cell_vertices,
        cell_to_faces: connected.cell_to_faces,
        face_to_cells: connected.face_to_cells,
        face_to_lidx: connected.face_to_lidx,
    };
    for cell in num_real..num_real + num_virtual {
        let neighbor = base
            .virtual_neighbor(cell)
            .filter(|&n| n < num_real)
            .ok_or(LocalMeshError::VirtualCellWithoutNeighbor { cell })?;
        base.cell_vertices.copy_cell(neighbor, cell);
    }
    log::debug!(
        "rank {}: cells {num_owned} owned / {num_ghost} ghost / {num_virtual} virtual, {} faces",
        comm.rank(),
        base.num_faces()
    );
    crate::debug_invariants!(base.validate_invariants(), "local mesh");

    let mut info = LocalMeshInfo {
        base,
        cell_topology: Some(topology),
        ..Default::default()
    };
    let block_names = backend.element_block_names();
    if options.build_blocks {
        for name in &block_names {
            let block = setup_local_mesh_block_info(backend, &info.base, name)?;
            info.element_blocks.insert(name.clone(), block);
        }
    }
    if options.build_sidesets {
        for block in &block_names {
            let mut views = BTreeMap::new();
            for sideset in backend.sideset_names() {
                let view = setup_local_mesh_sideset_info(backend, &info.base, block, &sideset)?;
                views.insert(sideset, view);
            }
            info.sidesets.insert(block.clone(), views);
        }
    }
    crate::debug_invariants!(info.validate_invariants(), "local mesh views");
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::algs::face_to_element::FaceRecord;
    use crate::mesh_generation::{DEFAULT_BLOCK, SIDESET_LEFT, line_mesh, quad_mesh};
    use crate::topology::in_memory::InMemoryMesh;
    use std::sync::Arc;

    fn record(face: u64, cells: [Option<u64>; 2], lidx: [Option<usize>; 2]) -> FaceRecord {
        FaceRecord { face, cells, lidx }
    }

    #[test]
    fn boundary_faces_get_virtual_cells() {
        let faces = FaceToElement::from_records(vec![
            record(0, [Some(7), None], [Some(0), None]),
            record(1, [Some(7), Some(8)], [Some(1), Some(0)]),
            record(2, [Some(8), None], [Some(1), None]),
        ]);
        let lookup = HashMap::from([(7, 0), (8, 1)]);
        let c = connect_faces(&faces, &lookup, 2, 2).unwrap();
        assert_eq!(c.num_virtual_cells, 2);
        assert_eq!(c.face_to_cells, vec![[0, 2], [0, 1], [1, 3]]);
        assert_eq!(c.face_to_lidx, vec![[0, 0], [1, 0], [1, 0]]);
        assert_eq!(c.cell_to_faces.row(3), &[Some(2), None]);
    }

    #[test]
    fn smaller_local_index_comes_first() {
        let faces = FaceToElement::from_records(vec![record(
            4,
            [Some(9), Some(3)],
            [Some(2), Some(0)],
        )]);
        let lookup = HashMap::from([(3, 0), (9, 1)]);
        let c = connect_faces(&faces, &lookup, 2, 4).unwrap();
        assert_eq!(c.face_to_cells, vec![[0, 1]]);
        assert_eq!(c.face_to_lidx, vec![[0, 2]]);
    }

    #[test]
    fn unknown_cell_is_an_error() {
        let faces =
            FaceToElement::from_records(vec![record(0, [Some(5), None], [Some(0), None])]);
        let err = connect_faces(&faces, &HashMap::new(), 0, 2).unwrap_err();
        assert!(matches!(err, LocalMeshError::UnknownGlobalId(5)));
    }

    #[test]
    fn face_without_real_side_is_an_error() {
        let faces = FaceToElement::from_records(vec![record(0, [None, None], [None, None])]);
        let err = connect_faces(&faces, &HashMap::new(), 0, 2).unwrap_err();
        assert!(matches!(err, LocalMeshError::FaceBetweenVirtualCells { face: 0 }));
    }

    #[test]
    fn serial_virtual_ids_follow_real_ids() {
        assert_eq!(assign_virtual_cell_ids(&NoComm, 4, 2, Some(3)).unwrap(), vec![4, 5]);
        // sparse real ids push the range further out
        assert_eq!(assign_virtual_cell_ids(&NoComm, 2, 1, Some(10)).unwrap(), vec![11]);
        assert!(assign_virtual_cell_ids(&NoComm, 0, 0, None).unwrap().is_empty());
    }

    #[test]
    fn virtual_ids_stop_short_of_the_reserved_id() {
        let last = assign_virtual_cell_ids(&NoComm, 1, 1, Some(u64::MAX - 2)).unwrap();
        assert_eq!(last, vec![u64::MAX - 1]);
        let err = assign_virtual_cell_ids(&NoComm, 1, 2, Some(u64::MAX - 2)).unwrap_err();
        assert!(matches!(err, LocalMeshError::GlobalIdOverflow { count: 2, .. }));
    }

    #[test]
    fn huge_real_ids_fail_instead_of_overflowing() {
        let mut global = line_mesh(2, 0.0, 1.0).unwrap();
        global.cell_ids = vec![0, u64::MAX - 1];
        let mesh = InMemoryMesh::serial(Arc::new(global)).unwrap();
        let err = generate_local_mesh_info(&mesh, &NoComm).unwrap_err();
        assert!(matches!(
            err,
            LocalMeshError::GlobalIdOverflow { start: u64::MAX, count: 2 }
        ));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn serial_line_mesh() {
        let mesh = InMemoryMesh::serial(Arc::new(line_mesh(3, 0.0, 3.0).unwrap())).unwrap();
        let info = generate_local_mesh_info(&mesh, &NoComm).unwrap();
        assert_eq!(info.num_owned_cells, 3);
        assert_eq!(info.num_ghost_cells, 0);
        assert_eq!(info.num_virtual_cells, 2);
        assert_eq!(info.num_faces(), 4);
        assert_eq!(info.virtual_global_cells(), &[3, 4]);
        for v in 3..5 {
            let n = info.virtual_neighbor(v).unwrap();
            assert_eq!(info.cell_vertices.cell(v), info.cell_vertices.cell(n));
        }
        info.validate_invariants().unwrap();
        assert!(global_ids_are_unique(&info, &NoComm, CommTag::new(0x600)).unwrap());
    }

    #[test]
    fn serial_square_builds_views() {
        let mesh = InMemoryMesh::serial(Arc::new(quad_mesh(3, 2, [0.0, 0.0], [3.0, 2.0]).unwrap()))
            .unwrap();
        let info = generate_local_mesh_info(&mesh, &NoComm).unwrap();
        assert_eq!(info.num_virtual_cells, 10);
        assert_eq!(info.num_faces(), 17);
        let block = info.block(DEFAULT_BLOCK).unwrap();
        assert_eq!(block.num_owned_cells, 6);
        assert_eq!(block.num_virtual_cells, 10);
        let left = info.sideset(DEFAULT_BLOCK, SIDESET_LEFT).unwrap();
        assert_eq!(left.num_owned_cells, 2);
        assert_eq!(left.num_ghost_cells, 0);
        assert_eq!(left.num_virtual_cells, 2);
        assert_eq!(left.num_faces(), 2);
    }

    #[test]
    fn views_can_be_skipped() {
        let mesh = InMemoryMesh::serial(Arc::new(line_mesh(2, 0.0, 1.0).unwrap())).unwrap();
        let options = LocalMeshOptions {
            build_blocks: false,
            build_sidesets: false,
            ..Default::default()
        };
        let info = generate_local_mesh_info_with_options(&mesh, &NoComm, &options).unwrap();
        assert!(info.element_blocks.is_empty());
        assert!(info.sidesets.is_empty());
    }

    #[test]
    fn duplicate_ownership_is_detected() {
        let mut info = LocalMeshInfoBase {
            num_owned_cells: 2,
            global_cells: vec![1, 1],
            local_cells: vec![0, 1],
            ..Default::default()
        };
        assert!(!global_ids_are_unique(&info, &NoComm, CommTag::new(0x600)).unwrap());
        info.global_cells[1] = 2;
        assert!(global_ids_are_unique(&info, &NoComm, CommTag::new(0x600)).unwrap());
    }
}
