//! Face → adjacent cells table over the faces of owned cells.
//!
//! Every owned cell sends `(face gid, cell gid, local face index)` to the
//! directory rank of the face (`face % size`). The directory pairs the (at
//! most two) contributions of each face and answers every contributing rank
//! with the completed record, so faces split across ranks come back with
//! both cells. A face with a single contribution keeps `None` on its
//! second side.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::all_to_all_records;
use crate::algs::wire::{WireEntry, WireFace};
use crate::data::dist_map::directory_rank;
use crate::mesh_error::LocalMeshError;
use crate::topology::backend::MeshBackend;
use crate::topology::field_pattern::FieldPattern;
use std::collections::{BTreeMap, BTreeSet};

/// Both sides of one face. Side 0 always holds a cell; side 1 is `None` on
/// the mesh boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FaceRecord {
    pub face: u64,
    pub cells: [Option<u64>; 2],
    pub lidx: [Option<usize>; 2],
}

impl FaceRecord {
    pub fn is_boundary(&self) -> bool {
        self.cells.iter().any(Option::is_none)
    }
}

/// Faces touching owned cells, ordered by face gid.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FaceToElement {
    faces: Vec<FaceRecord>,
}

impl FaceToElement {
    /// Build from already paired records; they are sorted by face gid.
    pub fn from_records(mut faces: Vec<FaceRecord>) -> Self {
        faces.sort_by_key(|f| f.face);
        Self { faces }
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn faces(&self) -> &[FaceRecord] {
        &self.faces
    }

    pub fn num_boundary_faces(&self) -> usize {
        self.faces.iter().filter(|f| f.is_boundary()).count()
    }

    /// Pair the facets of `owned_cells` across ranks. `owned_cells[i]` is the
    /// global id of backend local cell `i`.
    ///
    /// Collective; uses tags `tag..tag+3`.
    pub fn build<B, C>(
        backend: &B,
        owned_cells: &[u64],
        comm: &C,
        tag: CommTag,
    ) -> Result<Self, LocalMeshError>
    where
        B: MeshBackend + ?Sized,
        C: Communicator + ?Sized,
    {
        let topology = crate::algs::global_ids::block_topology(backend)?;
        let facets = backend.connectivity(FieldPattern::facet(topology))?;
        if facets.num_cells() != owned_cells.len() {
            return Err(LocalMeshError::ExtentMismatch {
                what: "facet connectivity rows",
                expected: owned_cells.len(),
                found: facets.num_cells(),
            });
        }
        let face_count = topology.face_count();
        if let Some(i) = (0..owned_cells.len()).find(|&i| facets.size(i) != face_count) {
            return Err(LocalMeshError::ExtentMismatch {
                what: "facets per cell",
                expected: face_count,
                found: facets.size(i),
            });
        }
        Self::pair_facets(
            owned_cells
                .iter()
                .enumerate()
                .map(|(i, &cell)| (cell, facets.get(i).unwrap_or_default())),
            comm,
            tag,
        )
    }

    /// Pair `(cell gid, face gids in local face order)` contributions.
    ///
    /// Collective; uses tags `tag..tag+3`.
    pub fn pair_facets<'a, I, C>(cells: I, comm: &C, tag: CommTag) -> Result<Self, LocalMeshError>
    where
        I: IntoIterator<Item = (u64, &'a [u64])>,
        C: Communicator + ?Sized,
    {
        let size = comm.size();
        let mut contributions: Vec<Vec<WireEntry>> = vec![Vec::new(); size];
        for (cell, faces) in cells {
            for (lidx, &face) in faces.iter().enumerate() {
                contributions[directory_rank(face, size)]
                    .push(WireEntry::new(face, cell, lidx as i32));
            }
        }
        let incoming = all_to_all_records(&contributions, comm, tag)?;

        // directory shard: face -> [(cell, lidx, rank)]
        let mut shard: BTreeMap<u64, Vec<(u64, usize, usize)>> = BTreeMap::new();
        for (src, entries) in incoming.iter().enumerate() {
            for e in entries {
                shard
                    .entry(e.row())
                    .or_default()
                    .push((e.col(), e.val() as usize, src));
            }
        }

        let mut maybe_err = None;
        let mut replies: Vec<Vec<WireFace>> = vec![Vec::new(); size];
        for (face, mut sides) in shard {
            sides.sort_unstable();
            sides.dedup();
            if sides.len() > 2 {
                maybe_err.get_or_insert_with(|| {
                    LocalMeshError::InvalidMesh(format!(
                        "face {face} is shared by {} cells",
                        sides.len()
                    ))
                });
                continue;
            }
            let mut record_cells = [None; 2];
            let mut record_lidx = [None; 2];
            for (k, &(cell, lidx, _)) in sides.iter().enumerate() {
                record_cells[k] = Some(cell);
                record_lidx[k] = Some(lidx);
            }
            let record = WireFace::new(face, record_cells, record_lidx);
            let ranks: BTreeSet<usize> = sides.iter().map(|&(_, _, r)| r).collect();
            for r in ranks {
                replies[r].push(record);
            }
        }
        let answers = all_to_all_records(&replies, comm, tag.offset(2))?;
        if let Some(err) = maybe_err {
            return Err(err);
        }

        let mut faces: BTreeMap<u64, FaceRecord> = BTreeMap::new();
        for w in answers.iter().flatten() {
            faces.insert(
                w.face(),
                FaceRecord {
                    face: w.face(),
                    cells: w.cells(),
                    lidx: w.lidx(),
                },
            );
        }
        Ok(Self {
            faces: faces.into_values().collect(),
        })
    }
}
