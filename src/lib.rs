#![cfg_attr(docsrs, feature(doc_cfg))]
//! # local-mesh
//!
//! local-mesh builds, on every rank of a distributed run, the local view of
//! an unstructured mesh that cell-centred (DG/FV) assembly works on:
//!
//! - the cells this rank owns;
//! - a one-ring halo of ghost cells sharing at least one node with an owned
//!   cell, discovered through a distributed node ↔ cell incidence;
//! - virtual cells standing in for the missing neighbor of every boundary
//!   face, with globally unique rank-ordered ids;
//! - face ↔ cell adjacency, per cell vertex coordinates (ghosts fetched from
//!   their owners, virtual cells mirroring their real neighbor);
//! - restricted views per element block and per (block, sideset) pair.
//!
//! Mesh data comes from a [`MeshBackend`](topology::backend::MeshBackend);
//! ranks talk through a [`Communicator`](algs::communicator::Communicator)
//! (serial, threads sharing a mailbox, or MPI with `mpi-support`).
//!
//! ## Determinism
//!
//! Halo cells are sorted by global id, faces by global face id and virtual
//! ids are handed out in rank order, so the result never depends on message
//! arrival order.
//!
//! ## Usage
//!
//! ```no_run
//! use local_mesh::prelude::*;
//! use local_mesh::mesh_generation::quad_mesh;
//! use std::sync::Arc;
//!
//! let global = Arc::new(quad_mesh(4, 4, [0.0, 0.0], [1.0, 1.0])?);
//! let mesh = InMemoryMesh::serial(global)?;
//! let info = generate_local_mesh_info(&mesh, &NoComm)?;
//! assert_eq!(info.num_owned_cells, 16);
//! # Ok::<(), LocalMeshError>(())
//! ```

pub mod algs;
pub mod data;
pub mod debug_invariants;
pub mod mesh_error;
pub mod mesh_generation;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{CommTag, Communicator, MeshCommTags, NoComm, RayonComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::local_mesh::{
        LocalMeshOptions, generate_local_mesh_info, generate_local_mesh_info_with_options,
        global_ids_are_unique,
    };
    pub use crate::algs::subset::{setup_local_mesh_block_info, setup_local_mesh_sideset_info};
    pub use crate::data::cell_vertices::CellVertices;
    pub use crate::data::local_mesh_info::{
        LocalMeshBlockInfo, LocalMeshInfo, LocalMeshInfoBase, LocalMeshSidesetInfo,
    };
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::mesh_error::LocalMeshError;
    pub use crate::topology::backend::MeshBackend;
    pub use crate::topology::cell_type::CellTopology;
    pub use crate::topology::field_pattern::FieldPattern;
    pub use crate::topology::in_memory::{GlobalMesh, InMemoryMesh};
}
