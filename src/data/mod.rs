//! Distributed containers and the produced local mesh structures.

pub mod cell_vertices;
pub mod crs;
pub mod dist_map;
pub mod importer;
pub mod local_mesh_info;

pub use cell_vertices::CellVertices;
pub use crs::CrsIncidence;
pub use dist_map::{Directory, DistributedMap};
pub use importer::Importer;
pub use local_mesh_info::{LocalMeshBlockInfo, LocalMeshInfo, LocalMeshSidesetInfo};
