//! Cell topologies, field patterns and the mesh backend the local mesh is
//! built from.

pub mod backend;
pub mod cell_type;
pub mod field_pattern;
pub mod in_memory;
#[cfg(test)]
pub(crate) mod rewrite;

pub use backend::{Connectivity, MeshBackend, SubcellRelation};
pub use cell_type::CellTopology;
pub use field_pattern::FieldPattern;
