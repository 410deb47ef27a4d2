//! Halo cell vertex coordinates fetched from their owning ranks.

use crate::algs::communicator::{CommTag, Communicator};
use crate::data::cell_vertices::CellVertices;
use crate::data::importer::Importer;
use crate::mesh_error::LocalMeshError;

/// Import the vertices of every ghost cell. `importer` runs from the owned
/// cell map to the ghost cell map; each ghost record is overwritten by its
/// single owner.
///
/// Collective; uses tags `tag..tag+1`.
pub fn build_ghosted_vertices<C>(
    importer: &Importer,
    owned_vertices: &CellVertices,
    comm: &C,
    tag: CommTag,
) -> Result<CellVertices, LocalMeshError>
where
    C: Communicator + ?Sized,
{
    if owned_vertices.num_cells() != importer.num_source() {
        return Err(LocalMeshError::ExtentMismatch {
            what: "owned cell vertices",
            expected: importer.num_source(),
            found: owned_vertices.num_cells(),
        });
    }
    let stride = owned_vertices.stride();
    let ghost = importer.import(owned_vertices.as_slice(), stride, comm, tag)?;
    CellVertices::from_vec(
        ghost,
        importer.num_target(),
        owned_vertices.vertices_per_cell(),
        owned_vertices.dimension(),
    )
}
