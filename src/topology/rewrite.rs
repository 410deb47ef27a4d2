//! Backend wrapper that edits the rows of one connectivity pattern.

use crate::data::cell_vertices::CellVertices;
use crate::mesh_error::LocalMeshError;
use crate::topology::backend::{Connectivity, MeshBackend, SubcellRelation};
use crate::topology::cell_type::CellTopology;
use crate::topology::field_pattern::FieldPattern;

/// Delegates to `inner`, passing every row of `pattern` through `edit`.
pub struct RewriteRows<B, F> {
    pub inner: B,
    pub pattern: FieldPattern,
    pub edit: F,
}

impl<B, F> MeshBackend for RewriteRows<B, F>
where
    B: MeshBackend,
    F: Fn(usize, &mut Vec<u64>),
{
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn element_block_names(&self) -> Vec<String> {
        self.inner.element_block_names()
    }

    fn block_topology(&self, block: &str) -> Result<CellTopology, LocalMeshError> {
        self.inner.block_topology(block)
    }

    fn block_local_cells(&self, block: &str) -> Result<Vec<usize>, LocalMeshError> {
        self.inner.block_local_cells(block)
    }

    fn num_local_cells(&self) -> usize {
        self.inner.num_local_cells()
    }

    fn block_id(&self, local_cell: usize) -> Option<&str> {
        self.inner.block_id(local_cell)
    }

    fn element_local_id(&self, cell: u64) -> Option<usize> {
        self.inner.element_local_id(cell)
    }

    fn connectivity(&self, pattern: FieldPattern) -> Result<Connectivity, LocalMeshError> {
        let conn = self.inner.connectivity(pattern)?;
        if pattern != self.pattern {
            return Ok(conn);
        }
        Ok((0..conn.num_cells())
            .map(|cell| {
                let mut row = conn.get(cell).unwrap_or_default().to_vec();
                (self.edit)(cell, &mut row);
                row
            })
            .collect())
    }

    fn element_vertices(&self, local_cells: &[usize]) -> Result<CellVertices, LocalMeshError> {
        self.inner.element_vertices(local_cells)
    }

    fn sideset_names(&self) -> Vec<String> {
        self.inner.sideset_names()
    }

    fn side_entities(&self, sideset: &str, block: &str) -> Result<Vec<u64>, LocalMeshError> {
        self.inner.side_entities(sideset, block)
    }

    fn side_element_cascade(
        &self,
        block: &str,
        sides: &[u64],
    ) -> Result<Vec<SubcellRelation>, LocalMeshError> {
        self.inner.side_element_cascade(block, sides)
    }
}
