//! Global cell ids and the global cell → node table of a rank's owned cells.
//!
//! Only one cell topology is supported across all element blocks; a block
//! that disagrees is rejected up front.

use crate::mesh_error::LocalMeshError;
use crate::topology::backend::MeshBackend;
use crate::topology::cell_type::CellTopology;
use crate::topology::field_pattern::FieldPattern;

/// Padding for rows shorter than the widest one.
pub const INVALID_GID: u64 = u64::MAX;

/// Rectangular `cell -> global id` table, padded with [`INVALID_GID`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalIdTable {
    rows: usize,
    width: usize,
    ids: Vec<u64>,
}

impl GlobalIdTable {
    pub fn from_rows<R: AsRef<[u64]>>(rows: &[R]) -> Self {
        let width = rows.iter().map(|r| r.as_ref().len()).max().unwrap_or(0);
        let mut ids = vec![INVALID_GID; rows.len() * width];
        for (i, row) in rows.iter().enumerate() {
            ids[i * width..i * width + row.as_ref().len()].copy_from_slice(row.as_ref());
        }
        Self {
            rows: rows.len(),
            width,
            ids,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Row `i` including padding.
    pub fn row(&self, i: usize) -> &[u64] {
        &self.ids[i * self.width..(i + 1) * self.width]
    }

    /// `(slot, id)` pairs of row `i`, padding skipped.
    pub fn nodes(&self, i: usize) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.row(i)
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, id)| id != INVALID_GID)
    }

    /// Every id in the table, padding skipped.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.ids.iter().copied().filter(|&id| id != INVALID_GID)
    }
}

/// The single cell topology shared by every element block.
pub fn block_topology<B>(backend: &B) -> Result<CellTopology, LocalMeshError>
where
    B: MeshBackend + ?Sized,
{
    let names = backend.element_block_names();
    let first = names.first().ok_or(LocalMeshError::NoElementBlocks)?;
    let topology = backend.block_topology(first)?;
    for name in &names[1..] {
        let other = backend.block_topology(name)?;
        if other.key() != topology.key() {
            return Err(LocalMeshError::InconsistentTopology {
                block: name.clone(),
                expected: topology.name().to_string(),
                found: other.name().to_string(),
            });
        }
    }
    Ok(topology)
}

fn total_block_cells<B>(backend: &B) -> Result<usize, LocalMeshError>
where
    B: MeshBackend + ?Sized,
{
    let mut total = 0;
    for name in backend.element_block_names() {
        total += backend.block_local_cells(&name)?.len();
    }
    if total != backend.num_local_cells() {
        return Err(LocalMeshError::ExtentMismatch {
            what: "local cells across element blocks",
            expected: backend.num_local_cells(),
            found: total,
        });
    }
    Ok(total)
}

/// One global id per owned cell, in local cell order.
pub fn build_cell_global_ids<B>(backend: &B) -> Result<Vec<u64>, LocalMeshError>
where
    B: MeshBackend + ?Sized,
{
    let topology = block_topology(backend)?;
    let conn = backend.connectivity(FieldPattern::cell(topology))?;
    let total = total_block_cells(backend)?;
    if conn.num_cells() != total {
        return Err(LocalMeshError::ExtentMismatch {
            what: "cell connectivity rows",
            expected: total,
            found: conn.num_cells(),
        });
    }
    (0..total)
        .map(|cell| match conn.get(cell) {
            Some(&[INVALID_GID]) => Err(LocalMeshError::ReservedGlobalId(INVALID_GID)),
            Some(&[gid]) => Ok(gid),
            other => Err(LocalMeshError::CellConnectivitySize {
                cell,
                found: other.map_or(0, <[u64]>::len),
            }),
        })
        .collect()
}

/// Global vertex node ids of every owned cell.
pub fn build_cell_to_nodes<B>(backend: &B) -> Result<GlobalIdTable, LocalMeshError>
where
    B: MeshBackend + ?Sized,
{
    block_topology(backend)?;
    let conn = backend.connectivity(FieldPattern::Nodal)?;
    let total = total_block_cells(backend)?;
    if conn.num_cells() != total {
        return Err(LocalMeshError::ExtentMismatch {
            what: "nodal connectivity rows",
            expected: total,
            found: conn.num_cells(),
        });
    }
    let rows: Vec<&[u64]> = (0..total).filter_map(|c| conn.get(c)).collect();
    if rows.iter().any(|r| r.contains(&INVALID_GID)) {
        return Err(LocalMeshError::ReservedGlobalId(INVALID_GID));
    }
    Ok(GlobalIdTable::from_rows(&rows))
}
