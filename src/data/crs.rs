//! Distributed sparse incidence matrix keyed by global ids.
//!
//! [`CrsIncidence`] stores, for every row id held in its row map, the column
//! ids present in that row together with a small integer value. Only the
//! sparsity pattern carries meaning for adjacency queries; the value records
//! a local slot index for bookkeeping.
//!
//! The matrix is assembled with `insert_global_values`, frozen with
//! `fill_complete`, and may then be transposed against a one-to-one domain
//! map or imported onto an overlapping row map.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::all_to_all_records;
use crate::algs::wire::WireEntry;
use crate::data::dist_map::{Directory, DistributedMap};
use crate::data::importer::Importer;
use crate::mesh_error::LocalMeshError;
use itertools::Itertools;

#[derive(Clone, Debug, Default)]
pub struct CrsIncidence {
    row_map: DistributedMap,
    rows: Vec<Vec<(u64, i32)>>,
    filled: bool,
}

impl CrsIncidence {
    /// Empty matrix over `row_map`.
    pub fn new(row_map: DistributedMap) -> Self {
        let rows = vec![Vec::new(); row_map.num_local()];
        Self {
            row_map,
            rows,
            filled: false,
        }
    }

    pub fn row_map(&self) -> &DistributedMap {
        &self.row_map
    }

    pub fn is_filled(&self) -> bool {
        self.filled
    }

    /// Insert `(row, cols[k]) = vals[k]`. The row must be held locally.
    pub fn insert_global_values(
        &mut self,
        row: u64,
        cols: &[u64],
        vals: &[i32],
    ) -> Result<(), LocalMeshError> {
        if cols.len() != vals.len() {
            return Err(LocalMeshError::ExtentMismatch {
                what: "incidence row values",
                expected: cols.len(),
                found: vals.len(),
            });
        }
        let lid = self
            .row_map
            .local_index(row)
            .ok_or(LocalMeshError::UnknownGlobalId(row))?;
        self.rows[lid].extend(cols.iter().copied().zip(vals.iter().copied()));
        self.filled = false;
        Ok(())
    }

    /// Freeze the pattern: rows are sorted by column id and repeated columns
    /// keep their smallest value.
    pub fn fill_complete(&mut self) {
        for row in &mut self.rows {
            row.sort_unstable();
            row.dedup_by_key(|(col, _)| *col);
        }
        self.filled = true;
    }

    /// Entries of row `gid`, sorted by column, if the row is held here.
    pub fn global_row(&self, gid: u64) -> Option<&[(u64, i32)]> {
        self.row_map
            .local_index(gid)
            .map(|lid| self.rows[lid].as_slice())
    }

    /// Column ids of row `gid`; empty if the row is not held here.
    pub fn row_columns(&self, gid: u64) -> impl Iterator<Item = u64> + '_ {
        self.global_row(gid)
            .unwrap_or_default()
            .iter()
            .map(|&(col, _)| col)
    }

    /// Total stored entries on this rank.
    pub fn num_entries(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Distributed transpose: entry `(r, c) = v` becomes `(c, r) = v` on the
    /// rank holding `c` in the one-to-one `domain_map`, which becomes the row
    /// map of the result.
    ///
    /// Collective; uses tags `tag..tag+7`.
    pub fn transpose<C>(
        &self,
        domain_map: &DistributedMap,
        comm: &C,
        tag: CommTag,
    ) -> Result<CrsIncidence, LocalMeshError>
    where
        C: Communicator + ?Sized,
    {
        if !self.filled {
            return Err(LocalMeshError::MatrixNotFilled("transpose"));
        }
        let directory = Directory::build(domain_map, comm, tag)?;
        let cols: Vec<u64> = self
            .rows
            .iter()
            .flat_map(|row| row.iter().map(|&(col, _)| col))
            .sorted_unstable()
            .dedup()
            .collect();
        let owners = directory.remote_owners(&cols, comm, tag.offset(2))?;

        let mut maybe_err = None;
        let mut send: Vec<Vec<WireEntry>> = vec![Vec::new(); comm.size()];
        for (lid, row) in self.rows.iter().enumerate() {
            let gid = self.row_map.global_ids()[lid];
            for &(col, val) in row {
                // cols is sorted, so the owner lookup is a binary search
                let owner = cols
                    .binary_search(&col)
                    .ok()
                    .and_then(|pos| owners[pos]);
                match owner {
                    Some(o) => send[o].push(WireEntry::new(col, gid, val)),
                    None => {
                        maybe_err.get_or_insert(LocalMeshError::UnknownGlobalId(col));
                    }
                }
            }
        }
        let recv = all_to_all_records(&send, comm, tag.offset(6))?;
        if let Some(err) = maybe_err {
            return Err(err);
        }

        let mut out = CrsIncidence::new(domain_map.clone());
        for entry in recv.iter().flatten() {
            let lid = out
                .row_map
                .local_index(entry.row())
                .ok_or(LocalMeshError::UnknownGlobalId(entry.row()))?;
            out.rows[lid].push((entry.col(), entry.val()));
        }
        out.fill_complete();
        Ok(out)
    }

    /// Replicate rows onto `target` (typically an overlapping map). Every
    /// target row is copied whole from the rank holding it here.
    ///
    /// Collective; uses tags `tag..tag+9`.
    pub fn import<C>(
        &self,
        target: &DistributedMap,
        comm: &C,
        tag: CommTag,
    ) -> Result<CrsIncidence, LocalMeshError>
    where
        C: Communicator + ?Sized,
    {
        if !self.filled {
            return Err(LocalMeshError::MatrixNotFilled("import"));
        }
        let importer = Importer::new(&self.row_map, target, comm, tag)?;
        let mut send: Vec<Vec<WireEntry>> = vec![Vec::new(); comm.size()];
        for (&peer, lids) in importer.sends() {
            for &lid in lids {
                let gid = self.row_map.global_ids()[lid];
                send[peer].extend(
                    self.rows[lid]
                        .iter()
                        .map(|&(col, val)| WireEntry::new(gid, col, val)),
                );
            }
        }
        let recv = all_to_all_records(&send, comm, tag.offset(8))?;

        let mut out = CrsIncidence::new(target.clone());
        for &(slid, tlid) in importer.permutes() {
            out.rows[tlid] = self.rows[slid].clone();
        }
        for entry in recv.iter().flatten() {
            let lid = target
                .local_index(entry.row())
                .ok_or(LocalMeshError::UnknownGlobalId(entry.row()))?;
            out.rows[lid].push((entry.col(), entry.val()));
        }
        out.fill_complete();
        Ok(out)
    }
}
