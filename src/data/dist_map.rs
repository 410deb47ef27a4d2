//! Distributed maps: the flat list of global ids a rank holds.
//!
//! A [`DistributedMap`] may overlap with maps on other ranks (the same global
//! id held by several ranks). [`DistributedMap::create_one_to_one`] resolves
//! the overlap so every id is held by exactly one rank, and the [`Directory`]
//! answers "which rank holds id `g`" for arbitrary ids. Directory shards are
//! assigned by `g % size`.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::all_to_all_records;
use crate::algs::wire::{WireGid, WireOwner};
use crate::mesh_error::LocalMeshError;
use std::collections::HashMap;

/// Rank holding the directory shard for `gid`.
#[inline]
pub fn directory_rank(gid: u64, size: usize) -> usize {
    (gid % size.max(1) as u64) as usize
}

/// Global ids held by this rank, in local index order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistributedMap {
    gids: Vec<u64>,
    lookup: HashMap<u64, usize>,
}

impl DistributedMap {
    /// Build a map from local ids in local order. Ids must be unique on this rank.
    pub fn new<I>(gids: I) -> Result<Self, LocalMeshError>
    where
        I: IntoIterator<Item = u64>,
    {
        let gids: Vec<u64> = gids.into_iter().collect();
        let mut lookup = HashMap::with_capacity(gids.len());
        for (lid, &gid) in gids.iter().enumerate() {
            if lookup.insert(gid, lid).is_some() {
                return Err(LocalMeshError::DuplicateGlobalId(gid));
            }
        }
        Ok(Self { gids, lookup })
    }

    /// Number of ids held on this rank.
    pub fn num_local(&self) -> usize {
        self.gids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gids.is_empty()
    }

    /// Ids held on this rank, in local order.
    pub fn global_ids(&self) -> &[u64] {
        &self.gids
    }

    pub fn local_index(&self, gid: u64) -> Option<usize> {
        self.lookup.get(&gid).copied()
    }

    pub fn global_index(&self, lid: usize) -> Option<u64> {
        self.gids.get(lid).copied()
    }

    pub fn contains(&self, gid: u64) -> bool {
        self.lookup.contains_key(&gid)
    }

    /// Restrict an overlapping map so every id is held by exactly one rank
    /// (the lowest rank holding it). Local order is preserved.
    ///
    /// Collective; uses tags `tag..tag+4`.
    pub fn create_one_to_one<C>(&self, comm: &C, tag: CommTag) -> Result<Self, LocalMeshError>
    where
        C: Communicator + ?Sized,
    {
        let directory = Directory::build(self, comm, tag)?;
        let owners = directory.remote_owners(&self.gids, comm, tag.offset(2))?;
        let me = comm.rank();
        let kept = self
            .gids
            .iter()
            .zip(owners)
            .filter(|(_, owner)| *owner == Some(me))
            .map(|(&gid, _)| gid);
        Self::new(kept)
    }
}

/// One shard of the distributed `gid -> holding rank` directory.
#[derive(Clone, Debug, Default)]
pub struct Directory {
    entries: HashMap<u64, usize>,
}

impl Directory {
    /// Register every id of `map` with its directory shard. When several ranks
    /// hold the same id the lowest rank wins.
    ///
    /// Collective; uses tags `tag..tag+1`.
    pub fn build<C>(map: &DistributedMap, comm: &C, tag: CommTag) -> Result<Self, LocalMeshError>
    where
        C: Communicator + ?Sized,
    {
        let size = comm.size();
        let mut send: Vec<Vec<WireGid>> = vec![Vec::new(); size];
        for &gid in map.global_ids() {
            send[directory_rank(gid, size)].push(WireGid::of(gid));
        }
        let recv = all_to_all_records(&send, comm, tag)?;
        let mut entries = HashMap::new();
        for (src, gids) in recv.iter().enumerate() {
            for g in gids {
                entries
                    .entry(g.get())
                    .and_modify(|owner: &mut usize| *owner = (*owner).min(src))
                    .or_insert(src);
            }
        }
        Ok(Self { entries })
    }

    /// Entries held by this shard.
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Look up the holding rank of every id in `gids`, in order. Ids no rank
    /// registered come back as `None`.
    ///
    /// Collective; uses tags `tag..tag+3`.
    pub fn remote_owners<C>(
        &self,
        gids: &[u64],
        comm: &C,
        tag: CommTag,
    ) -> Result<Vec<Option<usize>>, LocalMeshError>
    where
        C: Communicator + ?Sized,
    {
        let size = comm.size();
        let mut queries: Vec<Vec<WireGid>> = vec![Vec::new(); size];
        let mut positions: Vec<Vec<usize>> = vec![Vec::new(); size];
        for (pos, &gid) in gids.iter().enumerate() {
            let shard = directory_rank(gid, size);
            queries[shard].push(WireGid::of(gid));
            positions[shard].push(pos);
        }
        let incoming = all_to_all_records(&queries, comm, tag)?;
        let replies: Vec<Vec<WireOwner>> = incoming
            .iter()
            .map(|qs| {
                qs.iter()
                    .map(|q| WireOwner::new(self.entries.get(&q.get()).copied()))
                    .collect()
            })
            .collect();
        let answers = all_to_all_records(&replies, comm, tag.offset(2))?;

        let mut owners = vec![None; gids.len()];
        for (shard, answer) in answers.iter().enumerate() {
            if answer.len() != positions[shard].len() {
                return Err(LocalMeshError::ExtentMismatch {
                    what: "directory reply",
                    expected: positions[shard].len(),
                    found: answer.len(),
                });
            }
            for (&pos, a) in positions[shard].iter().zip(answer) {
                owners[pos] = a.get();
            }
        }
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, RayonComm};

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = DistributedMap::new([4, 2, 4]).unwrap_err();
        assert_eq!(err, LocalMeshError::DuplicateGlobalId(4));
    }

    #[test]
    fn serial_one_to_one_keeps_everything() {
        let map = DistributedMap::new([9, 3, 5]).unwrap();
        let unique = map.create_one_to_one(&NoComm, CommTag::new(1)).unwrap();
        assert_eq!(unique.global_ids(), &[9, 3, 5]);
        assert_eq!(unique.local_index(3), Some(1));
    }

    #[test]
    fn overlapping_ids_go_to_lowest_rank() {
        let world = RayonComm::world(3);
        let maps = [vec![0u64, 1, 2], vec![2, 3, 4], vec![4, 5, 0]];
        let unique: Vec<Vec<u64>> = std::thread::scope(|s| {
            let handles: Vec<_> = world
                .iter()
                .zip(&maps)
                .map(|(comm, gids)| {
                    s.spawn(move || {
                        let map = DistributedMap::new(gids.iter().copied()).unwrap();
                        map.create_one_to_one(comm, CommTag::new(0x40))
                            .unwrap()
                            .global_ids()
                            .to_vec()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(unique, vec![vec![0, 1, 2], vec![3, 4], vec![5]]);
    }

    #[test]
    fn unknown_ids_have_no_owner() {
        let map = DistributedMap::new([1, 2]).unwrap();
        let dir = Directory::build(&map, &NoComm, CommTag::new(1)).unwrap();
        let owners = dir.remote_owners(&[2, 7], &NoComm, CommTag::new(3)).unwrap();
        assert_eq!(owners, vec![Some(0), None]);
    }
}
