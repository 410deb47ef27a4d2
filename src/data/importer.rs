//! Import plans between two distributions of global ids.
//!
//! An [`Importer`] moves per-id records from a source [`DistributedMap`] to a
//! target map. Every target id is fetched from the rank holding it in the
//! source map (the lowest such rank when the source overlaps). Imports use
//! overwrite semantics: a target slot receives exactly one source record.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::all_to_all_records;
use crate::algs::wire::WireGid;
use crate::data::dist_map::{Directory, DistributedMap};
use crate::mesh_error::LocalMeshError;
use bytemuck::Pod;
use std::collections::BTreeMap;

/// Communication plan from a source map to a target map.
#[derive(Clone, Debug, Default)]
pub struct Importer {
    num_source: usize,
    num_target: usize,
    /// `(source lid, target lid)` pairs satisfied on this rank.
    permutes: Vec<(usize, usize)>,
    /// Peer rank -> source lids to send, in the order the peer expects.
    sends: BTreeMap<usize, Vec<usize>>,
    /// Peer rank -> target lids filled by the peer's records, in order.
    recvs: BTreeMap<usize, Vec<usize>>,
}

impl Importer {
    /// Build the plan. Fails with [`LocalMeshError::UnknownGlobalId`] if a
    /// target id is held by no rank in the source map.
    ///
    /// Collective; uses tags `tag..tag+7`. A missing id is reported only
    /// after the remaining collective stages completed on this rank.
    pub fn new<C>(
        source: &DistributedMap,
        target: &DistributedMap,
        comm: &C,
        tag: CommTag,
    ) -> Result<Self, LocalMeshError>
    where
        C: Communicator + ?Sized,
    {
        let me = comm.rank();
        let size = comm.size();
        let directory = Directory::build(source, comm, tag)?;
        let owners = directory.remote_owners(target.global_ids(), comm, tag.offset(2))?;

        let mut permutes = Vec::new();
        let mut recvs: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut requests: Vec<Vec<WireGid>> = vec![Vec::new(); size];
        let mut maybe_err = None;
        for (tlid, (&gid, owner)) in target.global_ids().iter().zip(owners).enumerate() {
            match owner {
                Some(o) if o == me => match source.local_index(gid) {
                    Some(slid) => permutes.push((slid, tlid)),
                    None => {
                        maybe_err.get_or_insert(LocalMeshError::UnknownGlobalId(gid));
                    }
                },
                Some(o) => {
                    requests[o].push(WireGid::of(gid));
                    recvs.entry(o).or_default().push(tlid);
                }
                None => {
                    maybe_err.get_or_insert(LocalMeshError::UnknownGlobalId(gid));
                }
            }
        }

        let incoming = all_to_all_records(&requests, comm, tag.offset(6))?;
        if let Some(err) = maybe_err {
            return Err(err);
        }
        let mut sends = BTreeMap::new();
        for (peer, gids) in incoming.iter().enumerate() {
            if gids.is_empty() {
                continue;
            }
            let lids = gids
                .iter()
                .map(|g| {
                    source
                        .local_index(g.get())
                        .ok_or(LocalMeshError::UnknownGlobalId(g.get()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            sends.insert(peer, lids);
        }

        Ok(Self {
            num_source: source.num_local(),
            num_target: target.num_local(),
            permutes,
            sends,
            recvs,
        })
    }

    pub fn num_source(&self) -> usize {
        self.num_source
    }

    pub fn num_target(&self) -> usize {
        self.num_target
    }

    pub(crate) fn permutes(&self) -> &[(usize, usize)] {
        &self.permutes
    }

    pub(crate) fn sends(&self) -> &BTreeMap<usize, Vec<usize>> {
        &self.sends
    }

    /// Import fixed-stride records: `source` holds `stride` values per source
    /// id, the result holds `stride` values per target id.
    ///
    /// Collective; uses tags `tag..tag+1`.
    pub fn import<T, C>(
        &self,
        source: &[T],
        stride: usize,
        comm: &C,
        tag: CommTag,
    ) -> Result<Vec<T>, LocalMeshError>
    where
        T: Pod,
        C: Communicator + ?Sized,
    {
        if source.len() != self.num_source * stride {
            return Err(LocalMeshError::ExtentMismatch {
                what: "import source records",
                expected: self.num_source * stride,
                found: source.len(),
            });
        }
        let mut send: Vec<Vec<T>> = vec![Vec::new(); comm.size()];
        for (&peer, lids) in &self.sends {
            let buf = &mut send[peer];
            buf.reserve(lids.len() * stride);
            for &lid in lids {
                buf.extend_from_slice(&source[lid * stride..(lid + 1) * stride]);
            }
        }
        let recv = all_to_all_records(&send, comm, tag)?;

        let mut target = vec![<T as bytemuck::Zeroable>::zeroed(); self.num_target * stride];
        for &(slid, tlid) in &self.permutes {
            target[tlid * stride..(tlid + 1) * stride]
                .copy_from_slice(&source[slid * stride..(slid + 1) * stride]);
        }
        for (&peer, tlids) in &self.recvs {
            let records = &recv[peer];
            if records.len() != tlids.len() * stride {
                return Err(LocalMeshError::BufferSizeMismatch {
                    neighbor: peer,
                    expected: tlids.len() * stride * std::mem::size_of::<T>(),
                    got: records.len() * std::mem::size_of::<T>(),
                });
            }
            for (chunk, &tlid) in records.chunks_exact(stride.max(1)).zip(tlids) {
                target[tlid * stride..(tlid + 1) * stride].copy_from_slice(chunk);
            }
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, RayonComm};

    #[test]
    fn serial_import_permutes_locally() {
        let source = DistributedMap::new([10, 20, 30]).unwrap();
        let target = DistributedMap::new([30, 10]).unwrap();
        let imp = Importer::new(&source, &target, &NoComm, CommTag::new(1)).unwrap();
        let values = [1.0f64, 1.5, 2.0, 2.5, 3.0, 3.5];
        let out = imp.import(&values, 2, &NoComm, CommTag::new(9)).unwrap();
        assert_eq!(out, vec![3.0, 3.5, 1.0, 1.5]);
    }

    #[test]
    fn missing_target_id_fails() {
        let source = DistributedMap::new([1]).unwrap();
        let target = DistributedMap::new([2]).unwrap();
        let err = Importer::new(&source, &target, &NoComm, CommTag::new(1)).unwrap_err();
        assert_eq!(err, LocalMeshError::UnknownGlobalId(2));
    }

    #[test]
    fn two_rank_import_fetches_remote_records() {
        let world = RayonComm::world(2);
        let owned = [vec![0u64, 1], vec![2u64, 3]];
        let wanted = [vec![2u64], vec![1u64, 0]];
        let out: Vec<Vec<u64>> = std::thread::scope(|s| {
            let handles: Vec<_> = world
                .iter()
                .map(|comm| {
                    let (own, want) = (&owned[comm.rank()], &wanted[comm.rank()]);
                    s.spawn(move || {
                        let src = DistributedMap::new(own.iter().copied()).unwrap();
                        let tgt = DistributedMap::new(want.iter().copied()).unwrap();
                        let imp = Importer::new(&src, &tgt, comm, CommTag::new(0x80)).unwrap();
                        let vals: Vec<u64> = own.iter().map(|g| g * 100).collect();
                        imp.import(&vals, 1, comm, CommTag::new(0x90)).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(out, vec![vec![200], vec![100, 0]]);
    }
}
