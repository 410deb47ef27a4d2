//! Thin façade over serial, intra-process (threads sharing a mailbox) or
//! inter-process (MPI) message passing.
//!
//! Messages are contiguous byte slices. Point-to-point handles are waitable;
//! the collective helpers (`allgather`, `all_to_all_v`) are blocking and must
//! be entered by every rank in the same order.

use crate::mesh_error::LocalMeshError;
use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Arc;

/// Tag used by the point-to-point fallback of [`Communicator::allgather`].
pub const ALLGATHER_TAG: u16 = 0xA110;

/// Typed message tag.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    pub const fn base(self) -> u16 {
        self.0
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Tag `n` slots after this one.
    pub const fn offset(self, n: u16) -> Self {
        Self(self.0.wrapping_add(n))
    }
}

/// Disjoint tag ranges for every collective stage of local mesh construction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MeshCommTags {
    pub node_map: CommTag,
    pub transpose: CommTag,
    pub incidence_import: CommTag,
    pub cell_import: CommTag,
    pub vertex_exchange: CommTag,
    pub faces: CommTag,
}

impl MeshCommTags {
    /// Stages are spaced 16 tags apart starting at `base`.
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            node_map: base,
            transpose: base.offset(16),
            incidence_import: base.offset(32),
            cell_import: base.offset(48),
            vertex_exchange: base.offset(64),
            faces: base.offset(80),
        }
    }
}

impl Default for MeshCommTags {
    fn default() -> Self {
        Self::from_base(CommTag::new(0x4D00))
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Communication interface used by every distributed stage.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Rank of this process in the world.
    fn rank(&self) -> usize;
    /// Number of ranks in the world.
    fn size(&self) -> usize;

    /// Block until every rank reached the barrier.
    fn barrier(&self) {
        let mut sink = vec![0u8; self.size()];
        self.allgather(&[0u8], &mut sink);
    }

    /// Gather `sendbuf` from every rank into `recvbuf`, ordered by rank.
    ///
    /// `recvbuf.len()` must be `size() * sendbuf.len()`.
    fn allgather(&self, sendbuf: &[u8], recvbuf: &mut [u8]) {
        let n = sendbuf.len();
        let me = self.rank();
        let size = self.size();
        let mut pending = Vec::with_capacity(size);
        for peer in (0..size).filter(|&p| p != me) {
            let mut scratch = vec![0u8; n];
            pending.push((peer, self.irecv(peer, ALLGATHER_TAG, &mut scratch)));
        }
        let sends: Vec<_> = (0..size)
            .filter(|&p| p != me)
            .map(|peer| self.isend(peer, ALLGATHER_TAG, sendbuf))
            .collect();
        recvbuf[me * n..(me + 1) * n].copy_from_slice(sendbuf);
        for (peer, h) in pending {
            if let Some(data) = h.wait() {
                let len = data.len().min(n);
                recvbuf[peer * n..peer * n + len].copy_from_slice(&data[..len]);
            }
        }
        for s in sends {
            let _ = s.wait();
        }
    }

    /// Personalized all-to-all exchange of variable length byte buffers.
    ///
    /// `send[p]` goes to rank `p`; the result holds what every rank sent here.
    fn all_to_all_v(
        &self,
        send: &[Vec<u8>],
        tag: CommTag,
    ) -> Result<Vec<Vec<u8>>, LocalMeshError> {
        crate::algs::exchange::sparse_all_to_all(send, self, tag)
    }
}

/// Compile-time no-op comm for pure serial runs.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}
}

// --- RayonComm: intra-process ranks on threads ---
type Key = (usize, usize, u16); // (src, dst, tag)
type Mailbox = DashMap<Key, VecDeque<Bytes>>;

static MAILBOX: Lazy<Arc<Mailbox>> = Lazy::new(|| Arc::new(DashMap::new()));

/// Receive handle for [`RayonComm`]; polls the shared mailbox on `wait`.
pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    len: usize,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(mut queue) = self.mailbox.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    let len = bytes.len().min(self.len);
                    return Some(bytes[..len].to_vec());
                }
            }
            std::thread::yield_now();
        }
    }
}

/// In-process communicator: every rank is a thread, messages travel through
/// a shared FIFO mailbox keyed by `(src, dst, tag)`.
#[derive(Clone, Debug)]
pub struct RayonComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl RayonComm {
    /// Rank handle on the process-wide mailbox.
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            mailbox: Arc::clone(&MAILBOX),
        }
    }

    /// A fresh world of `size` ranks sharing a private mailbox.
    pub fn world(size: usize) -> Vec<Self> {
        let mailbox: Arc<Mailbox> = Arc::new(DashMap::new());
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    /// Run `f` once per rank of a fresh world, each on its own pool thread.
    /// Results are returned in rank order.
    #[cfg(feature = "rayon")]
    pub fn run<F, R>(size: usize, f: F) -> Result<Vec<R>, LocalMeshError>
    where
        F: Fn(&RayonComm) -> R + Sync,
        R: Send,
    {
        let comms = Self::world(size);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .build()
            .map_err(|e| LocalMeshError::ThreadPool(e.to_string()))?;
        Ok(pool.broadcast(|ctx| f(&comms[ctx.index()])))
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        self.mailbox
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
            len: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::datatype::{Partition, PartitionMut};
    use mpi::environment::Universe;
    use mpi::request::StaticScope;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;
    use mpi::Count;

    /// MPI world communicator.
    ///
    /// Point-to-point calls post immediate sends and receives on buffers the
    /// handle owns until `wait`; the collective paths used by mesh
    /// construction go through native MPI collectives instead.
    pub struct MpiComm {
        _universe: Universe,
        pub world: SimpleCommunicator,
        pub rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, LocalMeshError> {
            let universe = mpi::initialize().ok_or_else(|| LocalMeshError::CommError {
                neighbor: 0,
                message: "MPI already initialized".into(),
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                _universe: universe,
                world,
                rank,
                size,
            })
        }
    }

    /// Pending immediate request together with the buffer it works on.
    pub struct MpiHandle(Box<dyn FnOnce() -> Option<Vec<u8>>>);

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            (self.0)()
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let owned = Box::into_raw(buf.to_vec().into_boxed_slice());
            // SAFETY: `owned` is only freed after the request completed.
            let data: &'static [u8] = unsafe { &*owned };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, data, tag as i32);
            MpiHandle(Box::new(move || {
                req.wait();
                // SAFETY: the request is done with the buffer.
                drop(unsafe { Box::from_raw(owned) });
                None
            }))
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let owned = Box::into_raw(vec![0u8; buf.len()].into_boxed_slice());
            // SAFETY: `owned` is only reclaimed after the request completed.
            let target: &'static mut [u8] = unsafe { &mut *owned };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, target, tag as i32);
            MpiHandle(Box::new(move || {
                let status = req.wait();
                // SAFETY: the request is done with the buffer.
                let mut data = unsafe { Box::from_raw(owned) }.into_vec();
                data.truncate(status.count(u8::equivalent_datatype()) as usize);
                Some(data)
            }))
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn barrier(&self) {
            self.world.barrier();
        }

        fn allgather(&self, sendbuf: &[u8], recvbuf: &mut [u8]) {
            self.world.all_gather_into(sendbuf, recvbuf);
        }

        fn all_to_all_v(
            &self,
            send: &[Vec<u8>],
            _tag: CommTag,
        ) -> Result<Vec<Vec<u8>>, LocalMeshError> {
            if send.len() != self.size {
                return Err(LocalMeshError::ExtentMismatch {
                    what: "all_to_all_v send buffers",
                    expected: self.size,
                    found: send.len(),
                });
            }
            let send_counts: Vec<Count> = send.iter().map(|b| b.len() as Count).collect();
            let mut recv_counts: Vec<Count> = vec![0; self.size];
            self.world.all_to_all_into(&send_counts[..], &mut recv_counts[..]);

            let displs = |counts: &[Count]| -> Vec<Count> {
                counts
                    .iter()
                    .scan(0, |acc, &c| {
                        let d = *acc;
                        *acc += c;
                        Some(d)
                    })
                    .collect()
            };
            let send_displs = displs(&send_counts);
            let recv_displs = displs(&recv_counts);
            let flat: Vec<u8> = send.concat();
            let total: usize = recv_counts.iter().map(|&c| c as usize).sum();
            let mut recv_flat = vec![0u8; total];
            {
                let send_part = Partition::new(&flat[..], &send_counts[..], &send_displs[..]);
                let mut recv_part =
                    PartitionMut::new(&mut recv_flat[..], &recv_counts[..], &recv_displs[..]);
                self.world
                    .all_to_all_varcount_into(&send_part, &mut recv_part);
            }
            Ok(recv_counts
                .iter()
                .zip(&recv_displs)
                .map(|(&c, &d)| recv_flat[d as usize..(d + c) as usize].to_vec())
                .collect())
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_round_trip_two_ranks() {
        let world = RayonComm::world(2);
        let mut recv_buf = [0u8; 4];
        let recv_handle = world[1].irecv(0, 7, &mut recv_buf);
        world[0].isend(1, 7, &[1, 2, 3, 4]);
        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn worlds_do_not_share_mailboxes() {
        let a = RayonComm::world(2);
        let b = RayonComm::world(2);
        a[0].isend(1, 3, &[9]);
        b[0].isend(1, 3, &[5]);
        let mut buf = [0u8; 1];
        assert_eq!(b[1].irecv(0, 3, &mut buf).wait(), Some(vec![5]));
        assert_eq!(a[1].irecv(0, 3, &mut buf).wait(), Some(vec![9]));
    }

    #[test]
    fn threaded_allgather_orders_by_rank() {
        let world = RayonComm::world(3);
        let gathered: Vec<Vec<u8>> = std::thread::scope(|s| {
            let handles: Vec<_> = world
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let mut out = vec![0u8; 6];
                        let mine = [comm.rank() as u8, 10 + comm.rank() as u8];
                        comm.allgather(&mine, &mut out);
                        out
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for out in gathered {
            assert_eq!(out, vec![0, 10, 1, 11, 2, 12]);
        }
    }

    #[test]
    fn tags_are_spaced() {
        let tags = MeshCommTags::from_base(CommTag::new(100));
        assert_eq!(tags.node_map.as_u16(), 100);
        assert_eq!(tags.transpose.as_u16(), 116);
        assert_eq!(tags.faces.as_u16(), 180);
    }

    #[test]
    fn no_comm_allgather_copies_self() {
        let mut out = [0u8; 2];
        NoComm.allgather(&[4, 2], &mut out);
        assert_eq!(out, [4, 2]);
    }
}
