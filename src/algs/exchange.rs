//! Collective building blocks over point-to-point messaging.
//!
//! [`sparse_all_to_all`] runs in two stages, sizes then payloads, like the
//! section completion exchange: every rank posts all receives, posts all
//! sends, waits on every receive without early return, and drains every send
//! handle before reporting the first error.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{self, WireCount, cast_slice, cast_slice_mut};
use crate::mesh_error::LocalMeshError;
use bytemuck::Pod;

/// Stage 1: exchange the byte length of every outgoing buffer with every
/// other rank. Returns the incoming lengths indexed by rank.
pub fn exchange_sizes<C>(
    send: &[Vec<u8>],
    comm: &C,
    tag: CommTag,
) -> Result<Vec<usize>, LocalMeshError>
where
    C: Communicator + ?Sized,
{
    let me = comm.rank();
    let size = comm.size();
    if send.len() != size {
        return Err(LocalMeshError::ExtentMismatch {
            what: "size exchange buffers",
            expected: size,
            found: send.len(),
        });
    }

    // 1) post all receives
    let mut recv_size = Vec::with_capacity(size);
    for nbr in (0..size).filter(|&p| p != me) {
        let mut cnt = WireCount::new(0);
        let h = comm.irecv(
            nbr,
            tag.as_u16(),
            cast_slice_mut(std::slice::from_mut(&mut cnt)),
        );
        recv_size.push((nbr, h));
    }

    // 2) post all sends
    let mut pending_sends = Vec::with_capacity(size);
    for nbr in (0..size).filter(|&p| p != me) {
        let count = WireCount::new(send[nbr].len());
        pending_sends.push(comm.isend(
            nbr,
            tag.as_u16(),
            cast_slice(std::slice::from_ref(&count)),
        ));
    }

    // 3) wait for all recvs (no early return)
    let mut sizes_in = vec![0usize; size];
    sizes_in[me] = send[me].len();
    let mut maybe_err = None;
    for (nbr, h) in recv_size {
        match h.wait() {
            Some(data) if data.len() == std::mem::size_of::<WireCount>() => {
                let mut cnt = WireCount::new(0);
                cast_slice_mut(std::slice::from_mut(&mut cnt)).copy_from_slice(&data);
                sizes_in[nbr] = cnt.get();
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(LocalMeshError::BufferSizeMismatch {
                    neighbor: nbr,
                    expected: std::mem::size_of::<WireCount>(),
                    got: data.len(),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(LocalMeshError::CommError {
                    neighbor: nbr,
                    message: format!("failed to receive size from rank {nbr}"),
                });
            }
            _ => {}
        }
    }

    // 4) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(sizes_in),
    }
}

/// Personalized all-to-all over point-to-point messages.
///
/// `send[p]` is delivered to rank `p`; the buffer for this rank is moved
/// locally without touching the communicator. Uses `tag` for the size stage
/// and `tag + 1` for the payload stage.
pub fn sparse_all_to_all<C>(
    send: &[Vec<u8>],
    comm: &C,
    tag: CommTag,
) -> Result<Vec<Vec<u8>>, LocalMeshError>
where
    C: Communicator + ?Sized,
{
    let me = comm.rank();
    let size = comm.size();
    if send.len() != size {
        return Err(LocalMeshError::ExtentMismatch {
            what: "all_to_all send buffers",
            expected: size,
            found: send.len(),
        });
    }
    let sizes_in = exchange_sizes(send, comm, tag)?;
    let data_tag = tag.offset(1);

    let mut recv_data = Vec::new();
    for nbr in (0..size).filter(|&p| p != me && sizes_in[p] > 0) {
        let mut buffer = vec![0u8; sizes_in[nbr]];
        let h = comm.irecv(nbr, data_tag.as_u16(), &mut buffer);
        recv_data.push((nbr, h));
    }
    let mut pending_sends = Vec::new();
    for nbr in (0..size).filter(|&p| p != me && !send[p].is_empty()) {
        pending_sends.push(comm.isend(nbr, data_tag.as_u16(), &send[nbr]));
    }

    let mut out = vec![Vec::new(); size];
    out[me] = send[me].clone();
    let mut maybe_err = None;
    for (nbr, h) in recv_data {
        match h.wait() {
            Some(data) if data.len() == sizes_in[nbr] => out[nbr] = data,
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(LocalMeshError::BufferSizeMismatch {
                    neighbor: nbr,
                    expected: sizes_in[nbr],
                    got: data.len(),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(LocalMeshError::CommError {
                    neighbor: nbr,
                    message: format!("failed to receive payload from rank {nbr}"),
                });
            }
            _ => {}
        }
    }
    for send in pending_sends {
        let _ = send.wait();
    }
    log::trace!(
        "rank {me}: all_to_all tag {:#x} sent {} B, received {} B",
        tag.as_u16(),
        send.iter().map(Vec::len).sum::<usize>(),
        out.iter().map(Vec::len).sum::<usize>()
    );

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

/// Typed all-to-all of Pod records through [`Communicator::all_to_all_v`].
pub fn all_to_all_records<T, C>(
    send: &[Vec<T>],
    comm: &C,
    tag: CommTag,
) -> Result<Vec<Vec<T>>, LocalMeshError>
where
    T: Pod,
    C: Communicator + ?Sized,
{
    let bytes: Vec<Vec<u8>> = send.iter().map(|recs| wire::encode(recs)).collect();
    comm.all_to_all_v(&bytes, tag)?
        .iter()
        .enumerate()
        .map(|(nbr, buf)| wire::decode::<T>(buf, nbr))
        .collect()
}

/// One `u64` from every rank, ordered by rank.
pub fn allgather_u64<C>(local: u64, comm: &C) -> Vec<u64>
where
    C: Communicator + ?Sized,
{
    let size = comm.size();
    let mut recv = vec![0u8; size * 8];
    comm.allgather(&local.to_le_bytes(), &mut recv);
    recv.chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            u64::from_le_bytes(raw)
        })
        .collect()
}

/// Element-wise sum of `local` across all ranks.
pub fn all_reduce_sum<C>(local: &[u64], comm: &C) -> Vec<u64>
where
    C: Communicator + ?Sized,
{
    let size = comm.size();
    let n = local.len();
    let send: Vec<u8> = local.iter().flat_map(|v| v.to_le_bytes()).collect();
    let mut recv = vec![0u8; size * n * 8];
    comm.allgather(&send, &mut recv);
    let mut out = vec![0u64; n];
    for rank_chunk in recv.chunks_exact((n * 8).max(1)).take(size) {
        for (slot, chunk) in out.iter_mut().zip(rank_chunk.chunks_exact(8)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            *slot += u64::from_le_bytes(raw);
        }
    }
    out
}
