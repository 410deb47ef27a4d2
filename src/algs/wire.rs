//! Fixed little-endian wire records for the distributed stages.
//!
//! All multi-byte integers are stored pre-LE with `.to_le()` and decoded with
//! `.from_le()`. Received buffers are decoded by copy, so they need not be
//! aligned.

use crate::mesh_error::LocalMeshError;
use bytemuck::{Pod, Zeroable};

/// Sentinel for "no id" in wire records.
pub const WIRE_NONE: u64 = u64::MAX;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Encode records into an owned byte buffer.
pub fn encode<T: Pod>(records: &[T]) -> Vec<u8> {
    cast_slice(records).to_vec()
}

/// Decode a received buffer into records, checking that it holds a whole
/// number of them.
pub fn decode<T: Pod>(bytes: &[u8], neighbor: usize) -> Result<Vec<T>, LocalMeshError> {
    let size = std::mem::size_of::<T>();
    if size == 0 || bytes.len() % size != 0 {
        return Err(LocalMeshError::BufferSizeMismatch {
            neighbor,
            expected: (bytes.len() / size.max(1)) * size,
            got: bytes.len(),
        });
    }
    let mut out = vec![T::zeroed(); bytes.len() / size];
    cast_slice_mut(&mut out).copy_from_slice(bytes);
    Ok(out)
}

/// Byte count of a pending message.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u64,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }

    /// Saturates where the count does not fit `usize`; the payload then
    /// fails its length check.
    pub fn get(&self) -> usize {
        usize::try_from(u64::from_le(self.n_le)).unwrap_or(usize::MAX)
    }
}

/// A global id carried on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireGid {
    pub id_le: u64,
}

impl WireGid {
    pub fn of(id: u64) -> Self {
        Self { id_le: id.to_le() }
    }
    pub fn get(&self) -> u64 {
        u64::from_le(self.id_le)
    }
}

/// Owner answer from a directory shard; `rank_le == u32::MAX` means unknown.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireOwner {
    pub rank_le: u32,
}

impl WireOwner {
    pub fn new(owner: Option<usize>) -> Self {
        Self {
            rank_le: owner.map_or(u32::MAX, |r| r as u32).to_le(),
        }
    }
    pub fn get(&self) -> Option<usize> {
        match u32::from_le(self.rank_le) {
            u32::MAX => None,
            r => Some(r as usize),
        }
    }
}

/// One sparse-matrix entry `(row, col) = val`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireEntry {
    pub row_le: u64,
    pub col_le: u64,
    pub val_le: i64,
}

impl WireEntry {
    pub fn new(row: u64, col: u64, val: i32) -> Self {
        Self {
            row_le: row.to_le(),
            col_le: col.to_le(),
            val_le: (val as i64).to_le(),
        }
    }
    pub fn row(&self) -> u64 {
        u64::from_le(self.row_le)
    }
    pub fn col(&self) -> u64 {
        u64::from_le(self.col_le)
    }
    pub fn val(&self) -> i32 {
        i64::from_le(self.val_le) as i32
    }
}

/// A resolved face: both adjacent cells with their local face indices.
/// Missing sides carry [`WIRE_NONE`].
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireFace {
    pub face_le: u64,
    pub cell_le: [u64; 2],
    pub lidx_le: [u64; 2],
}

impl WireFace {
    pub fn new(face: u64, cells: [Option<u64>; 2], lidx: [Option<usize>; 2]) -> Self {
        let c = |x: Option<u64>| x.unwrap_or(WIRE_NONE).to_le();
        let l = |x: Option<usize>| x.map_or(WIRE_NONE, |v| v as u64).to_le();
        Self {
            face_le: face.to_le(),
            cell_le: [c(cells[0]), c(cells[1])],
            lidx_le: [l(lidx[0]), l(lidx[1])],
        }
    }
    pub fn face(&self) -> u64 {
        u64::from_le(self.face_le)
    }
    pub fn cells(&self) -> [Option<u64>; 2] {
        self.cell_le.map(|v| match u64::from_le(v) {
            WIRE_NONE => None,
            id => Some(id),
        })
    }
    pub fn lidx(&self) -> [Option<usize>; 2] {
        self.lidx_le.map(|v| match u64::from_le(v) {
            WIRE_NONE => None,
            id => Some(id as usize),
        })
    }
}
