//! LocalMeshError: unified error type for local mesh construction.
//!
//! Every public fallible operation in this crate returns
//! `Result<_, LocalMeshError>`. Variants fall into three groups:
//! configuration problems reported by the mesh backend, violated internal
//! invariants, and communication failures. None of them is retryable; the
//! construction is deterministic for a fixed partition.

use thiserror::Error;

fn name_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("\t\"{n}\"\n"))
        .collect::<String>()
}

/// Unified error type for local mesh operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocalMeshError {
    /// Element blocks disagree on their cell topology.
    #[error("inconsistent cell topology: block `{block}` is `{found}`, expected `{expected}`")]
    InconsistentTopology {
        block: String,
        expected: String,
        found: String,
    },
    /// The backend does not know the requested element block.
    #[error(
        "no element block named `{name}`\nChoose existing element block:\n{}",
        name_list(.available)
    )]
    UnknownElementBlock { name: String, available: Vec<String> },
    /// The backend does not know the requested sideset.
    #[error("no sideset named `{name}`\nChoose existing sideset:\n{}", name_list(.available))]
    UnknownSideset { name: String, available: Vec<String> },
    /// The mesh has no element blocks at all.
    #[error("mesh has no element blocks")]
    NoElementBlocks,
    /// A field pattern or subcell query does not fit the cell topology.
    #[error("topology `{topology}` has no subcells of dimension {dimension}")]
    UnsupportedTopology { topology: String, dimension: usize },
    /// Malformed input mesh data.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
    /// A global id appears twice where ids must be unique.
    #[error("duplicate global id {0}")]
    DuplicateGlobalId(u64),
    /// `u64::MAX` marks a missing id and cannot name a cell or node.
    #[error("global id {0} is reserved")]
    ReservedGlobalId(u64),
    /// Virtual cell ids would run past `u64::MAX`.
    #[error("no room for {count} virtual cell ids after global id {start}")]
    GlobalIdOverflow { start: u64, count: u64 },

    /// A virtual cell has no face leading to a real cell.
    #[error("virtual cell {cell} is not linked to a real cell")]
    VirtualCellWithoutNeighbor { cell: usize },
    /// Both sides of a face resolved to virtual cells.
    #[error("face {face} joins two virtual cells")]
    FaceBetweenVirtualCells { face: usize },
    /// A global id that connectivity references has no local index.
    #[error("global id {0} has no local index")]
    UnknownGlobalId(u64),
    /// A backend local cell index has no counterpart in the local mesh.
    #[error("local cell {0} is not part of the local mesh")]
    UnknownLocalCell(usize),
    /// Array extents disagree.
    #[error("extent mismatch for {what}: expected {expected}, found {found}")]
    ExtentMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// The cell field pattern must give exactly one id per cell.
    #[error("cell {cell} has {found} ids in its cell connectivity, expected 1")]
    CellConnectivitySize { cell: usize, found: usize },
    /// A sideset subcell does not line up with the face tables.
    #[error("subcell {subcell} of cell {cell} does not match face {face:?}")]
    SubcellMismatch {
        cell: usize,
        subcell: usize,
        face: Option<usize>,
    },
    /// A matrix operation was attempted before `fill_complete`.
    #[error("matrix operation `{0}` requires fill_complete")]
    MatrixNotFilled(&'static str),

    /// Communication with a peer failed.
    #[error("communication error with rank {neighbor}: {message}")]
    CommError { neighbor: usize, message: String },
    /// A received buffer has the wrong length.
    #[error("buffer from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    /// The thread pool backing an in-process world could not be built.
    #[error("thread pool: {0}")]
    ThreadPool(String),
}

impl LocalMeshError {
    /// Errors caused by the caller's mesh or names rather than a broken invariant.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            LocalMeshError::InconsistentTopology { .. }
                | LocalMeshError::UnknownElementBlock { .. }
                | LocalMeshError::UnknownSideset { .. }
                | LocalMeshError::NoElementBlocks
                | LocalMeshError::UnsupportedTopology { .. }
                | LocalMeshError::InvalidMesh(_)
                | LocalMeshError::ReservedGlobalId(_)
                | LocalMeshError::GlobalIdOverflow { .. }
        )
    }

    /// Errors raised by the communication layer.
    pub fn is_comm_error(&self) -> bool {
        matches!(
            self,
            LocalMeshError::CommError { .. } | LocalMeshError::BufferSizeMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sideset_lists_alternatives() {
        let err = LocalMeshError::UnknownSideset {
            name: "top".into(),
            available: vec!["left".into(), "right".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("no sideset named `top`"));
        assert!(msg.contains("\t\"left\"\n"));
        assert!(msg.contains("\t\"right\"\n"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn invariant_errors_are_not_configuration() {
        let err = LocalMeshError::FaceBetweenVirtualCells { face: 3 };
        assert!(!err.is_configuration_error());
        assert!(!err.is_comm_error());
    }
}
