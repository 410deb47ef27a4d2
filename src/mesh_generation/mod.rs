//! Structured mesh generators with named boundary sidesets.
//!
//! Generated meshes have a single element block [`DEFAULT_BLOCK`], cell
//! global ids equal to the lexicographic cell index (x fastest), and one
//! sideset per domain side.

use crate::mesh_error::LocalMeshError;
use crate::topology::cell_type::CellTopology;
use crate::topology::in_memory::{GlobalMesh, Side};
use std::collections::BTreeMap;

/// Name of the element block every generator produces.
pub const DEFAULT_BLOCK: &str = "eblock-0";

/// Sideset at the minimum-x side.
pub const SIDESET_LEFT: &str = "left";
/// Sideset at the maximum-x side.
pub const SIDESET_RIGHT: &str = "right";
/// Sideset at the minimum-y side.
pub const SIDESET_BOTTOM: &str = "bottom";
/// Sideset at the maximum-y side.
pub const SIDESET_TOP: &str = "top";
/// Sideset at the minimum-z side.
pub const SIDESET_BACK: &str = "back";
/// Sideset at the maximum-z side.
pub const SIDESET_FRONT: &str = "front";

fn invalid_geometry(message: impl Into<String>) -> LocalMeshError {
    LocalMeshError::InvalidMesh(message.into())
}

fn build_mesh(
    dimension: usize,
    coordinates: Vec<f64>,
    cells: Vec<Vec<usize>>,
    topology: CellTopology,
    sidesets: BTreeMap<String, Vec<Side>>,
) -> Result<GlobalMesh, LocalMeshError> {
    let n = cells.len();
    let mesh = GlobalMesh {
        dimension,
        coordinates,
        cells,
        cell_ids: (0..n as u64).collect(),
        cell_blocks: vec![0; n],
        blocks: vec![(DEFAULT_BLOCK.to_string(), topology)],
        sidesets,
    };
    mesh.validate()?;
    Ok(mesh)
}

/// 1D chain of `n` segments over `[min, max]`.
pub fn line_mesh(n: usize, min: f64, max: f64) -> Result<GlobalMesh, LocalMeshError> {
    if n == 0 {
        return Err(invalid_geometry("n must be positive"));
    }
    let dx = (max - min) / n as f64;
    let coordinates = (0..=n).map(|i| min + dx * i as f64).collect();
    let cells = (0..n).map(|i| vec![i, i + 1]).collect();

    let mut sidesets = BTreeMap::new();
    sidesets.insert(SIDESET_LEFT.to_string(), vec![Side { cell: 0, face: 0 }]);
    sidesets.insert(
        SIDESET_RIGHT.to_string(),
        vec![Side {
            cell: n - 1,
            face: 1,
        }],
    );
    build_mesh(1, coordinates, cells, CellTopology::Line2, sidesets)
}

/// Structured quadrilateral mesh over `[min, max]` with `nx`×`ny` cells.
pub fn quad_mesh(
    nx: usize,
    ny: usize,
    min: [f64; 2],
    max: [f64; 2],
) -> Result<GlobalMesh, LocalMeshError> {
    if nx == 0 || ny == 0 {
        return Err(invalid_geometry("nx and ny must be positive"));
    }

    let dx = (max[0] - min[0]) / nx as f64;
    let dy = (max[1] - min[1]) / ny as f64;
    let mut coordinates = Vec::with_capacity(2 * (nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            coordinates.push(min[0] + dx * i as f64);
            coordinates.push(min[1] + dy * j as f64);
        }
    }

    let row_stride = nx + 1;
    let mut cells = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let v0 = j * row_stride + i;
            let v1 = v0 + 1;
            let v3 = v0 + row_stride;
            let v2 = v3 + 1;
            cells.push(vec![v0, v1, v2, v3]);
        }
    }

    // quad edges: 0 bottom, 1 right, 2 top, 3 left
    let cell = |i: usize, j: usize| j * nx + i;
    let mut sidesets = BTreeMap::new();
    sidesets.insert(
        SIDESET_LEFT.to_string(),
        (0..ny).map(|j| Side { cell: cell(0, j), face: 3 }).collect(),
    );
    sidesets.insert(
        SIDESET_RIGHT.to_string(),
        (0..ny).map(|j| Side { cell: cell(nx - 1, j), face: 1 }).collect(),
    );
    sidesets.insert(
        SIDESET_BOTTOM.to_string(),
        (0..nx).map(|i| Side { cell: cell(i, 0), face: 0 }).collect(),
    );
    sidesets.insert(
        SIDESET_TOP.to_string(),
        (0..nx).map(|i| Side { cell: cell(i, ny - 1), face: 2 }).collect(),
    );
    build_mesh(2, coordinates, cells, CellTopology::Quad4, sidesets)
}

/// Structured hexahedral mesh over `[min, max]` with `nx`×`ny`×`nz` cells.
pub fn hex_mesh(
    nx: usize,
    ny: usize,
    nz: usize,
    min: [f64; 3],
    max: [f64; 3],
) -> Result<GlobalMesh, LocalMeshError> {
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(invalid_geometry("nx, ny, and nz must be positive"));
    }

    let dx = (max[0] - min[0]) / nx as f64;
    let dy = (max[1] - min[1]) / ny as f64;
    let dz = (max[2] - min[2]) / nz as f64;
    let mut coordinates = Vec::with_capacity(3 * (nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                coordinates.push(min[0] + dx * i as f64);
                coordinates.push(min[1] + dy * j as f64);
                coordinates.push(min[2] + dz * k as f64);
            }
        }
    }

    let row_stride = nx + 1;
    let slab_stride = row_stride * (ny + 1);
    let mut cells = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let v0 = k * slab_stride + j * row_stride + i;
                let v1 = v0 + 1;
                let v3 = v0 + row_stride;
                let v2 = v3 + 1;
                let v4 = v0 + slab_stride;
                let v5 = v4 + 1;
                let v7 = v4 + row_stride;
                let v6 = v7 + 1;
                cells.push(vec![v0, v1, v2, v3, v4, v5, v6, v7]);
            }
        }
    }

    // hex faces: 0 -y, 1 +x, 2 +y, 3 -x, 4 -z, 5 +z
    let cell = |i: usize, j: usize, k: usize| (k * ny + j) * nx + i;
    let side_x = |i: usize, face: usize| -> Vec<Side> {
        (0..nz)
            .flat_map(|k| (0..ny).map(move |j| (j, k)))
            .map(|(j, k)| Side { cell: cell(i, j, k), face })
            .collect()
    };
    let side_y = |j: usize, face: usize| -> Vec<Side> {
        (0..nz)
            .flat_map(|k| (0..nx).map(move |i| (i, k)))
            .map(|(i, k)| Side { cell: cell(i, j, k), face })
            .collect()
    };
    let side_z = |k: usize, face: usize| -> Vec<Side> {
        (0..ny)
            .flat_map(|j| (0..nx).map(move |i| (i, j)))
            .map(|(i, j)| Side { cell: cell(i, j, k), face })
            .collect()
    };
    let mut sidesets = BTreeMap::new();
    sidesets.insert(SIDESET_LEFT.to_string(), side_x(0, 3));
    sidesets.insert(SIDESET_RIGHT.to_string(), side_x(nx - 1, 1));
    sidesets.insert(SIDESET_BOTTOM.to_string(), side_y(0, 0));
    sidesets.insert(SIDESET_TOP.to_string(), side_y(ny - 1, 2));
    sidesets.insert(SIDESET_BACK.to_string(), side_z(0, 4));
    sidesets.insert(SIDESET_FRONT.to_string(), side_z(nz - 1, 5));
    build_mesh(3, coordinates, cells, CellTopology::Hex8, sidesets)
}

/// Split `mesh` into element blocks: `block_of(cell)` indexes `names`.
/// Every block keeps the topology of the first block.
pub fn assign_blocks<F>(
    mesh: &mut GlobalMesh,
    names: &[&str],
    block_of: F,
) -> Result<(), LocalMeshError>
where
    F: Fn(usize) -> usize,
{
    let topology = mesh
        .blocks
        .first()
        .map(|(_, t)| *t)
        .ok_or(LocalMeshError::NoElementBlocks)?;
    let mut cell_blocks = Vec::with_capacity(mesh.num_cells());
    for cell in 0..mesh.num_cells() {
        let b = block_of(cell);
        if b >= names.len() {
            return Err(invalid_geometry(format!(
                "cell {cell} assigned to block {b} of {}",
                names.len()
            )));
        }
        cell_blocks.push(b);
    }
    mesh.cell_blocks = cell_blocks;
    mesh.blocks = names.iter().map(|n| (n.to_string(), topology)).collect();
    Ok(())
}

/// Contiguous partition of `num_cells` cells over `num_ranks` ranks; the
/// first `num_cells % num_ranks` ranks get one extra cell.
pub fn block_partition(num_cells: usize, num_ranks: usize) -> Vec<usize> {
    let ranks = num_ranks.max(1);
    let base = num_cells / ranks;
    let extra = num_cells % ranks;
    (0..ranks)
        .flat_map(|r| std::iter::repeat_n(r, base + usize::from(r < extra)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_has_end_sidesets() {
        let mesh = line_mesh(4, 0.0, 1.0).unwrap();
        assert_eq!(mesh.num_cells(), 4);
        assert_eq!(mesh.num_nodes(), 5);
        assert_eq!(mesh.sidesets["right"], vec![Side { cell: 3, face: 1 }]);
    }

    #[test]
    fn quad_sidesets_cover_the_boundary() {
        let mesh = quad_mesh(3, 2, [0.0, 0.0], [3.0, 2.0]).unwrap();
        let total: usize = mesh.sidesets.values().map(Vec::len).sum();
        assert_eq!(total, 2 * (3 + 2));
        assert_eq!(mesh.sidesets["top"][0], Side { cell: 3, face: 2 });
    }

    #[test]
    fn hex_mesh_counts() {
        let mesh = hex_mesh(2, 2, 2, [0.0; 3], [1.0; 3]).unwrap();
        assert_eq!(mesh.num_cells(), 8);
        assert_eq!(mesh.num_nodes(), 27);
        assert!(mesh.sidesets.values().all(|s| s.len() == 4));
    }

    #[test]
    fn zero_cells_are_rejected() {
        assert!(line_mesh(0, 0.0, 1.0).is_err());
        assert!(quad_mesh(0, 1, [0.0; 2], [1.0; 2]).is_err());
    }

    #[test]
    fn partition_is_contiguous_and_balanced() {
        assert_eq!(block_partition(5, 2), vec![0, 0, 0, 1, 1]);
        assert_eq!(block_partition(2, 3), vec![0, 1]);
    }

    #[test]
    fn blocks_split_cells() {
        let mut mesh = line_mesh(4, 0.0, 1.0).unwrap();
        assign_blocks(&mut mesh, &["a", "b"], |c| usize::from(c >= 2)).unwrap();
        assert_eq!(mesh.cell_blocks, vec![0, 0, 1, 1]);
        assert_eq!(mesh.blocks[1].0, "b");
    }
}
