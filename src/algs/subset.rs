//! Block and sideset views of a full local mesh.
//!
//! A view keeps a set of "owned" parent cells, adds the cells across a
//! chosen set of their faces (real neighbors become the view's ghosts,
//! virtual neighbors stay virtual) and renumbers everything densely in
//! owned, ghost, virtual order. Each category is sorted by parent index.
//! Cell global ids and geometry are copied from the parent unchanged.

use crate::data::local_mesh_info::{
    CellToFaces, LocalMeshBlockInfo, LocalMeshInfoBase, LocalMeshSidesetInfo,
};
use crate::mesh_error::LocalMeshError;
use crate::topology::backend::MeshBackend;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Restrict `parent` to `owned` cells and the given parent `faces`, which
/// must all touch an owned cell.
pub fn sub_local_mesh_info(
    parent: &LocalMeshInfoBase,
    owned: &BTreeSet<usize>,
    faces: &BTreeSet<usize>,
) -> Result<LocalMeshInfoBase, LocalMeshError> {
    let num_real = parent.num_real_cells();
    let mut ghost = BTreeSet::new();
    let mut virt = BTreeSet::new();
    for &face in faces {
        let cells = parent.face_to_cells.get(face).ok_or_else(|| {
            LocalMeshError::InvalidMesh(format!("face {face} is not part of the parent mesh"))
        })?;
        if !cells.iter().any(|c| owned.contains(c)) {
            return Err(LocalMeshError::InvalidMesh(format!(
                "face {face} does not touch the selected cells"
            )));
        }
        for &c in cells.iter().filter(|c| !owned.contains(c)) {
            if c < num_real {
                ghost.insert(c);
            } else {
                virt.insert(c);
            }
        }
    }

    let all_cells: Vec<usize> = owned
        .iter()
        .chain(&ghost)
        .chain(&virt)
        .copied()
        .collect();
    let parent_to_sub: HashMap<usize, usize> = all_cells
        .iter()
        .enumerate()
        .map(|(i, &p)| (p, i))
        .collect();
    let to_sub = |p: usize| {
        parent_to_sub
            .get(&p)
            .copied()
            .ok_or(LocalMeshError::UnknownLocalCell(p))
    };

    let mut cell_to_faces =
        CellToFaces::new(all_cells.len(), parent.cell_to_faces.faces_per_cell());
    let mut face_to_cells = Vec::with_capacity(faces.len());
    let mut face_to_lidx = Vec::with_capacity(faces.len());
    for (f, &pf) in faces.iter().enumerate() {
        let [p0, p1] = parent.face_to_cells[pf];
        let [l0, l1] = parent.face_to_lidx[pf];
        let (c0, c1) = (to_sub(p0)?, to_sub(p1)?);
        cell_to_faces.set(c0, l0, f)?;
        cell_to_faces.set(c1, l1, f)?;
        if c0 < c1 {
            face_to_cells.push([c0, c1]);
            face_to_lidx.push([l0, l1]);
        } else {
            face_to_cells.push([c1, c0]);
            face_to_lidx.push([l1, l0]);
        }
    }

    Ok(LocalMeshInfoBase {
        num_owned_cells: owned.len(),
        num_ghost_cells: ghost.len(),
        num_virtual_cells: virt.len(),
        local_cells: all_cells.iter().map(|&p| parent.local_cells[p]).collect(),
        global_cells: all_cells.iter().map(|&p| parent.global_cells[p]).collect(),
        cell_vertices: parent.cell_vertices.select(&all_cells),
        cell_to_faces,
        face_to_cells,
        face_to_lidx,
    })
}

/// View of the owned cells of `element_block_name` and their face neighbors.
pub fn setup_local_mesh_block_info<B>(
    backend: &B,
    mesh_info: &LocalMeshInfoBase,
    element_block_name: &str,
) -> Result<LocalMeshBlockInfo, LocalMeshError>
where
    B: MeshBackend + ?Sized,
{
    let cell_topology = backend.block_topology(element_block_name)?;
    let owned: BTreeSet<usize> = (0..mesh_info.num_owned_cells)
        .filter(|&p| backend.block_id(mesh_info.local_cells[p]) == Some(element_block_name))
        .collect();
    if owned.is_empty() {
        log::warn!("element block `{element_block_name}` has no owned cells on this rank");
    }
    let faces: BTreeSet<usize> = owned
        .iter()
        .flat_map(|&p| mesh_info.cell_to_faces.row(p).iter().flatten().copied())
        .collect();
    Ok(LocalMeshBlockInfo {
        base: sub_local_mesh_info(mesh_info, &owned, &faces)?,
        element_block_name: element_block_name.to_string(),
        cell_topology: Some(cell_topology),
    })
}

/// View of the owned cells of `element_block_name` lying on
/// `sideset_name`, the cells across their sideset faces, and those faces.
pub fn setup_local_mesh_sideset_info<B>(
    backend: &B,
    mesh_info: &LocalMeshInfoBase,
    element_block_name: &str,
    sideset_name: &str,
) -> Result<LocalMeshSidesetInfo, LocalMeshError>
where
    B: MeshBackend + ?Sized,
{
    let sides = backend.side_entities(sideset_name, element_block_name)?;
    let cell_topology = backend.block_topology(element_block_name)?;
    let face_dim = cell_topology.dimension() - 1;

    let local_to_parent: HashMap<usize, usize> = (0..mesh_info.num_owned_cells)
        .map(|p| (mesh_info.local_cells[p], p))
        .collect();
    let mut parent_to_subcells: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for rel in backend.side_element_cascade(element_block_name, &sides)? {
        if rel.dimension != face_dim {
            continue;
        }
        let local = backend
            .element_local_id(rel.element)
            .ok_or(LocalMeshError::UnknownGlobalId(rel.element))?;
        let parent = local_to_parent
            .get(&local)
            .copied()
            .ok_or(LocalMeshError::UnknownLocalCell(local))?;
        parent_to_subcells.entry(parent).or_default().push(rel.index);
    }

    let mut faces = BTreeSet::new();
    for (&cell, subcells) in &parent_to_subcells {
        for &subcell in subcells {
            let face = mesh_info.cell_to_faces.get(cell, subcell);
            let matches = face.is_some_and(|f| {
                let side = if mesh_info.face_to_cells[f][0] == cell { 0 } else { 1 };
                mesh_info.face_to_cells[f][side] == cell
                    && mesh_info.face_to_lidx[f][side] == subcell
            });
            match face {
                Some(f) if matches => {
                    faces.insert(f);
                }
                _ => return Err(LocalMeshError::SubcellMismatch { cell, subcell, face }),
            }
        }
    }

    let owned: BTreeSet<usize> = parent_to_subcells.keys().copied().collect();
    let base = sub_local_mesh_info(mesh_info, &owned, &faces)?;
    log::debug!(
        "sideset `{sideset_name}` in `{element_block_name}`: cells {}/{}/{} owned/ghost/virtual",
        base.num_owned_cells,
        base.num_ghost_cells,
        base.num_virtual_cells
    );
    Ok(LocalMeshSidesetInfo {
        base,
        element_block_name: element_block_name.to_string(),
        sideset_name: sideset_name.to_string(),
        cell_topology: Some(cell_topology),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cell_vertices::CellVertices;
    use crate::debug_invariants::DebugInvariants;

    /// virtual 3 | owned 0 | owned 1 | ghost 2, on a line.
    fn chain() -> LocalMeshInfoBase {
        let mut cell_to_faces = CellToFaces::new(4, 2);
        // faces: 0 = v3|c0, 1 = c0|c1, 2 = c1|c2
        cell_to_faces.set(3, 0, 0).unwrap();
        cell_to_faces.set(0, 0, 0).unwrap();
        cell_to_faces.set(0, 1, 1).unwrap();
        cell_to_faces.set(1, 0, 1).unwrap();
        cell_to_faces.set(1, 1, 2).unwrap();
        cell_to_faces.set(2, 0, 2).unwrap();
        LocalMeshInfoBase {
            num_owned_cells: 2,
            num_ghost_cells: 1,
            num_virtual_cells: 1,
            local_cells: vec![0, 1, 2, 3],
            global_cells: vec![10, 11, 12, 40],
            cell_vertices: CellVertices::from_vec(
                vec![0., 1., 1., 2., 2., 3., 0., 1.],
                4,
                2,
                1,
            )
            .unwrap(),
            cell_to_faces,
            face_to_cells: vec![[0, 3], [0, 1], [1, 2]],
            face_to_lidx: vec![[0, 0], [1, 0], [1, 0]],
        }
    }

    #[test]
    fn restriction_renumbers_in_category_order() {
        let parent = chain();
        parent.validate_invariants().unwrap();
        let owned = BTreeSet::from([1]);
        let faces = BTreeSet::from([1, 2]);
        let sub = sub_local_mesh_info(&parent, &owned, &faces).unwrap();
        assert_eq!((sub.num_owned_cells, sub.num_ghost_cells, sub.num_virtual_cells), (1, 2, 0));
        assert_eq!(sub.global_cells, vec![11, 10, 12]);
        assert_eq!(sub.local_cells, vec![1, 0, 2]);
        // parent face 1 (0|1) now joins sub cells 1 and 0: smaller first
        assert_eq!(sub.face_to_cells[0], [0, 1]);
        assert_eq!(sub.face_to_lidx[0], [0, 1]);
        sub.validate_invariants().unwrap();
    }

    #[test]
    fn virtual_neighbors_stay_virtual() {
        let parent = chain();
        let sub = sub_local_mesh_info(&parent, &BTreeSet::from([0]), &BTreeSet::from([0])).unwrap();
        assert_eq!(sub.num_virtual_cells, 1);
        assert_eq!(sub.global_cells, vec![10, 40]);
        assert_eq!(sub.cell_vertices.cell(1), sub.cell_vertices.cell(0));
        sub.validate_invariants().unwrap();
    }

    #[test]
    fn empty_selection_gives_empty_view() {
        let sub = sub_local_mesh_info(&chain(), &BTreeSet::new(), &BTreeSet::new()).unwrap();
        assert_eq!(sub.num_total_cells(), 0);
        assert_eq!(sub.num_faces(), 0);
        sub.validate_invariants().unwrap();
    }

    #[test]
    fn faces_must_touch_selection() {
        let err = sub_local_mesh_info(&chain(), &BTreeSet::from([0]), &BTreeSet::from([2]))
            .unwrap_err();
        assert!(matches!(err, LocalMeshError::InvalidMesh(_)));
    }
}
