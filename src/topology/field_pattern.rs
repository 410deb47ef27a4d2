//! Field patterns: which subcells of a cell carry connectivity ids.

use crate::mesh_error::LocalMeshError;
use crate::topology::cell_type::CellTopology;

/// Subcell dimension whose global ids make up a connectivity.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FieldPattern {
    /// One id per vertex.
    Nodal,
    /// One id per edge (dimension 1).
    Edge,
    /// One id per face (dimension 2).
    Face,
    /// One id per volume (dimension 3).
    Element,
}

impl FieldPattern {
    pub fn for_dimension(dim: usize) -> Result<Self, LocalMeshError> {
        match dim {
            0 => Ok(FieldPattern::Nodal),
            1 => Ok(FieldPattern::Edge),
            2 => Ok(FieldPattern::Face),
            3 => Ok(FieldPattern::Element),
            _ => Err(LocalMeshError::UnsupportedTopology {
                topology: "field pattern".into(),
                dimension: dim,
            }),
        }
    }

    pub fn subcell_dimension(self) -> usize {
        match self {
            FieldPattern::Nodal => 0,
            FieldPattern::Edge => 1,
            FieldPattern::Face => 2,
            FieldPattern::Element => 3,
        }
    }

    /// The pattern giving exactly one id per cell: edge for 1D cells, face
    /// for 2D cells, element for 3D cells.
    pub fn cell(topology: CellTopology) -> Self {
        match topology.dimension() {
            1 => FieldPattern::Edge,
            2 => FieldPattern::Face,
            _ => FieldPattern::Element,
        }
    }

    /// The pattern over codimension-1 subcells.
    pub fn facet(topology: CellTopology) -> Self {
        match topology.dimension() {
            1 => FieldPattern::Nodal,
            2 => FieldPattern::Edge,
            _ => FieldPattern::Face,
        }
    }

    /// Number of ids a cell of `topology` carries under this pattern.
    pub fn ids_per_cell(self, topology: CellTopology) -> usize {
        topology.subcell_count(self.subcell_dimension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_pattern_gives_one_id() {
        for topo in [
            CellTopology::Line2,
            CellTopology::Quad4,
            CellTopology::Tri3,
            CellTopology::Hex8,
            CellTopology::Tet4,
        ] {
            assert_eq!(FieldPattern::cell(topo).ids_per_cell(topo), 1);
            assert_eq!(
                FieldPattern::facet(topo).ids_per_cell(topo),
                topo.face_count()
            );
        }
    }

    #[test]
    fn dimension_round_trip() {
        for d in 0..4 {
            assert_eq!(FieldPattern::for_dimension(d).unwrap().subcell_dimension(), d);
        }
        assert!(FieldPattern::for_dimension(4).is_err());
    }
}
