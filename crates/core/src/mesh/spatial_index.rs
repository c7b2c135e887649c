//! R-tree envelope wrapper over live interior cells (spec §3 "SpatialIndex:
//! R-tree over cell footprints"; mesh invariant 5 "the spatial index
//! contains exactly the set of live interior cells").
//!
//! Grounded on the `rstar`/`geo` pairing used for footprint-indexed lookups
//! in `openmander-core` and `digital_life`; the teacher's own
//! `core_types/spatial.rs` indexes points, not polygons, so this module has
//! no direct teacher counterpart beyond the "index wrapped behind
//! insert/query methods" shape.

use crate::cell::CellId;
use crate::geometry::bounding_rect;
use rstar::{RTreeObject, AABB};

/// The entry type stored in the mesh's R-tree: a cell's id plus the
/// axis-aligned envelope of its footprint, all the index needs to answer
/// overlap and adjacency queries without dereferencing into the arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedCell {
    pub id: CellId,
    pub layer: u32,
    min: [f64; 2],
    max: [f64; 2],
}

impl IndexedCell {
    pub fn new(id: CellId, layer: u32, footprint: &crate::geometry::Footprint) -> Self {
        let rect = bounding_rect(footprint);
        IndexedCell {
            id,
            layer,
            min: [rect.min().x, rect.min().y],
            max: [rect.max().x, rect.max().y],
        }
    }

    pub fn from_rect(id: CellId, layer: u32, rect: geo::Rect<f64>) -> Self {
        IndexedCell {
            id,
            layer,
            min: [rect.min().x, rect.min().y],
            max: [rect.max().x, rect.max().y],
        }
    }
}

impl RTreeObject for IndexedCell {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect_footprint;
    use rstar::RTree;

    #[test]
    fn query_finds_overlapping_envelope() {
        let mut tree: RTree<IndexedCell> = RTree::new();
        let fp = rect_footprint(0.0, 0.0, 1.0, 1.0);
        tree.insert(IndexedCell::new(CellId(0), 0, &fp));

        let probe_rect = geo::Rect::new(
            geo::Coord { x: 0.5, y: 0.5 },
            geo::Coord { x: 1.5, y: 1.5 },
        );
        let probe = AABB::from_corners([probe_rect.min().x, probe_rect.min().y], [probe_rect.max().x, probe_rect.max().y]);
        let hits: Vec<_> = tree.locate_in_envelope_intersecting(&probe).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, CellId(0));
    }
}
