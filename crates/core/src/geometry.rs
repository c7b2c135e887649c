//! Footprint geometry helpers over `geo::Polygon<f64>` (spec §3 "Footprint
//! polygon, webmap-projected polygon, bounding box"; spec §4.1 adjacency
//! query; spec §4.5 emission weight factors).
//!
//! The teacher has no polygon geometry at all — fuel elements are points in
//! `core_types/spatial.rs`. This module is grounded on the `geo`/`rstar`
//! pairing used for footprint overlap in `openmander-core`.

use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Intersects, Rect,
};
use geo::{Coord, LineString, Polygon};

/// A cell's 2D footprint in the grid projection.
pub type Footprint = Polygon<f64>;

/// Builds an axis-aligned rectangular footprint from its lower-left corner
/// and edge lengths, the shape every grid-builder and mutator cell starts
/// life as (before any projection warps it — spec.md does not require
/// footprints to stay rectangular after construction, so downstream code
/// must not assume it).
pub fn rect_footprint(x0: f64, y0: f64, dx: f64, dy: f64) -> Footprint {
    let coords = vec![
        Coord { x: x0, y: y0 },
        Coord { x: x0 + dx, y: y0 },
        Coord { x: x0 + dx, y: y0 + dy },
        Coord { x: x0, y: y0 + dy },
        Coord { x: x0, y: y0 },
    ];
    Polygon::new(LineString::from(coords), vec![])
}

/// Unsigned area of a footprint.
pub fn area(footprint: &Footprint) -> f64 {
    footprint.unsigned_area()
}

/// Area of the intersection of two footprints (0.0 if they do not overlap).
pub fn intersection_area(a: &Footprint, b: &Footprint) -> f64 {
    let clipped = a.intersection(b);
    clipped.unsigned_area()
}

/// Whether two footprints overlap with nonzero area (used by `Insert`'s
/// precondition check — spec.md "c's footprint does not overlap any
/// existing interior cell").
pub fn overlaps(a: &Footprint, b: &Footprint) -> bool {
    a.intersects(b) && intersection_area(a, b) > 0.0
}

/// The axis-aligned bounding box of a footprint. Panics (via `expect`) only
/// on a degenerate empty polygon, which should never reach this function —
/// every footprint in this crate is built from a nonempty coordinate ring.
pub fn bounding_rect(footprint: &Footprint) -> Rect<f64> {
    footprint
        .bounding_rect()
        .expect("footprint must have a non-empty exterior ring")
}

/// Expands a bounding box by `offset` on every side, used by the adjacency
/// query (spec §4.1 "expand the box by a small offset proportional to its
/// extent").
pub fn expand_rect(rect: Rect<f64>, offset: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: rect.min().x - offset,
            y: rect.min().y - offset,
        },
        Coord {
            x: rect.max().x + offset,
            y: rect.max().y + offset,
        },
    )
}

/// The centroid of a footprint, used for distance calculations between cell
/// centers (`centerDistance` in `NeighborRef`).
pub fn centroid(footprint: &Footprint) -> Option<geo::Point<f64>> {
    footprint.centroid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rect_area_matches_extents() {
        let fp = rect_footprint(0.0, 0.0, 4.0, 3.0);
        assert_relative_eq!(area(&fp), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn half_overlap_area_is_half() {
        let a = rect_footprint(0.0, 0.0, 2.0, 2.0);
        let b = rect_footprint(1.0, 0.0, 2.0, 2.0);
        assert_relative_eq!(intersection_area(&a, &b), 2.0, epsilon = 1e-9);
        assert!(overlaps(&a, &b));
    }

    #[test]
    fn disjoint_rects_do_not_overlap() {
        let a = rect_footprint(0.0, 0.0, 1.0, 1.0);
        let b = rect_footprint(5.0, 5.0, 1.0, 1.0);
        assert!(!overlaps(&a, &b));
    }

    #[test]
    fn expand_rect_grows_symmetrically() {
        let rect = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
        let expanded = expand_rect(rect, 0.1);
        assert_relative_eq!(expanded.min().x, -0.1, epsilon = 1e-12);
        assert_relative_eq!(expanded.max().x, 1.1, epsilon = 1e-12);
    }
}
