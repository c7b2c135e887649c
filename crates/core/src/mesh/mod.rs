//! `Mesh` (Domain): owns the cell arena, boundary cells, spatial index,
//! layer count, and current `Δt` (spec §2 item 4, §4.1).
//!
//! Grounded on the teacher's `grid/simulation_grid.rs`: a single owning type
//! that holds cells plus derived caches behind bounds-checked accessors, and
//! `core_types/spatial.rs`'s pattern of hiding the index behind
//! insert/query methods rather than exposing it directly. The index itself
//! is now an `rstar::RTree` (see `spatial_index.rs`) instead of the
//! teacher's Morton-hashed octree, since this mesh indexes polygon
//! footprints rather than point positions.

pub mod spatial_index;

use crate::cell::{Cell, CellId, Direction, NeighborRef, NeighborTarget};
use crate::error::{InMapError, Result};
use crate::geometry::{self, bounding_rect, expand_rect};
use rstar::RTree;
use rustc_hash::FxHashMap;
use spatial_index::IndexedCell;
use tracing::{debug, warn};

/// Small proportional expansion used by the adjacency query (spec §4.1:
/// "expand the box by a small offset proportional to its extent"). Chosen
/// small enough to stay within a single neighboring cell under realistic
/// nesting ratios, large enough to survive floating-point round-off at cell
/// boundaries.
const ADJACENCY_EXPANSION_FRACTION: f64 = 1e-6;

/// Owns the full set of live interior cells, the six per-side boundary
/// lists, and the spatial index over interior footprints.
#[derive(Debug, Default)]
pub struct Mesh {
    arena: Vec<Option<Cell>>,
    /// Canonical order: layer ascending, then centroid X ascending, then
    /// centroid Y ascending (mesh invariant 4).
    order: Vec<CellId>,
    tree: RTree<IndexedCell>,
    boundary: [Vec<Cell>; 6],
    nlayers: u32,
}

fn direction_index(direction: Direction) -> usize {
    match direction {
        Direction::West => 0,
        Direction::East => 1,
        Direction::South => 2,
        Direction::North => 3,
        Direction::Above => 4,
        Direction::Below => 5,
    }
}

impl Mesh {
    pub fn new() -> Self {
        Mesh::default()
    }

    pub fn nlayers(&self) -> u32 {
        self.nlayers
    }

    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.arena.get(id.index()).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.arena.get_mut(id.index()).and_then(|slot| slot.as_mut())
    }

    /// Cells in canonical order (mesh invariant 4).
    pub fn iter_order(&self) -> impl Iterator<Item = &Cell> {
        self.order.iter().filter_map(move |id| self.get(*id))
    }

    /// Cell ids in canonical order, detached from `self` so callers can
    /// mutate cells while iterating.
    pub fn iter_order_ids(&self) -> Vec<CellId> {
        self.order.clone()
    }

    pub fn cell_count(&self) -> usize {
        self.order.len()
    }

    pub fn boundary_cells(&self, direction: Direction) -> &[Cell] {
        &self.boundary[direction_index(direction)]
    }

    fn boundary_cells_mut(&mut self, direction: Direction) -> &mut Vec<Cell> {
        &mut self.boundary[direction_index(direction)]
    }

    fn next_id(&self) -> CellId {
        CellId(self.arena.len() as u32)
    }

    /// Inserts `cell` (spec §4.1 "Insert(c)"). `cell.id` is overwritten with
    /// the stable arena slot assigned here.
    pub fn insert(&mut self, mut cell: Cell) -> Result<CellId> {
        let footprint = cell.footprint.clone();
        let layer = cell.layer;

        for existing in self.iter_order() {
            if existing.layer == layer && geometry::overlaps(&existing.footprint, &footprint) {
                return Err(InMapError::Geometry(format!(
                    "inserted cell overlaps existing interior cell {:?} in layer {layer}",
                    existing.id
                )));
            }
        }

        let id = self.next_id();
        cell.id = id;
        self.arena.push(Some(cell));
        self.insert_into_order(id);
        let stored_footprint = self.get(id).expect("just inserted").footprint.clone();
        self.tree
            .insert(IndexedCell::new(id, layer, &stored_footprint));

        for direction in Direction::ALL {
            self.attach_reciprocal_references(id, direction)?;
        }

        self.link_ground_level(id)?;

        self.nlayers = self.nlayers.max(layer + 1);
        debug!(cell = id.0, layer, "inserted cell into mesh");
        Ok(id)
    }

    fn insert_into_order(&mut self, id: CellId) {
        let cell = self.get(id).expect("just inserted");
        let centroid = geometry::centroid(&cell.footprint);
        let (cx, cy) = centroid.map(|p| (p.x(), p.y())).unwrap_or((0.0, 0.0));
        let layer = cell.layer;

        let pos = self.order.partition_point(|other_id| {
            let other = self.get(*other_id).expect("order entries are live");
            let other_centroid = geometry::centroid(&other.footprint);
            let (ox, oy) = other_centroid.map(|p| (p.x(), p.y())).unwrap_or((0.0, 0.0));
            (other.layer, ox, oy) < (layer, cx, cy)
        });
        self.order.insert(pos, id);
    }

    /// For direction `d`, queries the index for cells in the adjacency box
    /// and attaches reciprocal `NeighborRef`s, creating a boundary cell if no
    /// hit is found (spec §4.1).
    fn attach_reciprocal_references(&mut self, id: CellId, direction: Direction) -> Result<()> {
        if matches!(direction, Direction::Above | Direction::Below) {
            return self.attach_vertical_reference(id, direction);
        }

        let owner = self.get(id).expect("inserted above").clone();
        let rect = bounding_rect(&owner.footprint);
        let offset = owner.dx.max(owner.dy) * ADJACENCY_EXPANSION_FRACTION;
        let search_rect = expand_rect(rect, offset);
        let aabb = rstar::AABB::from_corners(
            [search_rect.min().x, search_rect.min().y],
            [search_rect.max().x, search_rect.max().y],
        );

        let candidates: Vec<CellId> = self
            .tree
            .locate_in_envelope_intersecting(&aabb)
            .filter(|indexed| indexed.id != id && indexed.layer == owner.layer)
            .map(|indexed| indexed.id)
            .collect();

        let mut found_any = false;
        for candidate_id in candidates {
            let candidate = self.get(candidate_id).expect("candidate is live").clone();
            if !is_adjacent(&owner, &candidate, direction) {
                continue;
            }
            found_any = true;
            self.link_pair(id, candidate_id, direction)?;
        }

        if !found_any {
            self.install_boundary(id, direction)?;
        }

        Ok(())
    }

    fn attach_vertical_reference(&mut self, id: CellId, direction: Direction) -> Result<()> {
        let owner = self.get(id).expect("inserted above").clone();

        if direction == Direction::Below && owner.is_ground_layer() {
            // Reflective floor: the cell references itself downward.
            let reference = NeighborRef {
                target: NeighborTarget::Interior(id),
                cover_frac: 1.0,
                center_distance: owner.dz,
                diff: owner.kzz,
            };
            self.get_mut(id)
                .expect("owner is live")
                .neighbors_mut(Direction::Below)
                .push(reference);
            return Ok(());
        }

        let target_layer = match direction {
            Direction::Above => owner.layer + 1,
            Direction::Below => owner.layer.wrapping_sub(1),
            _ => unreachable!("vertical directions only"),
        };

        let candidates: Vec<CellId> = self
            .iter_order()
            .filter(|c| {
                c.layer == target_layer && geometry::overlaps(&c.footprint, &owner.footprint)
            })
            .map(|c| c.id)
            .collect();

        if candidates.is_empty() {
            self.install_boundary(id, direction)?;
        } else {
            for candidate_id in candidates {
                self.link_pair(id, candidate_id, direction)?;
            }
        }
        Ok(())
    }

    /// Attaches reciprocal `a[direction] -> b` and `b[opposite] -> a`
    /// references, computing `coverFrac`, `centerDistance`, and `diff`.
    fn link_pair(&mut self, a_id: CellId, b_id: CellId, direction: Direction) -> Result<()> {
        let a = self.get(a_id).expect("live").clone();
        let b = self.get(b_id).expect("live").clone();

        let overlap_len = face_overlap_length(&a, &b, direction);
        if overlap_len <= 0.0 {
            return Ok(());
        }
        let a_face_len = face_length(&a, direction);
        let cover_frac_a = (overlap_len / a_face_len).clamp(0.0, 1.0);
        let cover_frac_b = (overlap_len / face_length(&b, direction.opposite())).clamp(0.0, 1.0);

        let center_distance = cell_center_distance(&a, &b, direction);
        let diff = harmonic_mean(a.diffusivity(direction), b.diffusivity(direction));

        let a_ref = NeighborRef {
            target: NeighborTarget::Interior(b_id),
            cover_frac: cover_frac_a,
            center_distance,
            diff,
        };
        let b_ref = NeighborRef {
            target: NeighborTarget::Interior(a_id),
            cover_frac: cover_frac_b,
            center_distance,
            diff,
        };

        // A stale boundary reference on either side of this face is now
        // superseded by a real interior neighbor (spec §4.1: "If an
        // adjacent cell previously had a boundary reference that is now
        // superseded by c, remove that boundary"). The per-side boundary
        // cell itself stays put (slots are stable, like arena `CellId`s);
        // only the now-wrong reference into it is dropped.
        self.drop_boundary_ref(a_id, direction);
        self.drop_boundary_ref(b_id, direction.opposite());

        self.get_mut(a_id)
            .expect("live")
            .neighbors_mut(direction)
            .push(a_ref);
        self.get_mut(b_id)
            .expect("live")
            .neighbors_mut(direction.opposite())
            .push(b_ref);
        Ok(())
    }

    fn drop_boundary_ref(&mut self, id: CellId, direction: Direction) {
        if let Some(cell) = self.get_mut(id) {
            cell.neighbors_mut(direction)
                .retain(|r| !matches!(r.target, NeighborTarget::Boundary { .. }));
        }
    }

    fn install_boundary(&mut self, owner_id: CellId, direction: Direction) -> Result<()> {
        let owner = self.get(owner_id).expect("live").clone();
        let extent = match direction {
            Direction::West | Direction::East => owner.dx,
            Direction::South | Direction::North => owner.dy,
            Direction::Above | Direction::Below => owner.dz,
        };

        let mut boundary_cell = owner.clone();
        boundary_cell.boundary = true;
        boundary_cell.west.clear();
        boundary_cell.east.clear();
        boundary_cell.south.clear();
        boundary_cell.north.clear();
        boundary_cell.above.clear();
        boundary_cell.below.clear();
        boundary_cell.ground_level.clear();

        let slot = self.boundary_cells(direction).len() as u32;
        let diff = owner.diffusivity(direction);

        let reference = NeighborRef {
            target: NeighborTarget::Boundary { direction, slot },
            cover_frac: 1.0,
            center_distance: extent,
            diff,
        };
        self.get_mut(owner_id)
            .expect("live")
            .neighbors_mut(direction)
            .push(reference);
        self.boundary_cells_mut(direction).push(boundary_cell);
        Ok(())
    }

    /// Connects `id.groundLevel` to overlapping ground cells, and registers
    /// `id` as a ground-level contributor to overlapping elevated cells when
    /// `id` itself is ground-level (spec §4.1, final sentence).
    fn link_ground_level(&mut self, id: CellId) -> Result<()> {
        let owner = self.get(id).expect("live").clone();

        if owner.layer > 0 {
            let ground_ids: Vec<CellId> = self
                .iter_order()
                .filter(|c| c.layer == 0 && geometry::overlaps(&c.footprint, &owner.footprint))
                .map(|c| c.id)
                .collect();
            let cell = self.get_mut(id).expect("live");
            for gid in ground_ids {
                cell.ground_level.push(gid);
            }
        } else {
            let elevated_ids: Vec<CellId> = self
                .iter_order()
                .filter(|c| c.layer > 0 && geometry::overlaps(&c.footprint, &owner.footprint))
                .map(|c| c.id)
                .collect();
            for eid in elevated_ids {
                if let Some(elevated) = self.get_mut(eid) {
                    elevated.ground_level.push(id);
                }
            }
        }
        Ok(())
    }

    /// Removes `id` and its neighbor references (spec §4.1 "Delete(c)").
    pub fn delete(&mut self, id: CellId) -> Result<Cell> {
        let cell = self.get(id).cloned().ok_or_else(|| {
            InMapError::Geometry(format!("delete of nonexistent cell {:?}", id))
        })?;

        for direction in Direction::ALL {
            let targets: Vec<NeighborTarget> =
                cell.neighbors(direction).iter().map(|r| r.target).collect();
            for target in targets {
                if let NeighborTarget::Interior(neighbor_id) = target {
                    if neighbor_id == id {
                        continue; // reflective self-reference
                    }
                    let opposite = direction.opposite();
                    if let Some(neighbor) = self.get_mut(neighbor_id) {
                        neighbor
                            .neighbors_mut(opposite)
                            .retain(|r| r.target != NeighborTarget::Interior(id));
                        let now_empty = neighbor.neighbors(opposite).is_empty();
                        if now_empty {
                            self.install_boundary(neighbor_id, opposite)?;
                        }
                    }
                }
            }
        }

        if cell.layer == 0 {
            for above_id in cell.ground_level.clone() {
                // ground_level on a ground cell is unused; guard defensively.
                let _ = above_id;
            }
            let elevated_ids: Vec<CellId> = self
                .iter_order()
                .filter(|c| c.id != id && c.ground_level.contains(&id))
                .map(|c| c.id)
                .collect();
            for eid in elevated_ids {
                if let Some(elevated) = self.get_mut(eid) {
                    elevated.ground_level.retain(|g| *g != id);
                }
            }
        }

        let indexed = IndexedCell::new(id, cell.layer, &cell.footprint);
        self.tree.remove(&indexed);
        self.order.retain(|o| *o != id);
        self.arena[id.index()] = None;
        Ok(cell)
    }

    // --- invariant checks (spec §8) ---

    /// Mesh invariant 4: canonical order and no duplicate centroids per
    /// layer.
    pub fn check_canonical_order(&self) -> Result<()> {
        let mut seen: FxHashMap<u32, Vec<(f64, f64)>> = FxHashMap::default();
        let mut prev_key: Option<(u32, f64, f64)> = None;
        for cell in self.iter_order() {
            let centroid = geometry::centroid(&cell.footprint).ok_or_else(|| {
                InMapError::Geometry(format!("cell {:?} has no centroid", cell.id))
            })?;
            let key = (cell.layer, centroid.x(), centroid.y());
            if let Some(prev) = prev_key {
                if key < prev {
                    return Err(InMapError::Geometry(
                        "cell list violates canonical ordering".to_string(),
                    ));
                }
            }
            prev_key = Some(key);

            let layer_entries = seen.entry(cell.layer).or_default();
            for (ex, ey) in layer_entries.iter() {
                if (*ex - centroid.x()).abs() < 1e-9 && (*ey - centroid.y()).abs() < 1e-9 {
                    return Err(InMapError::Geometry(format!(
                        "duplicate centroid in layer {}",
                        cell.layer
                    )));
                }
            }
            layer_entries.push((centroid.x(), centroid.y()));
        }
        Ok(())
    }

    /// Mesh invariant 3: per-direction cover fractions sum to 1.
    pub fn check_cover_frac_closure(&self, tolerance: f64) -> Result<()> {
        for cell in self.iter_order() {
            for direction in Direction::ALL {
                if cell.neighbors(direction).is_empty() {
                    continue;
                }
                let sum = cell.cover_frac_sum(direction);
                if (sum - 1.0).abs() > tolerance {
                    return Err(InMapError::Geometry(format!(
                        "cell {:?} direction {:?} coverFrac sums to {sum}, expected 1",
                        cell.id, direction
                    )));
                }
            }
        }
        Ok(())
    }

    /// Mesh invariant 6: `nlayers` equals 1 + max(layer) over live cells.
    pub fn check_nlayers(&self) -> Result<()> {
        let max_layer = self.iter_order().map(|c| c.layer).max();
        match max_layer {
            None => Ok(()),
            Some(max) if self.nlayers == max + 1 => Ok(()),
            Some(max) => Err(InMapError::Geometry(format!(
                "nlayers {} does not match 1 + max layer {}",
                self.nlayers, max
            ))),
        }
    }

    /// Adds `delta` to the `Cf` of the boundary pseudo-cell at
    /// `(direction, slot)`. Boundary cells are accumulator-only during an
    /// operator pass (spec §5): each is written by exactly one interior
    /// cell per pass, so this never races across the parallel compute phase
    /// that precedes the serial commit in `physics::run_pass`.
    pub fn add_to_boundary_cf(&mut self, direction: Direction, slot: u32, delta: &crate::species::Concentrations) {
        if let Some(cell) = self.boundary_cells_mut(direction).get_mut(slot as usize) {
            for i in 0..crate::species::NUM_SPECIES {
                cell.cf[i] += delta[i];
            }
        }
    }

    /// Total mass across interior and boundary cells for one species slot,
    /// `Σ Cf[species] · Volume` (spec §8 scenario 1 "mass-conservation
    /// frame").
    pub fn total_mass(&self, species: crate::species::Species) -> f64 {
        let idx = species.index();
        let interior: f64 = self.iter_order().map(|c| c.cf[idx] * c.volume()).sum();
        let boundary: f64 = Direction::ALL
            .iter()
            .flat_map(|d| self.boundary_cells(*d).iter())
            .map(|c| c.cf[idx] * c.volume())
            .sum();
        interior + boundary
    }
}

fn face_length(cell: &Cell, direction: Direction) -> f64 {
    match direction {
        Direction::West | Direction::East => cell.dy,
        Direction::South | Direction::North => cell.dx,
        Direction::Above | Direction::Below => {
            let rect = bounding_rect(&cell.footprint);
            (rect.width() * rect.height()).sqrt().max(cell.dx.min(cell.dy))
        }
    }
}

fn is_adjacent(owner: &Cell, candidate: &Cell, direction: Direction) -> bool {
    face_overlap_length(owner, candidate, direction) > 0.0
}

/// Length of the shared edge between two horizontally-adjacent footprints'
/// bounding boxes, used both to test adjacency and to weight `coverFrac`.
fn face_overlap_length(owner: &Cell, neighbor: &Cell, direction: Direction) -> f64 {
    let a = bounding_rect(&owner.footprint);
    let b = bounding_rect(&neighbor.footprint);
    let eps = (owner.dx.max(owner.dy)) * 1e-3;

    match direction {
        Direction::West => {
            if (a.min().x - b.max().x).abs() > eps {
                return 0.0;
            }
            overlap_1d(a.min().y, a.max().y, b.min().y, b.max().y)
        }
        Direction::East => {
            if (a.max().x - b.min().x).abs() > eps {
                return 0.0;
            }
            overlap_1d(a.min().y, a.max().y, b.min().y, b.max().y)
        }
        Direction::South => {
            if (a.min().y - b.max().y).abs() > eps {
                return 0.0;
            }
            overlap_1d(a.min().x, a.max().x, b.min().x, b.max().x)
        }
        Direction::North => {
            if (a.max().y - b.min().y).abs() > eps {
                return 0.0;
            }
            overlap_1d(a.min().x, a.max().x, b.min().x, b.max().x)
        }
        Direction::Above | Direction::Below => geometry::intersection_area(&owner.footprint, &neighbor.footprint).sqrt(),
    }
}

fn overlap_1d(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> f64 {
    (a_max.min(b_max) - a_min.max(b_min)).max(0.0)
}

fn cell_center_distance(a: &Cell, b: &Cell, direction: Direction) -> f64 {
    match direction {
        Direction::Above | Direction::Below => (a.layer_height - b.layer_height).abs().max(0.5 * (a.dz + b.dz)),
        _ => {
            let ca = geometry::centroid(&a.footprint);
            let cb = geometry::centroid(&b.footprint);
            match (ca, cb) {
                (Some(ca), Some(cb)) => {
                    let dx = ca.x() - cb.x();
                    let dy = ca.y() - cb.y();
                    (dx * dx + dy * dy).sqrt()
                }
                _ => 0.5 * (a.dx + b.dx),
            }
        }
    }
}

fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a <= 0.0 || b <= 0.0 {
        warn!("non-positive diffusivity encountered in harmonic mean");
        return 0.0;
    }
    2.0 * a * b / (a + b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::blank_cell;
    use crate::geometry::rect_footprint;

    fn flat_cell(x0: f64, y0: f64, dx: f64, dy: f64) -> Cell {
        let mut cell = blank_cell(CellId(0), rect_footprint(x0, y0, dx, dy), dx, dy, 100.0, 0);
        cell.kxxyy = 5.0;
        cell.kzz = 1.0;
        cell
    }

    #[test]
    fn insert_two_adjacent_cells_links_reciprocally() {
        let mut mesh = Mesh::new();
        let west = flat_cell(0.0, 0.0, 10.0, 10.0);
        let east = flat_cell(10.0, 0.0, 10.0, 10.0);

        let west_id = mesh.insert(west).unwrap();
        let east_id = mesh.insert(east).unwrap();

        let west_cell = mesh.get(west_id).unwrap();
        assert!(!west_cell.east.is_empty());
        let east_cell = mesh.get(east_id).unwrap();
        assert!(!east_cell.west.is_empty());
    }

    #[test]
    fn insert_supersedes_stale_boundary_reference() {
        // `west` alone gets a boundary ref on its east face; inserting
        // `east` next to it must drop that stale ref rather than leaving
        // both it and the new interior ref in the same list (mesh
        // invariant 3: coverFrac sums to 1, not 2).
        let mut mesh = Mesh::new();
        let west_id = mesh.insert(flat_cell(0.0, 0.0, 10.0, 10.0)).unwrap();
        assert!(matches!(
            mesh.get(west_id).unwrap().east[0].target,
            NeighborTarget::Boundary { .. }
        ));

        mesh.insert(flat_cell(10.0, 0.0, 10.0, 10.0)).unwrap();

        let west_cell = mesh.get(west_id).unwrap();
        assert_eq!(west_cell.east.len(), 1);
        assert!(matches!(west_cell.east[0].target, NeighborTarget::Interior(_)));
        assert!((west_cell.cover_frac_sum(Direction::East) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_cell_gets_boundary_on_every_open_side() {
        let mut mesh = Mesh::new();
        let cell = flat_cell(0.0, 0.0, 10.0, 10.0);
        let id = mesh.insert(cell).unwrap();
        let cell = mesh.get(id).unwrap();
        assert!(!cell.west.is_empty());
        assert!(!cell.east.is_empty());
        assert!(!cell.south.is_empty());
        assert!(!cell.north.is_empty());
        assert!(!cell.below.is_empty(), "reflective floor self-reference");
        assert!(mesh.check_canonical_order().is_ok());
    }

    #[test]
    fn overlapping_insert_is_rejected() {
        let mut mesh = Mesh::new();
        mesh.insert(flat_cell(0.0, 0.0, 10.0, 10.0)).unwrap();
        let result = mesh.insert(flat_cell(5.0, 5.0, 10.0, 10.0));
        assert!(result.is_err());
    }

    #[test]
    fn delete_removes_cell_and_its_references() {
        let mut mesh = Mesh::new();
        let west_id = mesh.insert(flat_cell(0.0, 0.0, 10.0, 10.0)).unwrap();
        let east_id = mesh.insert(flat_cell(10.0, 0.0, 10.0, 10.0)).unwrap();

        mesh.delete(west_id).unwrap();
        assert!(mesh.get(west_id).is_none());
        let east_cell = mesh.get(east_id).unwrap();
        assert!(east_cell
            .west
            .iter()
            .all(|r| r.target != NeighborTarget::Interior(west_id)));
    }
}
