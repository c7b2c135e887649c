//! A single grid volume and its neighbor bookkeeping (spec §3 "Cell",
//! "NeighborRef").
//!
//! Grounded on spec §9's explicit arena guidance ("represent cells in an
//! arena ... reference them by stable index, not by pointer") generalising
//! the teacher's own habit of indexing cells directly in a `Vec` rather than
//! sharing them behind `Rc`/pointers (`grid/simulation_grid.rs`).

use crate::geometry::Footprint;
use crate::species::{zero_concentrations, Concentrations};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Stable index into a `Mesh`'s cell arena. Indices are never reused after a
/// cell is removed (tombstoned), so a stale `CellId` can always be detected
/// rather than silently aliasing a new cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub u32);

impl CellId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One of the six neighbor directions a cell tracks references in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    West,
    East,
    South,
    North,
    Above,
    Below,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::West,
        Direction::East,
        Direction::South,
        Direction::North,
        Direction::Above,
        Direction::Below,
    ];

    /// The direction a reciprocal reference is filed under on the other end
    /// of the edge.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::West => Direction::East,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::North => Direction::South,
            Direction::Above => Direction::Below,
            Direction::Below => Direction::Above,
        }
    }

    /// West/South faces need the `Dz` ratio correction described in spec §4.7
    /// ("add `flux · Dz_n/Dz` (west/south) or `flux` (east/north)"); the
    /// vertical directions never take this branch.
    pub fn is_low_side_horizontal(self) -> bool {
        matches!(self, Direction::West | Direction::South)
    }
}

/// Which cell a `NeighborRef` points at: either a live interior cell in the
/// arena, or one of the per-side boundary pseudo-cells (which are never
/// arena-indexed — spec §9 "keep them in separate per-side lists").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeighborTarget {
    Interior(CellId),
    Boundary { direction: Direction, slot: u32 },
}

/// Per-edge metadata for one directed reference from a cell to a neighbor
/// (spec §3 "NeighborRef").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NeighborRef {
    pub target: NeighborTarget,
    /// Fraction of the owner's face covered by this neighbor; within one
    /// direction's collection these sum to 1.
    pub cover_frac: f64,
    /// Distance between cell centers across the face, in meters.
    pub center_distance: f64,
    /// Harmonic mean of the two cells' diffusivities along the relevant axis.
    pub diff: f64,
}

/// Per-direction collection of neighbor references. Most faces have a
/// handful of covering neighbors, so a `SmallVec` avoids heap churn for the
/// common case.
pub type NeighborList = SmallVec<[NeighborRef; 4]>;

/// Population counts broken out by demographic group, and mortality rates
/// broken out by the groups the driver tracks (spec §3, §4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Demographics {
    pub population: Vec<f64>,
    pub mortality_rate: Vec<f64>,
    pub above_density_threshold: bool,
}

/// One grid volume: an axis-aligned rectangular prism carrying meteorology,
/// chemistry rates, concentrations, and neighbor topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,

    // --- geometry ---
    pub footprint: Footprint,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub layer: u32,
    pub layer_height: f64,
    /// Path of (i, j) nest indices from the outermost nest to this cell.
    pub nest_index: Vec<(u32, u32)>,

    // --- meteorology ---
    pub u_avg: f64,
    pub v_avg: f64,
    pub w_avg: f64,
    pub u_deviation: f64,
    pub v_deviation: f64,
    pub kxxyy: f64,
    pub kzz: f64,
    pub m2u: f64,
    pub m2d: f64,
    pub temperature: f64,
    pub wind_speed: f64,
    pub wind_speed_inverse: f64,
    pub wind_speed_minus_third: f64,
    pub wind_speed_minus_one_point_four: f64,
    pub s1: f64,
    pub s_class: f64,

    // --- chemistry rates / partitioning fractions, from CTM ---
    pub a_org_partitioning: f64,
    pub b_org_partitioning: f64,
    pub nh_partitioning: f64,
    pub no_partitioning: f64,
    pub s_partitioning: f64,
    pub so2_oxidation: f64,

    // --- deposition velocities / rates, from CTM ---
    pub particle_dry_dep: f64,
    pub nh3_dry_dep: f64,
    pub so2_dry_dep: f64,
    pub voc_dry_dep: f64,
    pub nox_dry_dep: f64,
    pub particle_wet_dep: f64,
    pub so2_wet_dep: f64,
    pub other_gas_wet_dep: f64,

    // --- concentrations ---
    pub ci: Concentrations,
    pub cf: Concentrations,
    pub emis_flux: Concentrations,
    pub c_baseline: Concentrations,

    // --- demographics ---
    pub demographics: Demographics,

    /// Distinguishes interior cells from the six per-side pseudo-cells that
    /// close the domain.
    pub boundary: bool,

    // --- neighbor topology ---
    pub west: NeighborList,
    pub east: NeighborList,
    pub south: NeighborList,
    pub north: NeighborList,
    pub above: NeighborList,
    pub below: NeighborList,
    /// For an elevated cell, the ground-level cells directly beneath it
    /// (multiple if this cell spans several smaller ground cells).
    pub ground_level: SmallVec<[CellId; 4]>,
}

impl Cell {
    /// Volume of the cell's prism, in cubic meters. Routed through the
    /// `Meters`/`SquareMeters`/`CubicMeters` newtypes so a future caller
    /// can't accidentally multiply an area by a volume instead of a length.
    #[inline]
    pub fn volume(&self) -> f64 {
        use crate::units::Meters;
        (Meters(self.dx) * Meters(self.dy) * Meters(self.dz)).value()
    }

    #[inline]
    pub fn is_ground_layer(&self) -> bool {
        self.layer == 0
    }

    /// The neighbor collection for one direction.
    pub fn neighbors(&self, direction: Direction) -> &NeighborList {
        match direction {
            Direction::West => &self.west,
            Direction::East => &self.east,
            Direction::South => &self.south,
            Direction::North => &self.north,
            Direction::Above => &self.above,
            Direction::Below => &self.below,
        }
    }

    pub fn neighbors_mut(&mut self, direction: Direction) -> &mut NeighborList {
        match direction {
            Direction::West => &mut self.west,
            Direction::East => &mut self.east,
            Direction::South => &mut self.south,
            Direction::North => &mut self.north,
            Direction::Above => &mut self.above,
            Direction::Below => &mut self.below,
        }
    }

    /// Sum of `coverFrac` across one direction's collection; mesh invariant
    /// 3 requires this to equal 1 within floating-point tolerance.
    pub fn cover_frac_sum(&self, direction: Direction) -> f64 {
        self.neighbors(direction).iter().map(|r| r.cover_frac).sum()
    }

    /// Total population summed across demographic groups.
    pub fn total_population(&self) -> f64 {
        self.demographics.population.iter().sum()
    }

    /// Diffusivity along the axis relevant to `direction`: horizontal
    /// directions use `kxxyy`, vertical ones use `kzz`.
    pub fn diffusivity(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Above | Direction::Below => self.kzz,
            _ => self.kxxyy,
        }
    }
}

/// Builds a bare interior cell at the origin with zeroed fields, meant to be
/// filled in by the grid builder or a split operation rather than used
/// directly.
pub fn blank_cell(id: CellId, footprint: Footprint, dx: f64, dy: f64, dz: f64, layer: u32) -> Cell {
    Cell {
        id,
        footprint,
        dx,
        dy,
        dz,
        layer,
        layer_height: 0.0,
        nest_index: Vec::new(),
        u_avg: 0.0,
        v_avg: 0.0,
        w_avg: 0.0,
        u_deviation: 0.0,
        v_deviation: 0.0,
        kxxyy: 0.0,
        kzz: 0.0,
        m2u: 0.0,
        m2d: 0.0,
        temperature: 0.0,
        wind_speed: 0.0,
        wind_speed_inverse: 0.0,
        wind_speed_minus_third: 0.0,
        wind_speed_minus_one_point_four: 0.0,
        s1: 0.0,
        s_class: 0.0,
        a_org_partitioning: 0.0,
        b_org_partitioning: 0.0,
        nh_partitioning: 0.0,
        no_partitioning: 0.0,
        s_partitioning: 0.0,
        so2_oxidation: 0.0,
        particle_dry_dep: 0.0,
        nh3_dry_dep: 0.0,
        so2_dry_dep: 0.0,
        voc_dry_dep: 0.0,
        nox_dry_dep: 0.0,
        particle_wet_dep: 0.0,
        so2_wet_dep: 0.0,
        other_gas_wet_dep: 0.0,
        ci: zero_concentrations(),
        cf: zero_concentrations(),
        emis_flux: zero_concentrations(),
        c_baseline: zero_concentrations(),
        demographics: Demographics::default(),
        boundary: false,
        west: SmallVec::new(),
        east: SmallVec::new(),
        south: SmallVec::new(),
        north: SmallVec::new(),
        above: SmallVec::new(),
        below: SmallVec::new(),
        ground_level: SmallVec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect_footprint;

    #[test]
    fn volume_is_extent_product() {
        let cell = blank_cell(CellId(0), rect_footprint(0.0, 0.0, 2.0, 3.0), 2.0, 3.0, 4.0, 0);
        assert!((cell.volume() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn opposite_direction_round_trips() {
        for d in Direction::ALL {
            assert_eq!(d.opposite().opposite(), d);
        }
    }

    #[test]
    fn cover_frac_sum_of_empty_collection_is_zero() {
        let cell = blank_cell(CellId(0), rect_footprint(0.0, 0.0, 1.0, 1.0), 1.0, 1.0, 1.0, 0);
        assert_eq!(cell.cover_frac_sum(Direction::West), 0.0);
    }
}
