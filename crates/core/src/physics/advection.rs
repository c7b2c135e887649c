//! Upwind advection (spec §4.7 "Upwind advection").

use super::{boundary_target, empty_delta, DeltaBatch, DeltaTarget};
use crate::cell::{Cell, CellId, Direction, NeighborTarget};
use crate::mesh::Mesh;
use crate::species::NUM_SPECIES;

/// Mean wind component along the axis relevant to `direction`.
fn mean_wind(cell: &Cell, direction: Direction) -> f64 {
    match direction {
        Direction::West | Direction::East => cell.u_avg,
        Direction::South | Direction::North => cell.v_avg,
        Direction::Above | Direction::Below => cell.w_avg,
    }
}

/// Applies upwind advection for one cell across all six directions,
/// returning the interior delta plus any boundary-escape deltas.
pub fn advect_cell(mesh: &Mesh, id: CellId, dt: f64) -> DeltaBatch {
    let cell = match mesh.get(id) {
        Some(c) => c,
        None => return Vec::new(),
    };
    let mut own_delta = empty_delta();
    let mut batch = DeltaBatch::new();

    for direction in Direction::ALL {
        let wind = mean_wind(cell, direction);
        // Outward-facing wind on this face carries mass out of the cell;
        // inward-facing wind on this face brings in the neighbor's donor
        // concentration. The sign convention below treats `wind > 0` as
        // flow toward East/North/Above.
        let outward = match direction {
            Direction::West | Direction::South | Direction::Below => wind < 0.0,
            Direction::East | Direction::North | Direction::Above => wind > 0.0,
        };

        let axis_extent = match direction {
            Direction::West | Direction::East => cell.dx,
            Direction::South | Direction::North => cell.dy,
            Direction::Above | Direction::Below => cell.dz,
        };

        for reference in cell.neighbors(direction) {
            let dz_ratio = if direction.is_low_side_horizontal() {
                neighbor_dz(mesh, reference.target).unwrap_or(cell.dz) / cell.dz
            } else {
                1.0
            };

            for species_idx in 0..NUM_SPECIES {
                let donor_conc = if outward {
                    cell.ci[species_idx]
                } else {
                    match neighbor_ci(mesh, reference.target) {
                        Some(ci) => ci[species_idx],
                        None => continue,
                    }
                };

                let magnitude =
                    wind.abs() * donor_conc * reference.cover_frac * dz_ratio * dt / axis_extent;
                if outward {
                    own_delta[species_idx] -= magnitude;
                    if let Some(target) = boundary_target(reference.target) {
                        if matches!(target, DeltaTarget::Boundary { .. }) {
                            let mut boundary_delta = empty_delta();
                            boundary_delta[species_idx] += magnitude;
                            batch.push((target, boundary_delta));
                        }
                    }
                } else {
                    own_delta[species_idx] += magnitude;
                }
            }
        }
    }

    batch.push((DeltaTarget::Interior(id), own_delta));
    batch
}

fn neighbor_ci(mesh: &Mesh, target: NeighborTarget) -> Option<crate::species::Concentrations> {
    match target {
        NeighborTarget::Interior(id) => mesh.get(id).map(|c| c.ci),
        NeighborTarget::Boundary { .. } => None,
    }
}

fn neighbor_dz(mesh: &Mesh, target: NeighborTarget) -> Option<f64> {
    match target {
        NeighborTarget::Interior(id) => mesh.get(id).map(|c| c.dz),
        NeighborTarget::Boundary { .. } => None,
    }
}
