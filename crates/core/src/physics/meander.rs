//! Meander mixing: identical structure to horizontal eddy mixing but driven
//! by the U/V deviation fields instead of Kxxyy (spec §4.7 "Meander
//! mixing").

use super::{boundary_target, empty_delta, DeltaBatch, DeltaTarget};
use crate::cell::{Cell, CellId, Direction, NeighborTarget};
use crate::mesh::Mesh;
use crate::species::NUM_SPECIES;

fn deviation_diffusivity(cell: &Cell, direction: Direction) -> f64 {
    match direction {
        Direction::West | Direction::East => cell.u_deviation,
        _ => cell.v_deviation,
    }
}

/// Applies meander mixing for one cell across its four horizontal
/// directions, using `U`/`V` deviation amplitudes as the "diffusivity" in
/// place of `Kxxyy`.
pub fn meander_cell(mesh: &Mesh, id: CellId, dt: f64) -> DeltaBatch {
    let cell = match mesh.get(id) {
        Some(c) => c,
        None => return Vec::new(),
    };
    let mut own_delta = empty_delta();
    let mut batch = DeltaBatch::new();

    for direction in [Direction::West, Direction::East, Direction::South, Direction::North] {
        let axis_extent = match direction {
            Direction::West | Direction::East => cell.dx,
            _ => cell.dy,
        };
        let deviation = deviation_diffusivity(cell, direction);

        for reference in cell.neighbors(direction) {
            let neighbor_ci_and_dz = match reference.target {
                NeighborTarget::Interior(neighbor_id) => {
                    mesh.get(neighbor_id).map(|n| (n.ci, n.dz))
                }
                NeighborTarget::Boundary { .. } => None,
            };
            let neighbor_ci = neighbor_ci_and_dz.map(|(ci, _)| ci).unwrap_or(cell.ci);
            let neighbor_dz = neighbor_ci_and_dz.map(|(_, dz)| dz).unwrap_or(cell.dz);

            for species_idx in 0..NUM_SPECIES {
                let flux = deviation * (neighbor_ci[species_idx] - cell.ci[species_idx])
                    / reference.center_distance
                    * reference.cover_frac
                    * dt
                    / axis_extent;
                let scaled = if direction.is_low_side_horizontal() {
                    flux * neighbor_dz / cell.dz
                } else {
                    flux
                };
                own_delta[species_idx] += scaled;

                if let Some(target) = boundary_target(reference.target) {
                    let mut boundary_delta = empty_delta();
                    boundary_delta[species_idx] -= scaled;
                    batch.push((target, boundary_delta));
                }
            }
        }
    }

    batch.push((DeltaTarget::Interior(id), own_delta));
    batch
}
