//! Vertical convective/eddy mixing and horizontal eddy mixing (spec §4.7
//! "Vertical & horizontal mixing").

use super::{boundary_target, empty_delta, DeltaBatch, DeltaTarget};
use crate::cell::{CellId, Direction, NeighborTarget};
use crate::mesh::Mesh;
use crate::species::NUM_SPECIES;

/// Applies vertical convective/eddy mixing (upward convection from ground
/// cells, downward convection + eddy mixing with above-neighbors, eddy
/// mixing with below-neighbors) and horizontal eddy mixing for one cell.
pub fn mix_cell(mesh: &Mesh, id: CellId, dt: f64) -> DeltaBatch {
    let cell = match mesh.get(id) {
        Some(c) => c,
        None => return Vec::new(),
    };
    let mut own_delta = empty_delta();
    let mut batch = DeltaBatch::new();

    // Upward convection: Cf += M2u * sum_ground(Ci_ground * coverFrac) * dt
    if !cell.ground_level.is_empty() {
        for species_idx in 0..NUM_SPECIES {
            let mut acc = 0.0;
            for ground_id in cell.ground_level.iter() {
                if let Some(ground) = mesh.get(*ground_id) {
                    // Ground cells don't carry a coverFrac toward an
                    // elevated cell directly; approximate with an equal
                    // share across the ground-level contributors, matching
                    // the area-weighted inheritance used when they were
                    // linked (mesh::link_ground_level).
                    let weight = 1.0 / cell.ground_level.len() as f64;
                    acc += ground.ci[species_idx] * weight;
                }
            }
            own_delta[species_idx] += cell.m2u * acc * dt;
        }
    }

    // Downward convection + eddy mixing with above-neighbors.
    for reference in cell.above.iter() {
        if let NeighborTarget::Interior(above_id) = reference.target {
            if let Some(above) = mesh.get(above_id) {
                for species_idx in 0..NUM_SPECIES {
                    let convective = above.m2d * above.ci[species_idx] * above.dz / cell.dz
                        - cell.m2d * cell.ci[species_idx];
                    let eddy = reference.diff * (above.ci[species_idx] - cell.ci[species_idx])
                        / reference.center_distance
                        / cell.dz;
                    own_delta[species_idx] += (convective + eddy) * reference.cover_frac * dt;
                }
            }
        }
    }

    // Eddy mixing with below-neighbors (no convective term); the reflective
    // floor's self-reference at layer 0 yields a zero-gradient no-op.
    for reference in cell.below.iter() {
        if let NeighborTarget::Interior(below_id) = reference.target {
            if below_id == id {
                continue;
            }
            if let Some(below) = mesh.get(below_id) {
                for species_idx in 0..NUM_SPECIES {
                    let eddy = reference.diff * (below.ci[species_idx] - cell.ci[species_idx])
                        / reference.center_distance
                        / cell.dz;
                    own_delta[species_idx] += eddy * reference.cover_frac * dt;
                }
            }
        }
    }

    // Horizontal eddy mixing.
    for direction in [Direction::West, Direction::East, Direction::South, Direction::North] {
        let axis_extent = match direction {
            Direction::West | Direction::East => cell.dx,
            _ => cell.dy,
        };
        for reference in cell.neighbors(direction) {
            let neighbor_ci_and_dz = match reference.target {
                NeighborTarget::Interior(neighbor_id) => {
                    mesh.get(neighbor_id).map(|n| (n.ci, n.dz))
                }
                NeighborTarget::Boundary { .. } => None,
            };

            let neighbor_ci = match neighbor_ci_and_dz {
                Some((ci, _)) => ci,
                None => cell.ci, // zero-gradient at boundary (spec: "zero source on inflow")
            };
            let neighbor_dz = neighbor_ci_and_dz.map(|(_, dz)| dz).unwrap_or(cell.dz);

            for species_idx in 0..NUM_SPECIES {
                let flux = reference.diff * (neighbor_ci[species_idx] - cell.ci[species_idx])
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
                    // Zero-gradient assumption at the boundary means `scaled`
                    // is 0 here, but the escaping-mass bookkeeping mirrors
                    // advection's boundary write for symmetry if a future
                    // boundary model supplies a nonzero gradient.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::blank_cell;
    use crate::geometry::rect_footprint;

    #[test]
    fn no_neighbors_yields_zero_mixing_delta() {
        let mut mesh = Mesh::new();
        let cell = blank_cell(CellId(0), rect_footprint(0.0, 0.0, 10.0, 10.0), 10.0, 10.0, 100.0, 0);
        let id = mesh.insert(cell).unwrap();
        let batch = mix_cell(&mesh, id, 1.0);
        let (_, delta) = batch
            .iter()
            .find(|(t, _)| matches!(t, DeltaTarget::Interior(i) if *i == id))
            .unwrap();
        for value in delta.iter() {
            assert_eq!(*value, 0.0);
        }
    }
}
