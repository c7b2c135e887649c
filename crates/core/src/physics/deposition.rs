//! Dry and wet deposition (spec §4.7 "Dry deposition", "Wet deposition").

use crate::cell::{Cell, CellId};
use crate::mesh::Mesh;
use crate::species::Species;

fn dry_deposition_velocity(cell: &Cell, species: Species) -> f64 {
    if species.is_particle() {
        return cell.particle_dry_dep;
    }
    match species {
        Species::GNh => cell.nh3_dry_dep,
        Species::GS => cell.so2_dry_dep,
        Species::GNo => cell.nox_dry_dep,
        Species::GOrg => cell.voc_dry_dep,
        _ => unreachable!("gas-phase species are exhaustively matched above"),
    }
}

fn wet_deposition_rate(cell: &Cell, species: Species) -> f64 {
    if species.is_particle() {
        return cell.particle_wet_dep;
    }
    match species {
        Species::GS => cell.so2_wet_dep,
        _ => cell.other_gas_wet_dep,
    }
}

/// Dry deposition, applied only at `Layer == 0`: subtracts
/// `Ci · v_dep · Δt / Dz` for every species.
pub fn apply_dry_deposition(mesh: &mut Mesh, id: CellId, dt: f64) {
    let cell = match mesh.get_mut(id) {
        Some(c) => c,
        None => return,
    };
    if !cell.is_ground_layer() {
        return;
    }
    for species in Species::ALL {
        let idx = species.index();
        let v_dep = dry_deposition_velocity(cell, species);
        cell.cf[idx] -= cell.ci[idx] * v_dep * dt / cell.dz;
    }
}

/// Wet deposition, applied at all layers: subtracts `Ci · k_wet · Δt` for
/// every species.
pub fn apply_wet_deposition(mesh: &mut Mesh, id: CellId, dt: f64) {
    let cell = match mesh.get_mut(id) {
        Some(c) => c,
        None => return,
    };
    for species in Species::ALL {
        let idx = species.index();
        let k_wet = wet_deposition_rate(cell, species);
        cell.cf[idx] -= cell.ci[idx] * k_wet * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::blank_cell;
    use crate::geometry::rect_footprint;

    #[test]
    fn dry_deposition_only_applies_at_ground_layer() {
        let mut mesh = Mesh::new();
        let mut elevated = blank_cell(CellId(0), rect_footprint(0.0, 0.0, 1.0, 1.0), 1.0, 1.0, 100.0, 1);
        elevated.particle_dry_dep = 0.01;
        elevated.ci[Species::Pm25Primary.index()] = 5.0;
        elevated.cf[Species::Pm25Primary.index()] = 5.0;
        let id = mesh.insert(elevated).unwrap();

        apply_dry_deposition(&mut mesh, id, 60.0);
        let cell = mesh.get(id).unwrap();
        assert_eq!(cell.cf[Species::Pm25Primary.index()], 5.0);
    }

    #[test]
    fn wet_deposition_reduces_concentration() {
        let mut mesh = Mesh::new();
        let mut cell = blank_cell(CellId(0), rect_footprint(0.0, 0.0, 1.0, 1.0), 1.0, 1.0, 100.0, 0);
        cell.particle_wet_dep = 1e-4;
        cell.ci[Species::Pm25Primary.index()] = 5.0;
        cell.cf[Species::Pm25Primary.index()] = 5.0;
        let id = mesh.insert(cell).unwrap();

        apply_wet_deposition(&mut mesh, id, 60.0);
        let cell = mesh.get(id).unwrap();
        assert!(cell.cf[Species::Pm25Primary.index()] < 5.0);
    }
}
