//! Emissions injection (spec §4.7 "Emissions injection"). Called once per
//! step in a serial phase — single producer per cell, no parallel pass.

use crate::cell::CellId;
use crate::mesh::Mesh;
use crate::species::NUM_SPECIES;

/// `Cf += EmisFlux · Δt; Ci = Cf`.
pub fn inject_emissions(mesh: &mut Mesh, id: CellId, dt: f64) {
    let cell = match mesh.get_mut(id) {
        Some(c) => c,
        None => return,
    };
    for species_idx in 0..NUM_SPECIES {
        cell.cf[species_idx] += cell.emis_flux[species_idx] * dt;
        cell.ci[species_idx] = cell.cf[species_idx];
    }
}
