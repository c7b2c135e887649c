//! Scenario 3 (spec §8): chemistry-only exponential decay. Starting from
//! gS = 10 ug/m3 with a fixed SO2 oxidation rate, after a known elapsed
//! time the particle-phase sulfate should match the closed-form
//! first-order decay solution within numerical tolerance.

use inmap_core::cell::{blank_cell, CellId};
use inmap_core::geometry::rect_footprint;
use inmap_core::mesh::Mesh;
use inmap_core::physics::chemistry::apply_chemistry;
use inmap_core::species::Species;

#[test]
fn so2_oxidation_matches_closed_form_decay() {
    let mut mesh = Mesh::new();
    let mut cell = blank_cell(CellId(0), rect_footprint(0.0, 0.0, 1000.0, 1000.0), 1000.0, 1000.0, 100.0, 0);
    let rate = 1e-5_f64;
    cell.so2_oxidation = rate;
    cell.cf[Species::GS.index()] = 10.0;
    let id = mesh.insert(cell).unwrap();

    let dt = 60.0;
    let steps = 60; // 3600 seconds total
    for _ in 0..steps {
        apply_chemistry(&mut mesh, id, dt);
    }

    let cell = mesh.get(id).unwrap();
    let elapsed = dt * steps as f64;
    let expected_particle = 10.0 * (1.0 - (-rate * elapsed).exp());

    assert!(
        (cell.cf[Species::PS.index()] - expected_particle).abs() / expected_particle < 0.01,
        "expected ~{expected_particle}, got {}",
        cell.cf[Species::PS.index()]
    );
}
