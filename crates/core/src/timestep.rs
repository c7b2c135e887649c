//! CFL-bounded time-step controller (spec §4.6).
//!
//! Grounded on spec §4.6 directly; styled after the teacher's small,
//! single-purpose physics functions (`physics.rs`) rather than folded into
//! the driver loop.

use crate::cell::Cell;
use crate::error::{InMapError, Result};
use crate::mesh::Mesh;
use crate::species::Species;

/// Courant number used for the advection and diffusion bounds.
const C_MAX: f64 = 0.75;
/// Courant number used for first-order reaction bounds (chemistry,
/// deposition).
const C_FIRST_ORDER: f64 = 1.0 / 3.0;

/// Candidate `Δt` bounds (seconds) contributed by one cell; the domain
/// `Δt` is the minimum over every cell and every term.
fn cell_timestep_bound(cell: &Cell) -> f64 {
    let mut bound = f64::INFINITY;

    let convective = cell.m2u + cell.m2d;
    let advection_rate = (((cell.u_avg.abs() + 2.0 * cell.u_deviation) / cell.dx).max(
        (cell.v_avg.abs() + 2.0 * cell.v_deviation) / cell.dy,
    ))
    .max(cell.w_avg.abs() / cell.dz)
    .max(convective);
    if advection_rate > 0.0 {
        bound = bound.min(C_MAX / std::f64::consts::SQRT_3 / advection_rate);
    }

    if cell.kxxyy > 0.0 {
        bound = bound.min(C_MAX * cell.dx * cell.dx / (2.0 * cell.kxxyy));
        bound = bound.min(C_MAX * cell.dy * cell.dy / (2.0 * cell.kxxyy));
    }
    if cell.kzz > 0.0 {
        bound = bound.min(C_MAX * cell.dz * cell.dz / (2.0 * cell.kzz));
    }

    for rate in first_order_rates(cell) {
        if rate > 0.0 {
            bound = bound.min(C_FIRST_ORDER / rate);
        }
    }

    bound
}

fn first_order_rates(cell: &Cell) -> Vec<f64> {
    let mut rates = vec![cell.so2_oxidation];
    if cell.is_ground_layer() {
        for species in Species::ALL {
            rates.push(dry_rate(cell, species));
        }
    }
    rates.push(cell.particle_wet_dep);
    rates.push(cell.so2_wet_dep);
    rates.push(cell.other_gas_wet_dep);
    rates
}

fn dry_rate(cell: &Cell, species: Species) -> f64 {
    let v_dep = if species.is_particle() {
        cell.particle_dry_dep
    } else {
        match species {
            Species::GNh => cell.nh3_dry_dep,
            Species::GS => cell.so2_dry_dep,
            Species::GNo => cell.nox_dry_dep,
            Species::GOrg => cell.voc_dry_dep,
            _ => 0.0,
        }
    };
    v_dep / cell.dz
}

/// Computes the domain-wide `Δt`, the minimum bound across every live
/// interior cell and every stability term. Fails with `InMapError::Numeric`
/// if the result is non-positive or the mesh has no cells.
pub fn compute_timestep(mesh: &Mesh) -> Result<f64> {
    let mut dt = f64::INFINITY;
    for cell in mesh.iter_order() {
        dt = dt.min(cell_timestep_bound(cell));
    }

    if !dt.is_finite() || dt <= 0.0 {
        return Err(InMapError::Numeric(format!(
            "computed non-positive or non-finite timestep: {dt}"
        )));
    }
    Ok(dt)
}
