//! Physics operators: pure `(cell, Δt) → mutate cell.Cf` functions (spec §2
//! item 7, §4.7).
//!
//! Grounded on the teacher's `physics.rs`: small free functions taking
//! explicit parameters and returning a value rather than hiding state, and
//! `simulation.rs::update`'s `Ci`/`Cf` double-buffering (read the
//! start-of-step snapshot, write the running total) so operator order
//! within a step does not change the result. Per spec §5, each operator is a
//! single data-parallel pass: this module computes per-cell (and
//! per-boundary-slot) deltas with `rayon::par_iter` over read-only `Ci`
//! snapshots, then applies them in one serial commit, which gives the same
//! race-free result as the teacher's in-place parallel mutation without
///  needing `unsafe` aliased writes into the arena.

pub mod advection;
pub mod chemistry;
pub mod deposition;
pub mod emissions_injection;
pub mod meander;
pub mod mixing;

use crate::cell::{CellId, Direction, NeighborTarget};
use crate::mesh::Mesh;
use crate::species::{zero_concentrations, Concentrations, NUM_SPECIES};
use rayon::prelude::*;

/// Accumulated change to one interior cell's `Cf`, or to one boundary
/// pseudo-cell's `Cf`, produced by a single operator pass.
#[derive(Debug, Clone, Copy)]
pub enum DeltaTarget {
    Interior(CellId),
    Boundary { direction: Direction, slot: u32 },
}

/// A batch of per-target concentration deltas from one parallel pass.
pub type DeltaBatch = Vec<(DeltaTarget, Concentrations)>;

/// Runs `compute` over every live interior cell in parallel, then applies
/// every returned delta to `Cf` in one serial commit (spec §5 "the only
/// blocking is an implicit join barrier at the end of each operator pass").
pub fn run_pass<F>(mesh: &mut Mesh, compute: F)
where
    F: Fn(&Mesh, CellId) -> DeltaBatch + Sync,
{
    let ids: Vec<CellId> = mesh.iter_order().map(|c| c.id).collect();
    let batches: Vec<DeltaBatch> = ids.par_iter().map(|id| compute(mesh, *id)).collect();

    for batch in batches {
        for (target, delta) in batch {
            apply_delta(mesh, target, delta);
        }
    }
}

fn apply_delta(mesh: &mut Mesh, target: DeltaTarget, delta: Concentrations) {
    match target {
        DeltaTarget::Interior(id) => {
            if let Some(cell) = mesh.get_mut(id) {
                for i in 0..NUM_SPECIES {
                    cell.cf[i] += delta[i];
                }
            }
        }
        DeltaTarget::Boundary { direction, slot } => {
            mesh.add_to_boundary_cf(direction, slot, &delta);
        }
    }
}

pub(crate) fn empty_delta() -> Concentrations {
    zero_concentrations()
}

/// Converts a `NeighborTarget` into the `DeltaTarget` a boundary-escape
/// contribution should be filed under.
pub(crate) fn boundary_target(target: NeighborTarget) -> Option<DeltaTarget> {
    match target {
        NeighborTarget::Boundary { direction, slot } => {
            Some(DeltaTarget::Boundary { direction, slot })
        }
        NeighborTarget::Interior(_) => None,
    }
}
