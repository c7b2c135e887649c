//! Top-level step/run loop (spec §4.8 "Driver loop").
//!
//! Grounded on the teacher's `simulation.rs::update` (ordered phases each
//! step, statistics accumulation) and `solver/mod.rs` (a small orchestrating
//! type that owns the rest of the simulation and reports progress via
//! `tracing`).

use crate::census::{CensusRecord, MortalityRecord};
use crate::config::DriverConfig;
use crate::emissions::EmissionRecord;
use crate::error::Result;
use crate::mechanism::Mechanism;
use crate::mesh::Mesh;
use crate::mutator::DivideRule;
use crate::physics::{advection, chemistry, deposition, emissions_injection, meander, mixing, run_pass};
use crate::species::Species;
use crate::timestep::compute_timestep;
use tracing::{info, info_span};

/// Either terminate after a fixed number of steps, or once the relative
/// change in a population-weighted PM2.5 metric between successive windows
/// falls under a threshold (spec §4.8 "Termination criteria").
#[derive(Debug, Clone, Copy)]
pub enum TerminationCriterion {
    FixedSteps(u64),
    Convergence { window: u64, relative_threshold: f64 },
}

/// Optional dynamic-grid refinement hook, invoked every `every_n_steps`
/// steps (spec §4.8 step 5).
pub struct DynamicGridConfig<'a> {
    pub every_n_steps: u64,
    pub rule: &'a dyn DivideRule,
    pub x_splits: u32,
    pub y_splits: u32,
    pub max_depth: usize,
    pub emissions: &'a [EmissionRecord],
    /// Needed to re-sample split children's demographics from the census
    /// layer (spec §4.4) rather than dividing the parent's value by count.
    pub config: &'a DriverConfig,
    pub census: &'a [CensusRecord],
    pub mortality: &'a [MortalityRecord],
}

/// Drives the mesh through repeated steps until a termination criterion is
/// met.
pub struct Driver<'a> {
    pub mesh: Mesh,
    pub mechanism: Mechanism,
    pub termination: TerminationCriterion,
    pub dynamic_grid: Option<DynamicGridConfig<'a>>,
    step_count: u64,
    convergence_history: Vec<f64>,
    done: bool,
}

impl<'a> Driver<'a> {
    pub fn new(mesh: Mesh, mechanism: Mechanism, termination: TerminationCriterion) -> Self {
        Driver {
            mesh,
            mechanism,
            termination,
            dynamic_grid: None,
            step_count: 0,
            convergence_history: Vec::new(),
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Advances the simulation by exactly one step (spec §4.8 steps 1-6).
    pub fn step(&mut self) -> Result<()> {
        let span = info_span!("driver_step", step = self.step_count);
        let _guard = span.enter();

        let dt = compute_timestep(&self.mesh)?;

        self.snapshot_ci();

        run_pass(&mut self.mesh, |mesh, id| advection::advect_cell(mesh, id, dt));
        run_pass(&mut self.mesh, |mesh, id| mixing::mix_cell(mesh, id, dt));
        run_pass(&mut self.mesh, |mesh, id| meander::meander_cell(mesh, id, dt));

        let ids = self.mesh.iter_order_ids();
        for id in &ids {
            chemistry::apply_chemistry(&mut self.mesh, *id, dt);
        }
        for id in &ids {
            deposition::apply_dry_deposition(&mut self.mesh, *id, dt);
        }
        for id in &ids {
            deposition::apply_wet_deposition(&mut self.mesh, *id, dt);
        }
        for id in &ids {
            emissions_injection::inject_emissions(&mut self.mesh, *id, dt);
        }

        self.step_count += 1;

        if let Some(dynamic_grid) = self.dynamic_grid.as_ref() {
            if self.step_count % dynamic_grid.every_n_steps == 0 {
                crate::mutator::refine_until_stable(
                    &mut self.mesh,
                    dynamic_grid.rule,
                    dynamic_grid.x_splits,
                    dynamic_grid.y_splits,
                    dynamic_grid.max_depth,
                    &self.mechanism,
                    dynamic_grid.emissions,
                    dynamic_grid.config,
                    dynamic_grid.census,
                    dynamic_grid.mortality,
                )?;
            }
        }

        self.evaluate_termination();
        Ok(())
    }

    /// Runs steps until `is_done()`.
    pub fn run(&mut self) -> Result<()> {
        while !self.done {
            self.step()?;
        }
        info!(steps = self.step_count, "driver run complete");
        Ok(())
    }

    fn snapshot_ci(&mut self) {
        for id in self.mesh.iter_order_ids() {
            if let Some(cell) = self.mesh.get_mut(id) {
                cell.ci = cell.cf;
            }
        }
    }

    fn population_weighted_pm25(&self) -> f64 {
        let mut weighted_sum = 0.0;
        let mut total_population = 0.0;
        for cell in self.mesh.iter_order() {
            if !cell.is_ground_layer() {
                continue;
            }
            let population = cell.total_population();
            weighted_sum += cell.cf[Species::Pm25Primary.index()] * population;
            total_population += population;
        }
        if total_population > 0.0 {
            weighted_sum / total_population
        } else {
            0.0
        }
    }

    fn evaluate_termination(&mut self) {
        match self.termination {
            TerminationCriterion::FixedSteps(target) => {
                if self.step_count >= target {
                    self.done = true;
                }
            }
            TerminationCriterion::Convergence { window, relative_threshold } => {
                self.convergence_history.push(self.population_weighted_pm25());
                let window = window as usize;
                if self.convergence_history.len() >= 2 * window {
                    let len = self.convergence_history.len();
                    let recent: f64 = self.convergence_history[len - window..].iter().sum::<f64>() / window as f64;
                    let previous: f64 =
                        self.convergence_history[len - 2 * window..len - window].iter().sum::<f64>() / window as f64;
                    if previous.abs() > 0.0 && ((recent - previous) / previous).abs() < relative_threshold {
                        self.done = true;
                    }
                }
            }
        }
    }
}
