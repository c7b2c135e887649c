//! Grid mutator: refines cells under a divide-rule predicate (spec §4.4
//! "Grid mutator").
//!
//! Grounded on spec §4.4 directly; structurally mirrors the teacher's
//! `mark_active_cells` two-phase mark-then-reconcile pattern
//! (`grid/simulation_grid.rs`): first evaluate the predicate over every
//! cell without mutating the mesh, then apply all scheduled splits.

use crate::cell::{blank_cell, Cell, CellId, Direction};
use crate::census::{CensusRecord, MortalityRecord};
use crate::config::DriverConfig;
use crate::emissions::{allocate_emission, EmissionRecord};
use crate::error::Result;
use crate::geometry::rect_footprint;
use crate::grid_builder::populate_demographics;
use crate::mechanism::Mechanism;
use crate::mesh::Mesh;
use crate::species::NUM_SPECIES;
use tracing::info;

/// Predicate deciding whether a cell must be split into its next inner nest
/// level (spec §4.4).
pub trait DivideRule {
    fn should_split(&self, mesh: &Mesh, cell: &Cell, total_mass: f64, total_population: f64) -> bool;
}

/// Splits when `cell.Layer < HiResLayers` AND (any ground-level ancestor
/// has `AboveDensityThreshold` OR summed ground population exceeds
/// `PopThreshold`).
pub struct PopulationRule<'a> {
    pub config: &'a DriverConfig,
}

impl DivideRule for PopulationRule<'_> {
    fn should_split(&self, mesh: &Mesh, cell: &Cell, _total_mass: f64, _total_population: f64) -> bool {
        if cell.layer >= self.config.hi_res_layers {
            return false;
        }
        if cell.demographics.above_density_threshold {
            return true;
        }
        let ground_population: f64 = if cell.is_ground_layer() {
            cell.total_population()
        } else {
            cell.ground_level
                .iter()
                .filter_map(|id| mesh.get(*id))
                .map(|g| g.total_population())
                .sum()
        };
        ground_population > self.config.pop_threshold
    }
}

/// Splits when, for any west/east/north/south neighbor, the normalised
/// concentration-population difference metric exceeds `threshold` (spec
/// §4.4 "PopConc rule").
pub struct PopConcRule {
    pub threshold: f64,
}

impl DivideRule for PopConcRule {
    fn should_split(&self, mesh: &Mesh, cell: &Cell, total_mass: f64, total_population: f64) -> bool {
        if total_mass == 0.0 || total_population == 0.0 {
            return false;
        }
        for direction in [Direction::West, Direction::East, Direction::North, Direction::South] {
            for reference in cell.neighbors(direction) {
                let neighbor = match reference.target {
                    crate::cell::NeighborTarget::Interior(id) => mesh.get(id),
                    crate::cell::NeighborTarget::Boundary { .. } => None,
                };
                let Some(neighbor) = neighbor else { continue };

                let delta_c: f64 = (0..NUM_SPECIES)
                    .map(|i| (cell.cf[i] - neighbor.cf[i]).abs())
                    .sum();
                let delta_p = (cell.total_population() - neighbor.total_population()).abs();
                let metric = delta_c * (cell.volume() + neighbor.volume()) * delta_p
                    / (total_mass * total_population);
                if metric > self.threshold {
                    return true;
                }
            }
        }
        false
    }
}

/// `totalMass = Σ_cells (Σ_species Cf) · V`; `totalPopulation = Σ_groundcells
/// population` (spec §4.4 step 1).
fn domain_totals(mesh: &Mesh) -> (f64, f64) {
    let mut total_mass = 0.0;
    let mut total_population = 0.0;
    for cell in mesh.iter_order() {
        let species_sum: f64 = cell.cf.iter().sum();
        total_mass += species_sum * cell.volume();
        if cell.is_ground_layer() {
            total_population += cell.total_population();
        }
    }
    (total_mass, total_population)
}

/// Splits `parent` into `x_splits × y_splits` children at the next nest
/// depth, inheriting `Cf`/`Ci` by copy and re-sampling demographics from the
/// census layer rather than dividing the parent's value by child count
/// (spec §4.4 step 2).
#[allow(clippy::too_many_arguments)]
fn split_cell(
    parent: &Cell,
    x_splits: u32,
    y_splits: u32,
    config: &DriverConfig,
    census: &[CensusRecord],
    mortality: &[MortalityRecord],
) -> Vec<Cell> {
    let rect = crate::geometry::bounding_rect(&parent.footprint);
    let child_dx = parent.dx / x_splits as f64;
    let child_dy = parent.dy / y_splits as f64;
    let mut children = Vec::with_capacity((x_splits * y_splits) as usize);

    for j in 0..y_splits {
        for i in 0..x_splits {
            let x0 = rect.min().x + i as f64 * child_dx;
            let y0 = rect.min().y + j as f64 * child_dy;
            let footprint = rect_footprint(x0, y0, child_dx, child_dy);
            let mut child = blank_cell(CellId(0), footprint, child_dx, child_dy, parent.dz, parent.layer);
            child.layer_height = parent.layer_height;
            child.ci = parent.ci;
            child.cf = parent.cf;
            child.c_baseline = parent.c_baseline;
            child.u_avg = parent.u_avg;
            child.v_avg = parent.v_avg;
            child.w_avg = parent.w_avg;
            child.u_deviation = parent.u_deviation;
            child.v_deviation = parent.v_deviation;
            child.kxxyy = parent.kxxyy;
            child.kzz = parent.kzz;
            child.m2u = parent.m2u;
            child.m2d = parent.m2d;
            child.temperature = parent.temperature;
            child.a_org_partitioning = parent.a_org_partitioning;
            child.b_org_partitioning = parent.b_org_partitioning;
            child.nh_partitioning = parent.nh_partitioning;
            child.no_partitioning = parent.no_partitioning;
            child.s_partitioning = parent.s_partitioning;
            child.so2_oxidation = parent.so2_oxidation;
            child.particle_dry_dep = parent.particle_dry_dep;
            child.nh3_dry_dep = parent.nh3_dry_dep;
            child.so2_dry_dep = parent.so2_dry_dep;
            child.voc_dry_dep = parent.voc_dry_dep;
            child.nox_dry_dep = parent.nox_dry_dep;
            child.particle_wet_dep = parent.particle_wet_dep;
            child.so2_wet_dep = parent.so2_wet_dep;
            child.other_gas_wet_dep = parent.other_gas_wet_dep;
            let mut nest_index = parent.nest_index.clone();
            nest_index.push((i, j));
            child.nest_index = nest_index;

            let child_footprint = child.footprint.clone();
            populate_demographics(&mut child, config, &child_footprint, census, mortality);

            children.push(child);
        }
    }
    children
}

/// Runs one refinement pass: evaluates `rule` over every cell whose nest
/// depth allows further splitting, splits all cells the rule flags, and
/// reinserts their children (spec §4.4 steps 1-3).
#[allow(clippy::too_many_arguments)]
pub fn refine_pass(
    mesh: &mut Mesh,
    rule: &dyn DivideRule,
    x_splits: u32,
    y_splits: u32,
    max_depth: usize,
    mechanism: &Mechanism,
    emissions: &[EmissionRecord],
    config: &DriverConfig,
    census: &[CensusRecord],
    mortality: &[MortalityRecord],
) -> Result<usize> {
    let (total_mass, total_population) = domain_totals(mesh);

    let to_split: Vec<CellId> = mesh
        .iter_order()
        .filter(|c| c.nest_index.len() < max_depth)
        .filter(|c| rule.should_split(mesh, c, total_mass, total_population))
        .map(|c| c.id)
        .collect();

    let split_count = to_split.len();
    let mut children_batches = Vec::with_capacity(split_count);
    for id in &to_split {
        let parent = mesh.get(*id).expect("collected from live mesh").clone();
        children_batches.push(split_cell(&parent, x_splits, y_splits, config, census, mortality));
    }

    for id in &to_split {
        mesh.delete(*id)?;
    }
    for children in children_batches {
        for child in children {
            mesh.insert(child)?;
        }
    }

    if split_count > 0 {
        // Re-derive EmisFlux from scratch: newly created cells start with a
        // zeroed flux, and re-running every record over the whole mesh is
        // the only way to get correct per-cell weights without tracking
        // which records touched which now-deleted parent (spec §4.5's
        // "sum of weights across cells for a given record must equal 1"
        // only holds when every record is re-applied to the current cell
        // set).
        for cell in mesh.iter_order_ids() {
            if let Some(cell) = mesh.get_mut(cell) {
                cell.emis_flux = crate::species::zero_concentrations();
            }
        }
        for record in emissions {
            allocate_emission(mesh, mechanism, record);
        }
        info!(split_count, "refinement pass split cells");
    }
    Ok(split_count)
}

/// Repeats `refine_pass` until no cell is split (spec §4.4 step 4).
#[allow(clippy::too_many_arguments)]
pub fn refine_until_stable(
    mesh: &mut Mesh,
    rule: &dyn DivideRule,
    x_splits: u32,
    y_splits: u32,
    max_depth: usize,
    mechanism: &Mechanism,
    emissions: &[EmissionRecord],
    config: &DriverConfig,
    census: &[CensusRecord],
    mortality: &[MortalityRecord],
) -> Result<usize> {
    let mut total_splits = 0;
    loop {
        let splits = refine_pass(
            mesh, rule, x_splits, y_splits, max_depth, mechanism, emissions, config, census, mortality,
        )?;
        total_splits += splits;
        if splits == 0 {
            break;
        }
    }
    Ok(total_splits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::blank_cell;
    use crate::geometry::rect_footprint;
    use crate::species::Species;

    #[test]
    fn pop_conc_rule_triggers_on_large_divergence() {
        let mut mesh = Mesh::new();
        let mut a = blank_cell(CellId(0), rect_footprint(0.0, 0.0, 10.0, 10.0), 10.0, 10.0, 10.0, 0);
        a.cf[Species::Pm25Primary.index()] = 1.0;
        a.demographics.population = vec![0.0];
        let a_id = mesh.insert(a).unwrap();

        let mut b = blank_cell(CellId(0), rect_footprint(10.0, 0.0, 10.0, 10.0), 10.0, 10.0, 10.0, 0);
        b.cf[Species::Pm25Primary.index()] = 0.0;
        b.demographics.population = vec![1e5];
        mesh.insert(b).unwrap();

        let rule = PopConcRule { threshold: 1e-9 };
        let cell = mesh.get(a_id).unwrap();
        let triggered = rule.should_split(&mesh, cell, 1e6, 1e8);
        assert!(triggered);
    }

    #[test]
    fn split_children_inherit_parent_concentrations() {
        let mut parent = blank_cell(CellId(0), rect_footprint(0.0, 0.0, 10.0, 10.0), 10.0, 10.0, 10.0, 0);
        parent.cf[Species::Pm25Primary.index()] = 3.0;
        let config = test_config();
        let children = split_cell(&parent, 2, 2, &config, &[], &[]);
        assert_eq!(children.len(), 4);
        for child in &children {
            assert_eq!(child.cf[Species::Pm25Primary.index()], 3.0);
        }
    }

    #[test]
    fn split_children_resample_population_from_census_instead_of_dividing() {
        use crate::census::CensusRecord;
        use crate::geometry::rect_footprint as footprint_of;

        let parent = blank_cell(CellId(0), footprint_of(0.0, 0.0, 10.0, 10.0), 10.0, 10.0, 10.0, 0);
        // A census polygon covering only the west half of the parent: if
        // children re-sampled correctly, the two west children should pick
        // up the full 100-person count while the two east children get none.
        // Equal-share division would instead give every child 25.
        let census = vec![CensusRecord {
            footprint: footprint_of(0.0, 0.0, 5.0, 10.0),
            population: vec![100.0],
            density: 0.0,
        }];
        let config = test_config();
        let children = split_cell(&parent, 2, 2, &config, &census, &[]);
        assert_eq!(children.len(), 4);

        let west_total: f64 = children
            .iter()
            .filter(|c| crate::geometry::bounding_rect(&c.footprint).min().x < 5.0)
            .map(|c| c.demographics.population[0])
            .sum();
        let east_total: f64 = children
            .iter()
            .filter(|c| crate::geometry::bounding_rect(&c.footprint).min().x >= 5.0)
            .map(|c| c.demographics.population[0])
            .sum();
        assert!((west_total - 100.0).abs() < 1e-9);
        assert!(east_total.abs() < 1e-9);
    }

    fn test_config() -> DriverConfig {
        use crate::config::CensusPopColumns;
        DriverConfig {
            origin_x: 0.0,
            origin_y: 0.0,
            dx0: 10.0,
            dy0: 10.0,
            x_nests: vec![1],
            y_nests: vec![1],
            hi_res_layers: 2,
            pop_density_threshold: 1000.0,
            pop_threshold: 1.0,
            pop_conc_threshold: 1e-9,
            census_columns: CensusPopColumns {
                population_columns: vec!["TOTPOP".to_string()],
                mortality_columns: vec!["MORT".to_string()],
            },
            grid_projection: "EPSG:5070".to_string(),
            emission_unit_code: "ug/s".to_string(),
        }
    }
}
