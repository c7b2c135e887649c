//! Initial regular grid construction from a nesting configuration and CTM
//! data (spec §4.3 "Grid builder").
//!
//! Grounded on the teacher's `grid/simulation_grid.rs::new` (nested-loop
//! construction of cells from dimensions) and `grid/terrain.rs`
//! (area-weighted sampling from an external raster/vector layer).

use crate::cell::{blank_cell, Cell, CellId};
use crate::census::{CensusRecord, MortalityRecord};
use crate::config::DriverConfig;
use crate::ctm::CtmDataset;
use crate::error::{InMapError, Result};
use crate::geometry::{self, rect_footprint};
use crate::mesh::Mesh;
use tracing::{info, warn};

/// Minimum fraction of a new cell's footprint that must be covered by CTM
/// data (spec §4.3 "at least 90% ... covered by CTM data").
const MIN_CTM_COVERAGE: f64 = 0.90;

/// Builds the outermost-nest mesh: `Nz × Xnests[0] × Ynests[0]` cells, each
/// populated from CTM interpolation and census/mortality integration.
pub fn build_outermost_mesh(
    config: &DriverConfig,
    nlayers: u32,
    ctm: &dyn CtmDataset,
    census: &[CensusRecord],
    mortality: &[MortalityRecord],
) -> Result<Mesh> {
    config.validate()?;

    let nx = *config.x_nests.first().ok_or_else(|| {
        InMapError::Config("x_nests must have at least one entry".to_string())
    })?;
    let ny = *config.y_nests.first().ok_or_else(|| {
        InMapError::Config("y_nests must have at least one entry".to_string())
    })?;

    let mut mesh = Mesh::new();
    let mut layer_height = 0.0_f64;

    for layer in 0..nlayers {
        let mut dz_for_layer = config.dy0; // overwritten below once sampled
        for j in 0..ny {
            for i in 0..nx {
                let x0 = config.origin_x + i as f64 * config.dx0;
                let y0 = config.origin_y + j as f64 * config.dy0;
                let footprint = rect_footprint(x0, y0, config.dx0, config.dy0);

                let (sample, coverage) = ctm.interpolate(&footprint, layer);
                if coverage < MIN_CTM_COVERAGE {
                    return Err(InMapError::Coverage {
                        cell: CellId(mesh.cell_count() as u32),
                        achieved: coverage,
                        required: MIN_CTM_COVERAGE,
                    });
                }

                let dz = if sample.dz > 0.0 { sample.dz } else { 100.0 };
                dz_for_layer = dz;

                let mut cell = blank_cell(CellId(0), footprint.clone(), config.dx0, config.dy0, dz, layer);
                cell.layer_height = layer_height;
                cell.nest_index = vec![(i, j)];
                apply_ctm_sample(&mut cell, &sample);

                if layer == 0 {
                    populate_demographics(&mut cell, config, &footprint, census, mortality);
                }

                mesh.insert(cell)?;
            }
        }
        layer_height += dz_for_layer;
    }

    info!(cells = mesh.cell_count(), nlayers, "built outermost mesh");
    Ok(mesh)
}

fn apply_ctm_sample(cell: &mut Cell, sample: &crate::ctm::CtmSample) {
    cell.u_avg = sample.u_avg;
    cell.v_avg = sample.v_avg;
    cell.w_avg = sample.w_avg;
    cell.u_deviation = sample.u_deviation;
    cell.v_deviation = sample.v_deviation;
    cell.a_org_partitioning = sample.a_org_partitioning;
    cell.b_org_partitioning = sample.b_org_partitioning;
    cell.no_partitioning = sample.no_partitioning;
    cell.s_partitioning = sample.s_partitioning;
    cell.nh_partitioning = sample.nh_partitioning;
    cell.so2_oxidation = sample.so2_oxidation;
    cell.particle_dry_dep = sample.particle_dry_dep;
    cell.so2_dry_dep = sample.so2_dry_dep;
    cell.nox_dry_dep = sample.nox_dry_dep;
    cell.nh3_dry_dep = sample.nh3_dry_dep;
    cell.voc_dry_dep = sample.voc_dry_dep;
    cell.kxxyy = sample.kxxyy;
    cell.kzz = sample.kzz;
    cell.particle_wet_dep = sample.particle_wet_dep;
    cell.so2_wet_dep = sample.so2_wet_dep;
    cell.other_gas_wet_dep = sample.other_gas_wet_dep;
    cell.m2u = sample.m2u;
    cell.m2d = sample.m2d;
    cell.wind_speed = sample.wind_speed;
    cell.wind_speed_inverse = sample.wind_speed_inverse;
    cell.wind_speed_minus_third = sample.wind_speed_minus_third;
    cell.wind_speed_minus_one_point_four = sample.wind_speed_minus_one_point_four;
    cell.temperature = sample.temperature;
    cell.s1 = sample.s1;
    cell.s_class = sample.s_class;

    use crate::species::Species;
    cell.c_baseline[Species::Pm25Primary.index()] = sample.total_pm25;
    cell.c_baseline[Species::GNh.index()] = sample.g_nh;
    cell.c_baseline[Species::PNh.index()] = sample.p_nh;
    cell.c_baseline[Species::GNo.index()] = sample.g_no;
    cell.c_baseline[Species::PNo.index()] = sample.p_no;
    cell.c_baseline[Species::GS.index()] = sample.g_s;
    cell.c_baseline[Species::PS.index()] = sample.p_s;
    cell.c_baseline[Species::GOrg.index()] = sample.a_voc;
    cell.c_baseline[Species::POrg.index()] = sample.a_soa;
}

/// Sets population as the area-weighted sum of intersecting census
/// polygons, flags `AboveDensityThreshold`, and computes mortality as the
/// population-weighted average of area-weighted mortality rates (spec §4.3).
///
/// Shared with `mutator::split_cell`, which re-samples a split cell's
/// children from the census layer the same way rather than dividing the
/// parent's value by child count (spec §4.4's "recomputed from the census
/// layer, not divided by count").
pub(crate) fn populate_demographics(
    cell: &mut Cell,
    config: &DriverConfig,
    footprint: &crate::geometry::Footprint,
    census: &[CensusRecord],
    mortality: &[MortalityRecord],
) {
    let group_count = config.census_columns.population_columns.len();
    let mut population = vec![0.0; group_count];
    let mut above_threshold = false;
    let mut overlapped_any = false;

    for record in census {
        let overlap = geometry::intersection_area(&record.footprint, footprint);
        if overlap <= 0.0 {
            continue;
        }
        overlapped_any = true;
        let record_area = geometry::area(&record.footprint).max(1e-12);
        let weight = overlap / record_area;
        for (slot, value) in population.iter_mut().zip(record.population.iter()) {
            *slot += value * weight;
        }
        if record.density > config.pop_density_threshold {
            above_threshold = true;
        }
    }

    if !overlapped_any {
        // Open question resolution (spec §9): empty groundLevel census
        // coverage is permissive, treated as zero population.
        warn!("cell has no intersecting census data; treating as zero population");
    }

    let mortality_group_count = config.census_columns.mortality_columns.len();
    let mut weighted_mortality = vec![0.0; mortality_group_count];
    let mut weight_sum = vec![0.0; mortality_group_count];
    for record in mortality {
        let overlap = geometry::intersection_area(&record.footprint, footprint);
        if overlap <= 0.0 {
            continue;
        }
        let record_area = geometry::area(&record.footprint).max(1e-12);
        let weight = overlap / record_area;
        let total_pop: f64 = population.iter().sum();
        for (idx, rate) in record.mortality_rate.iter().enumerate() {
            if idx >= weighted_mortality.len() {
                break;
            }
            weighted_mortality[idx] += rate * weight * total_pop;
            weight_sum[idx] += weight * total_pop;
        }
    }
    for idx in 0..mortality_group_count {
        if weight_sum[idx] > 0.0 {
            weighted_mortality[idx] /= weight_sum[idx];
        }
    }

    cell.demographics.population = population;
    cell.demographics.mortality_rate = weighted_mortality;
    cell.demographics.above_density_threshold = above_threshold;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CensusPopColumns;
    use crate::ctm::{CtmGlobalAttributes, CtmSample};

    struct UniformCtm {
        attrs: CtmGlobalAttributes,
    }

    impl CtmDataset for UniformCtm {
        fn global_attributes(&self) -> &CtmGlobalAttributes {
            &self.attrs
        }

        fn interpolate(&self, _footprint: &crate::geometry::Footprint, _layer: u32) -> (CtmSample, f64) {
            let mut sample = CtmSample::default();
            sample.dz = 100.0;
            sample.kxxyy = 5.0;
            sample.kzz = 1.0;
            (sample, 1.0)
        }
    }

    fn test_config() -> DriverConfig {
        DriverConfig {
            origin_x: 0.0,
            origin_y: 0.0,
            dx0: 1000.0,
            dy0: 1000.0,
            x_nests: vec![2],
            y_nests: vec![2],
            hi_res_layers: 1,
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

    #[test]
    fn builds_requested_cell_count() {
        let ctm = UniformCtm {
            attrs: CtmGlobalAttributes {
                x0: 0.0,
                y0: 0.0,
                dx: 1000.0,
                dy: 1000.0,
                nx: 2,
                ny: 2,
                data_version: "1".to_string(),
            },
        };
        let mesh = build_outermost_mesh(&test_config(), 1, &ctm, &[], &[]).unwrap();
        assert_eq!(mesh.cell_count(), 4);
    }

    #[test]
    fn insufficient_coverage_is_fatal() {
        struct SparseCtm;
        impl CtmDataset for SparseCtm {
            fn global_attributes(&self) -> &CtmGlobalAttributes {
                unreachable!()
            }
            fn interpolate(&self, _footprint: &crate::geometry::Footprint, _layer: u32) -> (CtmSample, f64) {
                (CtmSample::default(), 0.5)
            }
        }
        let result = build_outermost_mesh(&test_config(), 1, &SparseCtm, &[], &[]);
        assert!(result.is_err());
    }
}
