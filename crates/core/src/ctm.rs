//! External chemical-transport-model interface (spec §6 "CTM input file").
//!
//! The binary/NetCDF reader itself lives outside this crate (spec §1); this
//! module only fixes the trait boundary a concrete reader must satisfy, and
//! the global-attribute struct the grid builder validates against.

use crate::error::{InMapError, Result};

/// Global attributes every CTM dataset must carry (spec §6, "Mandatory
/// global attributes").
#[derive(Debug, Clone, PartialEq)]
pub struct CtmGlobalAttributes {
    pub x0: f64,
    pub y0: f64,
    pub dx: f64,
    pub dy: f64,
    pub nx: u32,
    pub ny: u32,
    pub data_version: String,
}

impl CtmGlobalAttributes {
    /// Fails with `InMapError::DataVersionMismatch` if this dataset's
    /// version does not match the version the core requires.
    pub fn check_version(&self, required: &str) -> Result<()> {
        if self.data_version != required {
            return Err(InMapError::DataVersionMismatch {
                expected: required.to_string(),
                found: self.data_version.clone(),
            });
        }
        Ok(())
    }
}

/// One (layer, y, x) or (y, x) sample of a CTM variable at a point.
#[derive(Debug, Clone, Copy, Default)]
pub struct CtmSample {
    pub u_avg: f64,
    pub v_avg: f64,
    pub w_avg: f64,
    pub u_deviation: f64,
    pub v_deviation: f64,
    pub a_org_partitioning: f64,
    pub b_org_partitioning: f64,
    pub no_partitioning: f64,
    pub s_partitioning: f64,
    pub nh_partitioning: f64,
    pub so2_oxidation: f64,
    pub particle_dry_dep: f64,
    pub so2_dry_dep: f64,
    pub nox_dry_dep: f64,
    pub nh3_dry_dep: f64,
    pub voc_dry_dep: f64,
    pub kxxyy: f64,
    pub kzz: f64,
    pub layer_height: f64,
    pub dz: f64,
    pub particle_wet_dep: f64,
    pub so2_wet_dep: f64,
    pub other_gas_wet_dep: f64,
    pub m2u: f64,
    pub m2d: f64,
    pub wind_speed: f64,
    pub wind_speed_inverse: f64,
    pub wind_speed_minus_third: f64,
    pub wind_speed_minus_one_point_four: f64,
    pub temperature: f64,
    pub s1: f64,
    pub s_class: f64,
    pub total_pm25: f64,
    pub g_nh: f64,
    pub p_nh: f64,
    pub g_no: f64,
    pub p_no: f64,
    pub g_s: f64,
    pub p_s: f64,
    pub a_voc: f64,
    pub a_soa: f64,
}

/// What the grid builder needs from a loaded CTM dataset: its global
/// attributes, and area-weighted interpolation of every required variable
/// onto an arbitrary footprint at a given layer.
pub trait CtmDataset {
    fn global_attributes(&self) -> &CtmGlobalAttributes;

    /// Area-weighted average of every CTM variable over `footprint` at
    /// `layer`, plus the fraction of `footprint`'s area actually covered by
    /// CTM source cells (spec §4.3: "requires that at least 90% of each new
    /// cell's footprint be covered by CTM data").
    fn interpolate(&self, footprint: &crate::geometry::Footprint, layer: u32) -> (CtmSample, f64);
}
