//! Driver configuration and validation (spec §6 "Driver inputs").
//!
//! Grounded on spec §6 directly; styled after the teacher's small validated
//! structs (`core_types/units.rs`) — a plain struct with a `validate()`
//! method rather than a builder or a parsing layer. Parsing from files/CLI
//! flags is explicitly out of scope (spec §1); only the in-memory struct
//! and its validation rules belong to this crate.

use crate::error::{InMapError, Result};
use serde::{Deserialize, Serialize};

/// Maps a census layer's attribute columns onto the demographic groups the
/// mesh tracks population for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensusPopColumns {
    pub population_columns: Vec<String>,
    pub mortality_columns: Vec<String>,
}

/// Full set of inputs a `Driver` needs before it can build a mesh and run
/// (spec §6 "Driver inputs").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Lower-left corner of the outermost nest, in the grid projection.
    pub origin_x: f64,
    pub origin_y: f64,
    /// Outermost-nest edge sizes.
    pub dx0: f64,
    pub dy0: f64,
    /// Per-level nesting multipliers; `x_nests[0]`/`y_nests[0]` are the
    /// outermost cell counts, later entries are split factors.
    pub x_nests: Vec<u32>,
    pub y_nests: Vec<u32>,
    /// Number of the innermost nest levels that may be refined.
    pub hi_res_layers: u32,
    pub pop_density_threshold: f64,
    pub pop_threshold: f64,
    pub pop_conc_threshold: f64,
    pub census_columns: CensusPopColumns,
    /// Name/EPSG code of the grid projection; parsed and validated
    /// elsewhere, stored here only as an opaque identifier.
    pub grid_projection: String,
    /// Unit code for incoming emission records (e.g. `"ug/s"`, `"tons/year"`
    /// converted upstream); stored opaquely, not parsed by this crate.
    pub emission_unit_code: String,
}

impl DriverConfig {
    /// All three refinement thresholds (and both nest-count entries per
    /// level) must be positive, or this is a configuration error (spec §6
    /// "All numeric thresholds must be positive or a configuration error is
    /// raised").
    pub fn validate(&self) -> Result<()> {
        let positive_fields: [(&str, f64); 5] = [
            ("dx0", self.dx0),
            ("dy0", self.dy0),
            ("pop_density_threshold", self.pop_density_threshold),
            ("pop_threshold", self.pop_threshold),
            ("pop_conc_threshold", self.pop_conc_threshold),
        ];
        for (name, value) in positive_fields {
            if !(value > 0.0) {
                return Err(InMapError::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        if self.x_nests.is_empty() || self.y_nests.is_empty() {
            return Err(InMapError::Config(
                "x_nests and y_nests must have at least one entry".to_string(),
            ));
        }
        if self.x_nests.iter().any(|&n| n == 0) || self.y_nests.iter().any(|&n| n == 0) {
            return Err(InMapError::Config(
                "nest multipliers must be nonzero".to_string(),
            ));
        }
        if self.grid_projection.trim().is_empty() {
            return Err(InMapError::Config("grid_projection must not be empty".to_string()));
        }
        if self.emission_unit_code.trim().is_empty() {
            return Err(InMapError::Config(
                "emission_unit_code must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> DriverConfig {
        DriverConfig {
            origin_x: 0.0,
            origin_y: 0.0,
            dx0: 12000.0,
            dy0: 12000.0,
            x_nests: vec![10, 2],
            y_nests: vec![10, 2],
            hi_res_layers: 2,
            pop_density_threshold: 100.0,
            pop_threshold: 1000.0,
            pop_conc_threshold: 1e-9,
            census_columns: CensusPopColumns {
                population_columns: vec!["TOTPOP".to_string()],
                mortality_columns: vec!["MORT_ALL".to_string()],
            },
            grid_projection: "EPSG:5070".to_string(),
            emission_unit_code: "ug/s".to_string(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn non_positive_threshold_is_rejected() {
        let mut config = valid_config();
        config.pop_threshold = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_nest_list_is_rejected() {
        let mut config = valid_config();
        config.x_nests.clear();
        assert!(config.validate().is_err());
    }
}
