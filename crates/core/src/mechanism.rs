//! The fixed chemistry scheme as an immutable value (spec §9: "fold global
//! mutable state — species indices, unit conversion tables — into an
//! immutable mechanism value passed by reference to every operator").
//!
//! Grounded on the teacher's `fuel.rs`: named presets returning an owned
//! value (`Fuel::eucalyptus_stringybark()`) rather than a lookup into a
//! process-wide table.

use crate::species::Species;
use serde::{Deserialize, Serialize};

/// One of the five pollutants an emission record carries a source rate for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmittedPollutant {
    Voc,
    NOx,
    Nh3,
    SOx,
    Pm25,
}

/// Species index and unit-conversion tables, fixed for the lifetime of a
/// run. Never a global — every operator that needs a conversion factor or a
/// species slot takes `&Mechanism` as a parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Mechanism {
    /// Mass fraction of nitrogen in NOx, applied when allocating a NOx
    /// emission rate to the `gNO` slot.
    pub nox_to_n: f64,
    /// Mass fraction of sulfur in SOx, applied when allocating an SOx
    /// emission rate to the `gS` slot.
    pub sox_to_s: f64,
    /// Mass fraction of nitrogen in NH3, applied when allocating an NH3
    /// emission rate to the `gNH` slot.
    pub nh3_to_n: f64,
}

impl Mechanism {
    /// Standard molecular-weight ratios: N/NO2 (14.0067/46.0055), S/SO2
    /// (32.06/64.06), N/NH3 (14.0067/17.0305).
    pub fn standard() -> Self {
        Mechanism {
            nox_to_n: 14.0067 / 46.0055,
            sox_to_s: 32.06 / 64.06,
            nh3_to_n: 14.0067 / 17.0305,
        }
    }

    /// Maps an emitted pollutant's source rate onto the species slot (and
    /// unit-conversion factor) that receives it (spec §4.5 "Species mapping
    /// applies unit conversions: NOx→N mass, SOx→S mass, NH3→N mass; PM25
    /// and VOC use identity").
    pub fn emission_species(&self, pollutant: EmittedPollutant) -> (Species, f64) {
        match pollutant {
            EmittedPollutant::Voc => (Species::GOrg, 1.0),
            EmittedPollutant::NOx => (Species::GNo, self.nox_to_n),
            EmittedPollutant::Nh3 => (Species::GNh, self.nh3_to_n),
            EmittedPollutant::SOx => (Species::GS, self.sox_to_s),
            EmittedPollutant::Pm25 => (Species::Pm25Primary, 1.0),
        }
    }
}

impl Default for Mechanism {
    fn default() -> Self {
        Mechanism::standard()
    }
}

/// The three gas/particle partitioning pairs chemistry redistributes between
/// (spec §4.7 "for each of the three gas/particle pairs (NH, NO, Org)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionPair {
    Nh,
    No,
    Org,
}

impl PartitionPair {
    pub const ALL: [PartitionPair; 3] = [PartitionPair::Nh, PartitionPair::No, PartitionPair::Org];

    /// The (gas, particle) species slots for this pair.
    pub fn species(self) -> (Species, Species) {
        match self {
            PartitionPair::Nh => (Species::GNh, Species::PNh),
            PartitionPair::No => (Species::GNo, Species::PNo),
            PartitionPair::Org => (Species::GOrg, Species::POrg),
        }
    }
}

/// The outcome of trying to inject a stack-plume emission record (spec §7,
/// §8 scenario 6). Not an error: the caller may filter records this applies
/// to and continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlumeOutcome {
    /// The plume rise placed the source within a valid layer; emissions were
    /// injected there.
    Injected { layer: u32 },
    /// The plume rose above the top of the domain; no emissions were added.
    AboveTopBoundary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_mappings_are_exact() {
        let mech = Mechanism::standard();
        assert_eq!(mech.emission_species(EmittedPollutant::Voc).1, 1.0);
        assert_eq!(mech.emission_species(EmittedPollutant::Pm25).1, 1.0);
    }

    #[test]
    fn nox_conversion_is_nitrogen_fraction() {
        let mech = Mechanism::standard();
        let (species, factor) = mech.emission_species(EmittedPollutant::NOx);
        assert_eq!(species, Species::GNo);
        assert!(factor > 0.0 && factor < 1.0);
    }

    #[test]
    fn partition_pairs_cover_three_species_pairs() {
        let pairs: Vec<_> = PartitionPair::ALL.iter().map(|p| p.species()).collect();
        assert_eq!(pairs.len(), 3);
    }
}
