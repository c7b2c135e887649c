//! The fixed nine-slot pollutant species ordering (spec §3).
//!
//! Grounded on the teacher's `fuel.rs`: a small, fixed, exhaustively-listed
//! catalogue (there, fuel types; here, species) with one enum variant per
//! entry instead of a string key, so species lookups are array indexing
//! rather than hash lookups.

use serde::{Deserialize, Serialize};

/// Number of tracked pollutant species.
pub const NUM_SPECIES: usize = 9;

/// One slot in the fixed species ordering. Variant order is load-bearing:
/// it is the array index into every `Concentrations` value in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum Species {
    GOrg = 0,
    POrg = 1,
    Pm25Primary = 2,
    GNh = 3,
    PNh = 4,
    GS = 5,
    PS = 6,
    GNo = 7,
    PNo = 8,
}

impl Species {
    /// All species in canonical order.
    pub const ALL: [Species; NUM_SPECIES] = [
        Species::GOrg,
        Species::POrg,
        Species::Pm25Primary,
        Species::GNh,
        Species::PNh,
        Species::GS,
        Species::PS,
        Species::GNo,
        Species::PNo,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether this slot holds a particle-phase (vs. gas-phase) species.
    /// `Pm25Primary` is inherently particulate and counts as a particle for
    /// deposition-velocity selection (spec §4.7 "particle species share
    /// `ParticleDryDep`").
    #[inline]
    pub fn is_particle(self) -> bool {
        matches!(
            self,
            Species::POrg | Species::Pm25Primary | Species::PNh | Species::PS | Species::PNo
        )
    }
}

/// One value per species slot, in canonical order.
pub type Concentrations = [f64; NUM_SPECIES];

/// A zeroed concentration array.
#[inline]
pub fn zero_concentrations() -> Concentrations {
    [0.0; NUM_SPECIES]
}
