//! A small set of newtype wrappers for quantities that are easy to mix up.
//!
//! The teacher (`core_types/units.rs`) wraps nearly every physical quantity
//! in a newtype. We apply the same pattern only where a mix-up is a real
//! risk in this crate — lengths vs. areas vs. volumes feeding straight into
//! each other in the mesh-construction code — and leave concentrations,
//! rates, and fractions as plain `f64` the way the teacher itself leaves
//! most of `fuel.rs`/`element.rs` unwrapped. Not every quantity earns a
//! type; only the ones that would silently compile if swapped.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

/// A length in meters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Meters(pub f64);

impl Meters {
    #[inline]
    pub fn new(value: f64) -> Self {
        Meters(value)
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Add for Meters {
    type Output = Meters;
    fn add(self, rhs: Meters) -> Meters {
        Meters(self.0 + rhs.0)
    }
}

impl Sub for Meters {
    type Output = Meters;
    fn sub(self, rhs: Meters) -> Meters {
        Meters(self.0 - rhs.0)
    }
}

impl Mul<f64> for Meters {
    type Output = Meters;
    fn mul(self, rhs: f64) -> Meters {
        Meters(self.0 * rhs)
    }
}

impl Mul<Meters> for Meters {
    type Output = SquareMeters;
    fn mul(self, rhs: Meters) -> SquareMeters {
        SquareMeters(self.0 * rhs.0)
    }
}

/// An area in square meters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SquareMeters(pub f64);

impl SquareMeters {
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Mul<Meters> for SquareMeters {
    type Output = CubicMeters;
    fn mul(self, rhs: Meters) -> CubicMeters {
        CubicMeters(self.0 * rhs.0)
    }
}

/// A volume in cubic meters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct CubicMeters(pub f64);

impl CubicMeters {
    #[inline]
    pub fn new(value: f64) -> Self {
        CubicMeters(value)
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Div<CubicMeters> for f64 {
    type Output = f64;
    /// μg/s ÷ m³ = μg/m³/s — the emission-allocation conversion from
    /// spec §4.5, kept as a plain division on the raw value rather than a
    /// new unit type since the result feeds directly back into untyped
    /// concentration arrays.
    fn div(self, rhs: CubicMeters) -> f64 {
        self / rhs.0
    }
}
