//! Error kinds surfaced by the simulation core.
//!
//! Mirrors spec §7: a closed set of error kinds, propagated with `?` and
//! never recovered from inside an operator — the driver aborts the run on
//! any `Err`. See `Doctor0Evil-EcoSocialBee`'s crates for the
//! `thiserror`-enum convention this follows; the teacher repo uses a plain
//! `Display`-based error (`simulation/persistence.rs::PersistenceError`)
//! which we fold into `InMapError::Io`/`InMapError::Config` instead of
//! keeping as a second error type.

use thiserror::Error;

/// All failure modes the simulation core can produce.
#[derive(Debug, Error)]
pub enum InMapError {
    /// Missing/invalid threshold, projection, or emission-unit configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// CTM file or saved mesh was produced with an incompatible data version.
    #[error("data version mismatch: expected {expected}, found {found}")]
    DataVersionMismatch { expected: String, found: String },

    /// A new cell's footprint was insufficiently overlapped by CTM data.
    #[error("coverage error: cell {cell:?} covered {achieved:.4}, required {required:.4}")]
    Coverage {
        cell: crate::cell::CellId,
        achieved: f64,
        required: f64,
    },

    /// Degenerate intersection, null geometry, or duplicated centroids.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// Δt non-positive, or NaN in a population/mortality/numeric input.
    #[error("numeric error: {0}")]
    Numeric(String),

    /// Underlying file/stream failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure to (de)serialize a persisted mesh snapshot.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InMapError>;
