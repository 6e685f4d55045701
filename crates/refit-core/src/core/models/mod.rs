//! # Core Models Module
//!
//! Data structures describing the refinement problem: experimental observable
//! groups with their bound semantics, per-system frame tables and prior weights,
//! dataset containers, thermodynamic cycles, and the trait seams for
//! user-supplied differentiable functions.
//!
//! ## Key Components
//!
//! - [`observable`] - Experimental observable groups and equality/inequality bound kinds
//! - [`system`] - A single molecular system: prior weights, predicted tables, metadata
//! - [`dataset`] - The top-level container of systems and thermodynamic cycles
//! - [`correction`] - Pluggable force-field correction and forward-model contracts
//!
//! Validation happens at construction time: a [`system::System`] that was built
//! successfully is guaranteed internally consistent (matching frame counts,
//! normalized prior weights, positive uncertainties), so the numeric layers can
//! operate without re-checking.

pub mod correction;
pub mod dataset;
pub mod observable;
pub mod system;

use thiserror::Error;

/// Validation and numerical-domain errors raised at the data-model boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("System '{system}' has no frames")]
    EmptySystem { system: String },

    #[error(
        "Frame count mismatch in '{context}': expected {expected} frames, found {found}"
    )]
    FrameCountMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("Length mismatch in '{context}': expected {expected} entries, found {found}")]
    LengthMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("Prior weights of '{system}' sum to {sum}, which is not 1 within tolerance")]
    WeightsNotNormalized { system: String, sum: f64 },

    #[error("Prior weights of '{system}' contain a negative or non-finite entry")]
    InvalidWeight { system: String },

    #[error("Observable group '{group}' has a non-positive uncertainty at index {index}")]
    NonPositiveUncertainty { group: String, index: usize },

    #[error("Unknown bound kind tag '{tag}' (expected 'equality', 'lower' or 'upper')")]
    UnknownBoundKind { tag: String },

    #[error("Non-positive temperature {value} for system '{system}'")]
    InvalidTemperature { system: String, value: f64 },

    #[error("Correction vector contains no finite entries")]
    NonFiniteCorrection,
}
