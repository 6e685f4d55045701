//! # Reweighting Mathematics
//!
//! Pure numeric primitives shared by the refinement engine:
//!
//! - [`tilt`] - Exponential tilting of a prior weight vector by an energy-like
//!   correction, with a numerically stable log-normalization constant
//! - [`divergence`] - Kullback-Leibler divergence of the tilted ensemble from
//!   its reference
//! - [`discrepancy`] - Chi-square agreement between ensemble-averaged
//!   predictions and experimental observable groups
//! - [`penalty`] - L2 regularization of adjustable correction parameters
//!
//! Every function here is pure and reentrant; callers are responsible for the
//! domain requirements stated on each operation (normalized weight vectors in
//! particular), which the validated data model guarantees.

pub mod discrepancy;
pub mod divergence;
pub mod penalty;
pub mod tilt;
