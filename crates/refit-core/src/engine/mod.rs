//! # Engine Module
//!
//! This module implements the constrained-optimization engine of the library:
//! per-system minimization of the Lagrangian dual objective whose solution is
//! the minimally perturbed ensemble matching the experimental constraints.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Refinement strength and optimizer
//!   parameters, builder-validated
//! - **Dual Objective** ([`dual`]) - The convex function of the Lagrange
//!   multipliers, with value, analytic gradient, and recovered averages
//! - **Tasks** ([`tasks`]) - Per-system computational units: prior tilting by
//!   a force-field correction and dual minimization
//! - **Diagnostics** ([`report`]) - Optimizer and per-system result records
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine-specific error taxonomy
//!
//! The dual objective holds no persistent state: it is a pure function of the
//! multipliers and the system's data, re-evaluated at every optimizer
//! iteration, which keeps per-system minimizations trivially parallel.

pub mod config;
pub mod dual;
pub mod error;
pub mod progress;
pub mod report;
pub mod tasks;
