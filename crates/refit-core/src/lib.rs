//! # Refit Core Library
//!
//! A maximum-entropy ensemble refinement library: given conformational ensembles
//! from molecular simulation and a set of experimental observables, it computes
//! minimally perturbed statistical weights whose ensemble averages match the
//! experiments, together with fit diagnostics and free-energy differences across
//! related systems.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (`System`,
//!   `DataSet`, `ObservableGroup`), the pure reweighting mathematics (exponential
//!   tilting, Kullback-Leibler divergence, chi-square discrepancy, L2 penalty),
//!   and I/O utilities for assembling datasets from tabulated simulation output.
//!
//! - **[`engine`]: The Logic Core.** This layer hosts the constrained-optimization
//!   machinery: the convex Lagrangian dual objective, the per-system refinement
//!   task driven by a quasi-Newton minimizer, run configuration, diagnostics
//!   records, and progress reporting.
//!
//! - **[`workflows`]: The Public API.** This is the highest-level, user-facing
//!   layer. It ties the `engine` and `core` together to execute complete
//!   refinement procedures across many systems and to combine their normalization
//!   constants into thermodynamic-cycle free-energy differences.

pub mod core;
pub mod engine;
pub mod workflows;
