//! # Workflows Module
//!
//! High-level entry points tying the data model and the optimization engine
//! together into complete refinement procedures.
//!
//! ## Architecture
//!
//! - **Refinement Workflow** ([`refine`]) - Refines every system of a dataset
//!   against its experimental observables: optional force-field tilting of the
//!   priors, independent per-system dual minimizations (dispatched in parallel
//!   when the `parallel` feature is enabled), and deterministic aggregation of
//!   losses, divergences and diagnostics.
//! - **Free-Energy Workflow** ([`free_energy`]) - Combines per-system
//!   log-normalization constants across thermodynamic cycles into double
//!   free-energy differences.
//!
//! Workflows never mutate their inputs; each run produces an immutable result
//! record with an entry for every system, whether or not its optimization
//! converged.

pub mod free_energy;
pub mod refine;
