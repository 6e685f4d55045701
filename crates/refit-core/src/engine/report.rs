use std::collections::BTreeMap;

use nalgebra::DVector;

use crate::core::reweight::discrepancy::Chi2Report;

/// Raw optimizer diagnostics for one system's dual minimization.
///
/// `converged: false` is a recorded outcome, not an error: downstream
/// consumers decide whether to trust the system's result.
#[derive(Debug, Clone)]
pub struct OptimizerDiagnostics {
    /// Final objective value.
    pub objective: f64,
    /// Gradient at the returned multipliers.
    pub gradient: DVector<f64>,
    pub gradient_norm: f64,
    /// The optimized multiplier vector, flattened.
    pub variables: DVector<f64>,
    pub converged: bool,
    pub iterations: u64,
}

/// Result of refining a single system.
#[derive(Debug, Clone)]
pub struct SystemReport {
    pub name: String,
    /// Minimized Lagrange multipliers, split per observable group.
    pub lambdas: BTreeMap<String, DVector<f64>>,
    /// Posterior per-frame weights.
    pub weights: DVector<f64>,
    /// Discrepancy with experiment at the optimum (averages, per-group and
    /// total chi-square, gradients).
    pub chi2: Chi2Report,
    /// Kullback-Leibler divergence of the posterior from the refinement prior.
    pub kl: f64,
    /// Log-normalization constant of the multiplier reweighting.
    pub log_z: f64,
    /// Log-normalization constant of the force-field pre-tilt, zero when no
    /// correction was applied.
    pub log_z_p: f64,
    /// Summed absolute difference between prior and posterior ensemble
    /// averages, a convergence sanity metric.
    pub abs_difference: f64,
    pub diagnostics: OptimizerDiagnostics,
}

impl SystemReport {
    /// This system's contribution to the aggregate loss at strength `alpha`.
    pub fn loss_contribution(&self, alpha: f64) -> f64 {
        0.5 * self.chi2.total + alpha * self.kl
    }
}

/// Aggregated outcome of a refinement run across all systems.
///
/// An entry exists for every system, converged or not; the per-system maps are
/// keyed by name so completion order never affects content.
#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    pub systems: BTreeMap<String, SystemReport>,
    /// Total loss: sum over systems of `1/2 * chi2 + alpha * D_KL`, plus the
    /// L2 penalty of the force-field parameters when they were supplied.
    pub loss: f64,
    pub alpha: f64,
    /// L2 penalty of the force-field parameters, if any were supplied.
    pub field_penalty: Option<f64>,
    pub kl_by_system: BTreeMap<String, f64>,
    pub chi2_by_system: BTreeMap<String, f64>,
    pub log_z_by_system: BTreeMap<String, f64>,
}

impl RefinementOutcome {
    /// Log-normalization constants of the force-field pre-tilt, the inputs to
    /// free-energy aggregation when a correction was applied.
    pub fn log_z_p_by_system(&self) -> BTreeMap<String, f64> {
        self.systems
            .iter()
            .map(|(name, report)| (name.clone(), report.log_z_p))
            .collect()
    }
}

/// Free-energy terms derived from log-normalization constants.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeEnergyReport {
    /// Per-system `-temperature * log_z` contributions.
    pub terms: BTreeMap<String, f64>,
    /// Double free-energy difference per thermodynamic cycle.
    pub cycles: BTreeMap<String, f64>,
    /// Mean over cycles, absent when the dataset defines none.
    pub mean: Option<f64>,
}
