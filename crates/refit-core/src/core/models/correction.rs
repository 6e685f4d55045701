use nalgebra::{DMatrix, DVector};

/// Contract for a user-supplied force-field correction.
///
/// Implementors map a parameter vector and a per-frame term table to a
/// per-frame energy correction, and expose the correction's Jacobian with
/// respect to the parameters so that callers optimizing the parameters can
/// obtain exact gradients. Implementations must be pure: same inputs, same
/// outputs, no side effects.
pub trait FieldCorrection {
    /// Per-frame correction energies for the given parameters.
    ///
    /// The returned vector must have one entry per row of `terms`.
    fn correction(&self, parameters: &DVector<f64>, terms: &DMatrix<f64>) -> DVector<f64>;

    /// Jacobian of the correction with respect to the parameters, shaped
    /// frames-by-parameters.
    fn jacobian(&self, parameters: &DVector<f64>, terms: &DMatrix<f64>) -> DMatrix<f64>;
}

/// Correction linear in the parameters: `terms * parameters`.
///
/// This covers the common case of per-frame energy decompositions whose
/// coefficients are being adjusted, and is the reference implementation used
/// by the command-line interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearCorrection;

impl FieldCorrection for LinearCorrection {
    fn correction(&self, parameters: &DVector<f64>, terms: &DMatrix<f64>) -> DVector<f64> {
        terms * parameters
    }

    fn jacobian(&self, _parameters: &DVector<f64>, terms: &DMatrix<f64>) -> DMatrix<f64> {
        terms.clone()
    }
}

/// Contract for a user-supplied forward model mapping raw simulated
/// quantities to predicted observables.
///
/// The model receives its adjustable coefficients and a frames-by-quantities
/// table and returns a frames-by-observables table. Implementations must be
/// pure and differentiable in the coefficients they accept.
pub trait ForwardModel {
    fn predict(&self, coefficients: &DVector<f64>, raw: &DMatrix<f64>) -> DMatrix<f64>;

    /// Restricts prediction to a subset of observable columns.
    ///
    /// The default computes the full table and selects columns; models with an
    /// expensive per-column cost can override this.
    fn predict_selected(
        &self,
        coefficients: &DVector<f64>,
        raw: &DMatrix<f64>,
        columns: &[usize],
    ) -> DMatrix<f64> {
        let full = self.predict(coefficients, raw);
        full.select_columns(columns)
    }
}

/// Element-wise quadratic forward model `a*q^2 + b*q + c` with coefficients
/// `[a, b, c]`, the shape used by scalar-coupling Karplus relations.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadraticForward;

impl ForwardModel for QuadraticForward {
    fn predict(&self, coefficients: &DVector<f64>, raw: &DMatrix<f64>) -> DMatrix<f64> {
        let (a, b, c) = (coefficients[0], coefficients[1], coefficients[2]);
        raw.map(|q| a * q * q + b * q + c)
    }
}
