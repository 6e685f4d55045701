use nalgebra::DVector;

/// Quadratic penalty on adjustable correction parameters.
///
/// Returns `sum(parameters^2)` and its gradient `2 * parameters`. Added to the
/// aggregate loss to keep optimized force-field parameters near zero.
pub fn l2_penalty(parameters: &DVector<f64>) -> (f64, DVector<f64>) {
    (parameters.norm_squared(), parameters.scale(2.0))
}
