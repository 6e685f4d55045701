use nalgebra::DVector;

use crate::core::models::DataError;

/// A prior weight vector tilted by an energy correction: normalized posterior
/// weights plus the log of the normalization constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Tilted {
    pub weights: DVector<f64>,
    pub log_z: f64,
}

/// Exponentially tilts `prior` by `correction`: the posterior is proportional
/// to `prior * exp(-correction)`, normalized to sum to one.
///
/// The normalization is evaluated as a shifted log-sum-exp so that large
/// correction magnitudes cannot overflow; frames whose correction is `+inf`
/// or NaN receive zero posterior weight. `log_z` is the log of the exact
/// normalization constant, `log(sum(prior * exp(-correction)))`.
///
/// # Errors
///
/// Returns [`DataError::LengthMismatch`] if `prior` and `correction` differ in
/// length, and [`DataError::NonFiniteCorrection`] if no correction entry is
/// finite (the posterior would be degenerate).
pub fn reweight(prior: &DVector<f64>, correction: &DVector<f64>) -> Result<Tilted, DataError> {
    if prior.len() != correction.len() {
        return Err(DataError::LengthMismatch {
            context: "correction vector".to_string(),
            expected: prior.len(),
            found: correction.len(),
        });
    }

    // exp(-(c - shift)) <= 1 for every finite entry once shifted by the
    // smallest finite correction.
    let shift = correction
        .iter()
        .copied()
        .filter(|c| c.is_finite())
        .fold(f64::INFINITY, f64::min);
    if !shift.is_finite() {
        return Err(DataError::NonFiniteCorrection);
    }

    let unnormalized = DVector::from_iterator(
        prior.len(),
        prior.iter().zip(correction.iter()).map(|(w, c)| {
            if c.is_finite() {
                w * (-(c - shift)).exp()
            } else {
                0.0
            }
        }),
    );

    let total = unnormalized.sum();
    let log_z = total.ln() - shift;

    Ok(Tilted {
        weights: unnormalized / total,
        log_z,
    })
}
