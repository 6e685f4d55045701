use nalgebra::DVector;
use tracing::debug;

use crate::core::models::DataError;
use crate::core::models::correction::FieldCorrection;
use crate::core::models::system::System;
use crate::core::reweight::tilt::reweight;
use crate::engine::error::EngineError;

/// The prior ensemble tilted by a force-field correction.
#[derive(Debug, Clone)]
pub struct FieldShift {
    pub weights: DVector<f64>,
    pub log_z: f64,
}

/// Applies a force-field correction to a system's prior weights.
///
/// The user-supplied correction is evaluated on the system's per-frame term
/// table, divided by the system temperature, and used to exponentially tilt
/// the prior. Returns `None` for systems that carry no term table; those keep
/// their original prior and a zero log-normalization constant.
///
/// # Errors
///
/// Returns an error if the correction function produces a vector whose length
/// differs from the system's frame count, or if the tilt itself is degenerate.
pub fn run(
    system: &System,
    correction: &dyn FieldCorrection,
    parameters: &DVector<f64>,
) -> Result<Option<FieldShift>, EngineError> {
    let Some(terms) = system.ff_terms() else {
        return Ok(None);
    };

    let energies = correction.correction(parameters, terms);
    if energies.len() != system.frames() {
        return Err(DataError::FrameCountMismatch {
            context: format!("force-field correction of '{}'", system.name()),
            expected: system.frames(),
            found: energies.len(),
        }
        .into());
    }

    let reduced = energies / system.temperature();
    let tilted = reweight(system.weights(), &reduced)?;
    debug!(
        system = system.name(),
        log_z = tilted.log_z,
        "Applied force-field correction to prior ensemble."
    );

    Ok(Some(FieldShift {
        weights: tilted.weights,
        log_z: tilted.log_z,
    }))
}
