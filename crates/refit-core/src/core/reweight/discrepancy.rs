use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use crate::core::models::DataError;
use crate::core::models::observable::ObservableGroup;
use crate::core::models::system::DeviationMode;

/// Per-group agreement between ensemble-averaged predictions and experiment.
///
/// `averages` holds the weighted ensemble averages per group, `per_group` the
/// mean squared residual of each group, and `gradients` the derivative of each
/// group's chi-square with respect to its ensemble averages (the chain-rule
/// input for the dual objective). `total` is the sum over groups, or zero when
/// the evaluation was requested split by group.
#[derive(Debug, Clone, PartialEq)]
pub struct Chi2Report {
    pub averages: BTreeMap<String, DVector<f64>>,
    pub per_group: BTreeMap<String, f64>,
    pub gradients: BTreeMap<String, DVector<f64>>,
    pub total: f64,
}

/// Evaluates the chi-square discrepancy of a weighted ensemble.
///
/// For every observable group the predicted table is averaged over frames with
/// `weights`, residuals are formed against the experimental values respecting
/// the group's bound kind (one-sided bounds contribute only when violated),
/// and scaled by the uncertainty -- additionally by the experimental magnitude
/// in [`DeviationMode::Relative`] (which therefore requires nonzero
/// experimental values). Each group's chi-square is the *mean* of its squared
/// residuals, so groups of different sizes report on a common scale.
///
/// With `separate` the per-group values are reported without the combined
/// total, for diagnostics that inspect groups individually.
///
/// # Errors
///
/// Returns a [`DataError`] if the tables and groups are keyed inconsistently
/// or any table's frame count differs from the weight vector.
pub fn chi_squared(
    mode: DeviationMode,
    weights: &DVector<f64>,
    tables: &BTreeMap<String, DMatrix<f64>>,
    groups: &BTreeMap<String, ObservableGroup>,
    separate: bool,
) -> Result<Chi2Report, DataError> {
    if tables.len() != groups.len() || tables.keys().ne(groups.keys()) {
        return Err(DataError::LengthMismatch {
            context: "observable groups".to_string(),
            expected: groups.len(),
            found: tables.len(),
        });
    }

    let mut averages = BTreeMap::new();
    let mut per_group = BTreeMap::new();
    let mut gradients = BTreeMap::new();
    let mut total = 0.0;

    for (name, table) in tables {
        if table.nrows() != weights.len() {
            return Err(DataError::FrameCountMismatch {
                context: format!("table '{name}'"),
                expected: weights.len(),
                found: table.nrows(),
            });
        }
        let group = &groups[name];

        let average = table.transpose() * weights;
        let count = group.len();
        let mut sum_squared = 0.0;
        let mut gradient = DVector::zeros(count);

        for k in 0..count {
            let deviation = average[k] - group.values[k];
            let scale = match mode {
                DeviationMode::Absolute => group.uncertainties[k],
                DeviationMode::Relative => group.uncertainties[k] * group.values[k].abs(),
            };
            if group.bound.penalizes(deviation) {
                let residual = deviation / scale;
                sum_squared += residual * residual;
                gradient[k] = 2.0 * residual / (scale * count as f64);
            }
        }

        let chi2 = if count == 0 {
            0.0
        } else {
            sum_squared / count as f64
        };
        total += chi2;

        averages.insert(name.clone(), average);
        per_group.insert(name.clone(), chi2);
        gradients.insert(name.clone(), gradient);
    }

    Ok(Chi2Report {
        averages,
        per_group,
        gradients,
        total: if separate { 0.0 } else { total },
    })
}
