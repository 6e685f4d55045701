use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::Deserialize;

use super::DataError;
use super::observable::ObservableGroup;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Whether residuals are taken as absolute deviations from experiment or
/// relative to the experimental magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviationMode {
    #[default]
    Absolute,
    Relative,
}

/// One molecular species/state: prior frame weights, per-group predicted
/// observable tables, the matching experimental groups, and optional
/// force-field correction terms.
///
/// A `System` is validated on construction and immutable afterwards; every
/// table is guaranteed to share the frame count of the prior weights, and the
/// weights are guaranteed non-negative and normalized.
#[derive(Debug, Clone)]
pub struct System {
    name: String,
    weights: DVector<f64>,
    tables: BTreeMap<String, DMatrix<f64>>,
    groups: BTreeMap<String, ObservableGroup>,
    ff_terms: Option<DMatrix<f64>>,
    mode: DeviationMode,
    temperature: f64,
}

impl System {
    /// Builds a validated system from prior weights, predicted tables and the
    /// experimental groups keyed by the same names.
    ///
    /// # Errors
    ///
    /// Returns a [`DataError`] if the weights are empty, negative, non-finite
    /// or not normalized within tolerance; if a predicted table's frame count
    /// differs from the weight vector; if a table's column count differs from
    /// its group's observable count; if a group and table set are keyed
    /// inconsistently; or if any uncertainty is non-positive.
    pub fn new(
        name: impl Into<String>,
        weights: DVector<f64>,
        tables: BTreeMap<String, DMatrix<f64>>,
        groups: BTreeMap<String, ObservableGroup>,
    ) -> Result<Self, DataError> {
        let name = name.into();
        let frames = weights.len();

        if frames == 0 {
            return Err(DataError::EmptySystem { system: name });
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(DataError::InvalidWeight { system: name });
        }
        let sum: f64 = weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(DataError::WeightsNotNormalized { system: name, sum });
        }

        if tables.len() != groups.len() || tables.keys().ne(groups.keys()) {
            return Err(DataError::LengthMismatch {
                context: format!("observable groups of '{name}'"),
                expected: groups.len(),
                found: tables.len(),
            });
        }

        for (group_name, table) in &tables {
            if table.nrows() != frames {
                return Err(DataError::FrameCountMismatch {
                    context: format!("table '{group_name}' of '{name}'"),
                    expected: frames,
                    found: table.nrows(),
                });
            }
            let group = &groups[group_name];
            if table.ncols() != group.len() {
                return Err(DataError::LengthMismatch {
                    context: format!("group '{group_name}' of '{name}'"),
                    expected: group.len(),
                    found: table.ncols(),
                });
            }
            if group.uncertainties.len() != group.len() {
                return Err(DataError::LengthMismatch {
                    context: format!("uncertainties of '{group_name}' in '{name}'"),
                    expected: group.len(),
                    found: group.uncertainties.len(),
                });
            }
            for (index, sigma) in group.uncertainties.iter().enumerate() {
                if !sigma.is_finite() || *sigma <= 0.0 {
                    return Err(DataError::NonPositiveUncertainty {
                        group: group_name.clone(),
                        index,
                    });
                }
            }
        }

        Ok(Self {
            name,
            weights,
            tables,
            groups,
            ff_terms: None,
            mode: DeviationMode::Absolute,
            temperature: 1.0,
        })
    }

    /// Attaches a per-frame force-field term table, enabling correction of the
    /// prior ensemble as a function of adjustable parameters.
    pub fn with_ff_terms(mut self, terms: DMatrix<f64>) -> Result<Self, DataError> {
        if terms.nrows() != self.frames() {
            return Err(DataError::FrameCountMismatch {
                context: format!("force-field terms of '{}'", self.name),
                expected: self.frames(),
                found: terms.nrows(),
            });
        }
        self.ff_terms = Some(terms);
        Ok(self)
    }

    pub fn with_mode(mut self, mode: DeviationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Result<Self, DataError> {
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(DataError::InvalidTemperature {
                system: self.name.clone(),
                value: temperature,
            });
        }
        self.temperature = temperature;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frames(&self) -> usize {
        self.weights.len()
    }

    /// Prior per-frame statistical weights. Invariant after construction.
    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    pub fn tables(&self) -> &BTreeMap<String, DMatrix<f64>> {
        &self.tables
    }

    pub fn groups(&self) -> &BTreeMap<String, ObservableGroup> {
        &self.groups
    }

    pub fn table(&self, group: &str) -> Option<&DMatrix<f64>> {
        self.tables.get(group)
    }

    pub fn group(&self, group: &str) -> Option<&ObservableGroup> {
        self.groups.get(group)
    }

    /// Number of scalar observables per group.
    pub fn observable_counts(&self) -> BTreeMap<String, usize> {
        self.groups
            .iter()
            .map(|(name, group)| (name.clone(), group.len()))
            .collect()
    }

    /// Total number of scalar experimental constraints across all groups.
    pub fn total_observables(&self) -> usize {
        self.groups.values().map(ObservableGroup::len).sum()
    }

    pub fn ff_terms(&self) -> Option<&DMatrix<f64>> {
        self.ff_terms.as_ref()
    }

    pub fn mode(&self) -> DeviationMode {
        self.mode
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}
