use std::collections::BTreeMap;
use std::path::Path;

use mdrefit::engine::report::{FreeEnergyReport, RefinementOutcome, SystemReport};
use serde::Serialize;

use crate::error::{CliError, Result};

/// Serializable snapshot of a refinement run, written as TOML.
///
/// Floating-point values are emitted with shortest-round-trip formatting, so
/// reading the file back reproduces them exactly.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub alpha: f64,
    pub loss: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_penalty: Option<f64>,
    pub systems: BTreeMap<String, SystemSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_energy: Option<FreeEnergySummary>,
}

#[derive(Debug, Serialize)]
pub struct SystemSummary {
    pub converged: bool,
    pub iterations: u64,
    pub objective: f64,
    pub gradient_norm: f64,
    pub chi2: f64,
    pub kl: f64,
    pub log_z: f64,
    pub log_z_p: f64,
    pub abs_difference: f64,
    pub chi2_by_group: BTreeMap<String, f64>,
    pub lambdas: BTreeMap<String, Vec<f64>>,
    pub averages: BTreeMap<String, Vec<f64>>,
    pub weights: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct FreeEnergySummary {
    pub terms: BTreeMap<String, f64>,
    pub cycles: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
}

impl RunReport {
    pub fn new(outcome: &RefinementOutcome, free_energy: Option<&FreeEnergyReport>) -> Self {
        Self {
            alpha: outcome.alpha,
            loss: outcome.loss,
            field_penalty: outcome.field_penalty,
            systems: outcome
                .systems
                .iter()
                .map(|(name, report)| (name.clone(), SystemSummary::new(report)))
                .collect(),
            free_energy: free_energy.map(|report| FreeEnergySummary {
                terms: report.terms.clone(),
                cycles: report.cycles.clone(),
                mean: report.mean,
            }),
        }
    }
}

impl SystemSummary {
    fn new(report: &SystemReport) -> Self {
        Self {
            converged: report.diagnostics.converged,
            iterations: report.diagnostics.iterations,
            objective: report.diagnostics.objective,
            gradient_norm: report.diagnostics.gradient_norm,
            chi2: report.chi2.total,
            kl: report.kl,
            log_z: report.log_z,
            log_z_p: report.log_z_p,
            abs_difference: report.abs_difference,
            chi2_by_group: report.chi2.per_group.clone(),
            lambdas: to_plain(&report.lambdas),
            averages: to_plain(&report.chi2.averages),
            weights: report.weights.iter().copied().collect(),
        }
    }
}

fn to_plain(map: &BTreeMap<String, nalgebra::DVector<f64>>) -> BTreeMap<String, Vec<f64>> {
    map.iter()
        .map(|(name, vector)| (name.clone(), vector.iter().copied().collect()))
        .collect()
}

pub fn write(report: &RunReport, path: &Path) -> Result<()> {
    let rendered = toml::to_string_pretty(report).map_err(|source| CliError::Report {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;
    std::fs::write(path, rendered)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_and_round_trips_floats() {
        let mut systems = BTreeMap::new();
        systems.insert(
            "AAAA".to_string(),
            SystemSummary {
                converged: true,
                iterations: 12,
                objective: -0.123456789012345,
                gradient_norm: 1e-11,
                chi2: 0.5,
                kl: 0.25,
                log_z: -0.37988549,
                log_z_p: 0.0,
                abs_difference: 0.01,
                chi2_by_group: BTreeMap::from([("noes".to_string(), 0.5)]),
                lambdas: BTreeMap::from([("noes".to_string(), vec![0.1, -0.2])]),
                averages: BTreeMap::from([("noes".to_string(), vec![1.5, 2.5])]),
                weights: vec![0.73105858, 0.26894142],
            },
        );
        let report = RunReport {
            alpha: 1.5,
            loss: 0.875,
            field_penalty: None,
            systems,
            free_energy: None,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.toml");
        write(&report, &path).unwrap();

        let parsed: toml::Value = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let system = &parsed["systems"]["AAAA"];
        assert_eq!(
            system["objective"].as_float().unwrap(),
            -0.123456789012345
        );
        assert_eq!(system["weights"][0].as_float().unwrap(), 0.73105858);
        assert!(parsed.get("field_penalty").is_none());
    }
}
