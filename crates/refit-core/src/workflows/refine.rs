use std::collections::BTreeMap;

use nalgebra::DVector;
use tracing::{info, instrument};

use crate::core::models::correction::FieldCorrection;
use crate::core::models::dataset::DataSet;
use crate::core::models::system::System;
use crate::core::reweight::penalty::l2_penalty;
use crate::engine::config::RefinementConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::report::{RefinementOutcome, SystemReport};
use crate::engine::tasks;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A force-field correction applied across the dataset: the user-supplied
/// differentiable function plus the parameter vector to evaluate it at.
///
/// Systems without a term table are left untouched.
pub struct FieldInput<'a> {
    pub correction: &'a (dyn FieldCorrection + Sync),
    pub parameters: DVector<f64>,
}

/// Refines every system of the dataset at the configured strength.
///
/// Per-system minimizations share no mutable state and run concurrently when
/// the `parallel` feature is enabled; results are merged by system name, so
/// completion order never affects the outcome. A system whose optimizer fails
/// to converge is recorded with `converged: false` and does not abort the run.
///
/// `initial_lambdas` optionally supplies flattened starting multipliers per
/// system name; systems without an entry start from zero.
///
/// # Errors
///
/// Returns [`EngineError::EmptyDataSet`] for a dataset without systems, and
/// propagates data-validation failures from the per-system tasks.
#[instrument(skip_all, name = "refinement_workflow")]
pub fn run(
    dataset: &DataSet,
    config: &RefinementConfig,
    field: Option<&FieldInput<'_>>,
    initial_lambdas: Option<&BTreeMap<String, DVector<f64>>>,
    reporter: &ProgressReporter,
) -> Result<RefinementOutcome, EngineError> {
    if dataset.is_empty() {
        return Err(EngineError::EmptyDataSet);
    }

    reporter.report(Progress::PhaseStart { name: "Refinement" });
    info!(
        systems = dataset.len(),
        alpha = config.alpha,
        "Starting ensemble refinement."
    );

    let entries: Vec<(&String, &System)> = dataset.systems().collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = entries.iter();

    #[cfg(feature = "parallel")]
    let iterator = entries.par_iter();

    let results: Vec<Result<SystemReport, EngineError>> = iterator
        .map(|(_, system)| refine_one(system, config, field, initial_lambdas, reporter))
        .collect();

    let mut systems = BTreeMap::new();
    for result in results {
        let report = result?;
        systems.insert(report.name.clone(), report);
    }

    let field_penalty = field.map(|input| l2_penalty(&input.parameters).0);
    let loss = systems
        .values()
        .map(|report| report.loss_contribution(config.alpha))
        .sum::<f64>()
        + field_penalty.unwrap_or(0.0);

    let kl_by_system = systems
        .iter()
        .map(|(name, report)| (name.clone(), report.kl))
        .collect();
    let chi2_by_system = systems
        .iter()
        .map(|(name, report)| (name.clone(), report.chi2.total))
        .collect();
    let log_z_by_system = systems
        .iter()
        .map(|(name, report)| (name.clone(), report.log_z))
        .collect();

    let unconverged = systems
        .values()
        .filter(|report| !report.diagnostics.converged)
        .count();
    info!(loss, unconverged, "Refinement complete.");
    reporter.report(Progress::PhaseFinish);

    Ok(RefinementOutcome {
        systems,
        loss,
        alpha: config.alpha,
        field_penalty,
        kl_by_system,
        chi2_by_system,
        log_z_by_system,
    })
}

fn refine_one(
    system: &System,
    config: &RefinementConfig,
    field: Option<&FieldInput<'_>>,
    initial_lambdas: Option<&BTreeMap<String, DVector<f64>>>,
    reporter: &ProgressReporter,
) -> Result<SystemReport, EngineError> {
    reporter.report(Progress::SystemStart {
        name: system.name().to_string(),
    });

    let shift = match field {
        Some(input) => tasks::ff_shift::run(system, input.correction, &input.parameters)?,
        None => None,
    };
    let (prior, log_z_p) = match &shift {
        Some(shift) => (&shift.weights, shift.log_z),
        None => (system.weights(), 0.0),
    };

    let initial = initial_lambdas.and_then(|guesses| guesses.get(system.name()));
    let report = tasks::refine::run(system, prior, log_z_p, config, initial)?;

    reporter.report(Progress::SystemFinish {
        name: system.name().to_string(),
        converged: report.diagnostics.converged,
    });
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::correction::{LinearCorrection, QuadraticForward, ForwardModel};
    use crate::core::models::observable::{BoundKind, ObservableGroup};
    use crate::core::reweight::discrepancy::chi_squared;
    use crate::engine::config::RefinementConfigBuilder;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    /// Two small systems built from a quadratic forward model over synthetic
    /// dihedral-like raw values; the second carries a linear force-field term
    /// table.
    fn two_system_dataset() -> DataSet {
        let mut dataset = DataSet::new();

        for (name, raw, targets, with_terms) in [
            (
                "AAAA",
                DMatrix::from_row_slice(4, 2, &[0.1, 0.9, 0.4, 0.3, 0.7, 0.5, 0.2, 0.8]),
                vec![1.1, 0.9],
                false,
            ),
            (
                "CAAU",
                DMatrix::from_row_slice(4, 2, &[0.3, 0.2, 0.8, 0.6, 0.5, 0.4, 0.9, 0.1]),
                vec![0.8, 1.2],
                true,
            ),
        ] {
            let coefficients = DVector::from_vec(vec![0.5, -1.0, 1.5]);
            let predicted = QuadraticForward.predict(&coefficients, &raw);

            let mut tables = BTreeMap::new();
            tables.insert("couplings".to_string(), predicted);
            let mut groups = BTreeMap::new();
            groups.insert(
                "couplings".to_string(),
                ObservableGroup::new(
                    DVector::from_vec(targets),
                    DVector::from_element(2, 0.15),
                    BoundKind::Equality,
                ),
            );

            let mut system = System::new(
                name,
                DVector::from_element(4, 0.25),
                tables,
                groups,
            )
            .unwrap();
            if with_terms {
                system = system
                    .with_ff_terms(DMatrix::from_row_slice(
                        4,
                        2,
                        &[0.0, 0.5, 1.0, 0.2, 0.5, 0.8, 0.2, 0.1],
                    ))
                    .unwrap();
            }
            dataset.insert_system(system);
        }

        dataset
    }

    fn config() -> RefinementConfig {
        RefinementConfigBuilder::new()
            .alpha(1.5)
            .gradient_tolerance(1e-10)
            .build()
            .unwrap()
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let err = run(
            &DataSet::new(),
            &config(),
            None,
            None,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::EmptyDataSet));
    }

    #[test]
    fn every_system_gets_a_report() {
        let dataset = two_system_dataset();
        let outcome = run(&dataset, &config(), None, None, &ProgressReporter::new()).unwrap();

        assert_eq!(outcome.systems.len(), 2);
        for name in ["AAAA", "CAAU"] {
            let report = &outcome.systems[name];
            assert!(report.diagnostics.converged);
            assert_relative_eq!(report.weights.sum(), 1.0, epsilon = 1e-10);
            assert_eq!(outcome.kl_by_system[name], report.kl);
            assert_eq!(outcome.chi2_by_system[name], report.chi2.total);
            assert_eq!(outcome.log_z_by_system[name], report.log_z);
        }
        assert!(outcome.field_penalty.is_none());
    }

    #[test]
    fn loss_aggregates_per_system_contributions() {
        let dataset = two_system_dataset();
        let outcome = run(&dataset, &config(), None, None, &ProgressReporter::new()).unwrap();

        let expected: f64 = outcome
            .systems
            .values()
            .map(|report| 0.5 * report.chi2.total + 1.5 * report.kl)
            .sum();
        assert_relative_eq!(outcome.loss, expected, epsilon = 1e-12);
        assert!(outcome.loss.is_finite());
        assert!(outcome.loss >= 0.0);
    }

    #[test]
    fn refinement_improves_every_system_fit() {
        let dataset = two_system_dataset();
        let outcome = run(&dataset, &config(), None, None, &ProgressReporter::new()).unwrap();

        for (name, system) in dataset.systems() {
            let prior_chi2 = chi_squared(
                system.mode(),
                system.weights(),
                system.tables(),
                system.groups(),
                false,
            )
            .unwrap()
            .total;
            assert!(outcome.systems[name].chi2.total < prior_chi2);
            assert!(outcome.systems[name].kl >= 0.0);
        }
    }

    #[test]
    fn field_correction_tilts_only_systems_with_terms() {
        let dataset = two_system_dataset();
        let field = FieldInput {
            correction: &LinearCorrection,
            parameters: DVector::from_vec(vec![0.4, -0.3]),
        };
        let outcome = run(
            &dataset,
            &config(),
            Some(&field),
            None,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(outcome.systems["AAAA"].log_z_p, 0.0);
        assert!(outcome.systems["CAAU"].log_z_p != 0.0);

        let (penalty, _) = l2_penalty(&field.parameters);
        assert_relative_eq!(outcome.field_penalty.unwrap(), penalty, epsilon = 1e-12);

        let expected: f64 = outcome
            .systems
            .values()
            .map(|report| 0.5 * report.chi2.total + 1.5 * report.kl)
            .sum::<f64>()
            + penalty;
        assert_relative_eq!(outcome.loss, expected, epsilon = 1e-12);
    }

    #[test]
    fn runs_are_deterministic() {
        let dataset = two_system_dataset();
        let first = run(&dataset, &config(), None, None, &ProgressReporter::new()).unwrap();
        let second = run(&dataset, &config(), None, None, &ProgressReporter::new()).unwrap();

        assert_eq!(first.loss, second.loss);
        for name in ["AAAA", "CAAU"] {
            assert_eq!(
                first.systems[name].diagnostics.variables,
                second.systems[name].diagnostics.variables
            );
            assert_eq!(first.systems[name].weights, second.systems[name].weights);
        }
    }

    #[test]
    fn initial_guesses_do_not_change_the_minimum() {
        let dataset = two_system_dataset();
        let baseline = run(&dataset, &config(), None, None, &ProgressReporter::new()).unwrap();

        let mut guesses = BTreeMap::new();
        guesses.insert("AAAA".to_string(), DVector::from_vec(vec![2.0, -1.0]));
        let guessed = run(
            &dataset,
            &config(),
            None,
            Some(&guesses),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_relative_eq!(baseline.loss, guessed.loss, epsilon = 1e-6);
        for k in 0..2 {
            assert_relative_eq!(
                baseline.systems["AAAA"].lambdas["couplings"][k],
                guessed.systems["AAAA"].lambdas["couplings"][k],
                epsilon = 1e-4
            );
        }
    }

    #[test]
    fn progress_events_cover_every_system() {
        use std::sync::Mutex;

        let dataset = two_system_dataset();
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|progress| {
            if let Progress::SystemFinish { name, converged } = progress {
                events.lock().unwrap().push((name, converged));
            }
        }));

        run(&dataset, &config(), None, None, &reporter).unwrap();
        drop(reporter);

        let mut seen = events.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "AAAA");
        assert_eq!(seen[1].0, "CAAU");
        assert!(seen.iter().all(|(_, converged)| *converged));
    }
}
