use mdrefit::core::io::load_dataset;
use mdrefit::core::models::correction::LinearCorrection;
use mdrefit::engine::config::RefinementConfigBuilder;
use mdrefit::engine::progress::ProgressReporter;
use mdrefit::workflows::{free_energy, refine};
use nalgebra::DVector;
use tracing::info;

use crate::cli::RunArgs;
use crate::error::Result;
use crate::report::{self, RunReport};
use crate::utils::progress::CliProgressHandler;

pub fn run(args: RunArgs) -> Result<()> {
    let dataset = load_dataset(&args.dataset)?;
    info!(
        systems = dataset.len(),
        cycles = dataset.cycles().len(),
        "Dataset loaded."
    );

    let mut builder = RefinementConfigBuilder::new().alpha(args.alpha);
    if let Some(iterations) = args.max_iterations {
        builder = builder.max_iterations(iterations);
    }
    if let Some(tolerance) = args.gradient_tolerance {
        builder = builder.gradient_tolerance(tolerance);
    }
    let config = builder.build()?;

    let progress = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress.get_callback());

    let parameters = (!args.field_params.is_empty())
        .then(|| DVector::from_vec(args.field_params.clone()));
    let field = parameters.map(|parameters| refine::FieldInput {
        correction: &LinearCorrection,
        parameters,
    });

    let outcome = refine::run(&dataset, &config, field.as_ref(), None, &reporter)?;

    let free_energy_report = if args.no_free_energy || dataset.cycles().is_empty() {
        None
    } else {
        // With a force-field correction the free energy comes from the
        // correction's normalization constants; otherwise the multiplier
        // reweighting is the only available tilt.
        let log_z = if field.is_some() {
            outcome.log_z_p_by_system()
        } else {
            outcome.log_z_by_system.clone()
        };
        Some(free_energy::run(&dataset, &log_z)?)
    };

    let report = RunReport::new(&outcome, free_energy_report.as_ref());
    report::write(&report, &args.output)?;

    let unconverged: Vec<&str> = outcome
        .systems
        .values()
        .filter(|system| !system.diagnostics.converged)
        .map(|system| system.name.as_str())
        .collect();
    println!(
        "Refined {} system(s) at alpha = {}; loss = {:.6}",
        outcome.systems.len(),
        outcome.alpha,
        outcome.loss
    );
    if let Some(report) = &free_energy_report {
        if let Some(mean) = report.mean {
            println!("Mean ΔΔG over {} cycle(s): {:.6}", report.cycles.len(), mean);
        }
    }
    if !unconverged.is_empty() {
        println!("⚠ Non-converged systems: {}", unconverged.join(", "));
    }
    println!("Report written to {}", args.output.display());

    Ok(())
}
