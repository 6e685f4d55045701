use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Marta Ceriotti, Jonas Albrecht",
    version,
    about = "Refit CLI - A command-line interface for maximum-entropy refinement of simulated ensembles against experimental observables.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refine a dataset of simulated ensembles against its experimental
    /// observables and write the result record.
    Run(RunArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the dataset manifest in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub dataset: PathBuf,

    /// Path for the output report in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Regularization strength balancing fit-to-experiment against
    /// divergence from the prior ensemble.
    #[arg(short, long, default_value_t = 1.0, value_name = "FLOAT")]
    pub alpha: f64,

    /// Override the maximum number of optimizer iterations per system.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<u64>,

    /// Override the gradient-norm tolerance of the optimizer.
    #[arg(long, value_name = "FLOAT")]
    pub gradient_tolerance: Option<f64>,

    /// Parameters of a linear force-field correction applied to systems that
    /// carry term tables, as a comma-separated list.
    #[arg(long, value_name = "FLOATS", value_delimiter = ',', num_args(1..))]
    pub field_params: Vec<f64>,

    /// Skip free-energy aggregation even when the dataset defines cycles.
    #[arg(long)]
    pub no_free_energy: bool,
}
