//! critsim command-line interface.

mod config;
mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use critsim::{
    CircuitTemplate, ErrorLog, ExternalJobRunner, GoldenReference, MergeConfig, RunContext,
    SimulationJob, execute, load_golden_file, merge_to_file, save_golden_file,
};

use crate::config::{GoldenSource, ScenarioConfig};

#[derive(Parser)]
#[command(name = "critsim")]
#[command(about = "Critical perturbation search over circuit simulations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario
    Run {
        /// Scenario JSON file
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,

        /// Output root (overrides the scenario's root)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Jobs in flight at the sweep or Monte Carlo level
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Merge result files column by column
    Merge {
        /// Zero-based columns to reduce, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<usize>,

        /// Index of the file other cells are copied from
        #[arg(long, default_value_t = 0)]
        reference: usize,

        /// Write mean, max and min instead of the mean
        #[arg(long)]
        statistic: bool,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match cli.command {
        Command::Run {
            scenario,
            root,
            jobs,
        } => run_scenario(&scenario, root, jobs),
        Command::Merge {
            columns,
            reference,
            statistic,
            output,
            files,
        } => {
            let config = MergeConfig::new(columns)
                .with_reference(reference)
                .with_statistic(statistic);
            merge_to_file(&files, &config, &output)
                .with_context(|| format!("Failed to merge into {}", output.display()))?;
            println!("Merged {} files into {}", files.len(), output.display());
            Ok(())
        }
    }
}

fn run_scenario(path: &Path, root: Option<PathBuf>, jobs: Option<usize>) -> Result<()> {
    let mut scenario = ScenarioConfig::load(path)?;
    if let Some(jobs) = jobs {
        scenario.set_jobs(jobs);
    }
    let root = root
        .or_else(|| scenario.root.clone())
        .unwrap_or_else(|| PathBuf::from(&scenario.name));
    std::fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create output root: {}", root.display()))?;

    let errors = Arc::new(ErrorLog::open(root.join("errors.log"))?);
    let ctx = RunContext::new(scenario.name.clone(), errors);

    let params = scenario.parameter_set()?;
    let template = CircuitTemplate::load(&scenario.template)?;
    let golden = prepare_golden(&scenario, &template, &root, &ctx)?;
    log::info!(
        "golden reference: {} signals, {} tracked",
        golden.signals().len(),
        scenario.signals.len()
    );

    let runner = ExternalJobRunner::new(
        scenario.simulator.clone(),
        template,
        scenario.signals.clone(),
        Arc::new(golden),
    )?
    .with_layout(scenario.layout)
    .with_format(scenario.format);

    let outcome = execute(&scenario.run, runner, &params, &root, &ctx).map_err(|e| {
        ctx.error(format_args!("run failed: {e}"));
        e
    })?;

    println!("{}: {outcome}", scenario.name);
    Ok(())
}

/// Load the golden file, or simulate the unperturbed circuit and save it
/// as `<root>/golden.json`.
fn prepare_golden(
    scenario: &ScenarioConfig,
    template: &CircuitTemplate,
    root: &Path,
    ctx: &RunContext,
) -> Result<GoldenReference> {
    match &scenario.golden {
        GoldenSource::File { path } => Ok(load_golden_file(path)?),
        GoldenSource::Simulate => {
            let job = SimulationJob::new("golden", root.join("golden"), scenario.parameter_set()?);
            let golden = ExternalJobRunner::run_golden(
                &scenario.simulator,
                template,
                &scenario.signals,
                scenario.layout,
                &job,
                &ctx.child("golden"),
            )?;
            let path = root.join("golden.json");
            save_golden_file(&path, &golden, &format!("golden run of {}", scenario.name))?;
            log::info!("saved golden reference to {}", path.display());
            Ok(golden)
        }
    }
}
