mod input;
mod report;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use deabook_core::{
    DeaError, Direction, Disposability, Engine, Formulation, ModelSpec, Orientation, ReturnsToScale, registry,
};
use tracing_subscriber::EnvFilter;

use crate::input::ColumnSelection;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "deabook")]
#[command(about = "Data Envelopment Analysis efficiency scores for CSV data", long_about = None)]
struct Cli {
    /// Log debug output to stderr (overridden by DEABOOK_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every unit of a CSV dataset
    Solve {
        /// CSV file with a header row
        file: PathBuf,
        /// Input columns, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        inputs: Vec<String>,
        /// Output columns, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        outputs: Vec<String>,
        /// Undesirable output columns for ddf, comma separated
        #[arg(short, long, value_delimiter = ',')]
        undesirables: Vec<String>,
        /// Unit identifier column (defaults to the first column)
        #[arg(long)]
        id: Option<String>,
        /// Model: ccr, bcc, radial, additive, super or ddf
        #[arg(short, long, default_value = "ccr")]
        model: String,
        /// input, output or none (ddf defaults to none, everything else to input)
        #[arg(long)]
        orientation: Option<Orientation>,
        /// crs, vrs, nirs or ndrs
        #[arg(long)]
        rts: Option<ReturnsToScale>,
        /// Direction for ddf
        #[arg(long, value_enum, default_value_t = DirectionArg::Observed)]
        direction: DirectionArg,
        /// Input direction components when --direction custom
        #[arg(long, value_delimiter = ',')]
        gx: Vec<f64>,
        /// Output direction components when --direction custom
        #[arg(long, value_delimiter = ',')]
        gy: Vec<f64>,
        /// Undesirable output direction components when --direction custom
        #[arg(long, value_delimiter = ',')]
        gb: Vec<f64>,
        /// weak or strong disposability of undesirable outputs (ddf)
        #[arg(long)]
        disposability: Option<Disposability>,
        /// Per-unit solve timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Worker threads (0 = one per core)
        #[arg(long)]
        threads: Option<usize>,
        /// JSON settings file
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Exit with an error if any unit failed
        #[arg(long)]
        strict: bool,
    },
    /// List the supported model combinations
    Models,
    /// Load and validate a CSV dataset without solving
    Check {
        file: PathBuf,
        #[arg(short, long, value_delimiter = ',', required = true)]
        inputs: Vec<String>,
        #[arg(short, long, value_delimiter = ',', required = true)]
        outputs: Vec<String>,
        #[arg(short, long, value_delimiter = ',')]
        undesirables: Vec<String>,
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DirectionArg {
    Observed,
    Unit,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("DEABOOK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Solve {
            file,
            inputs,
            outputs,
            undesirables,
            id,
            model,
            orientation,
            rts,
            direction,
            gx,
            gy,
            gb,
            disposability,
            timeout_ms,
            threads,
            config,
            format,
            strict,
        } => {
            let mut spec = model_spec(&model, orientation, rts, direction_from(direction, gx, gy, gb)?)?;
            if let Some(disposability) = disposability {
                if spec.formulation() != Formulation::Directional {
                    bail!("--disposability only applies to --model ddf");
                }
                spec = spec.with_disposability(disposability);
            }
            let settings = match config {
                Some(path) => Settings::load(&path)?,
                None => Settings::default(),
            };
            let dataset = input::load_csv(
                &file,
                &ColumnSelection {
                    id: id.as_deref(),
                    inputs: &inputs,
                    outputs: &outputs,
                    undesirables: &undesirables,
                },
            )?;
            tracing::debug!(units = dataset.len(), model = %spec, "dataset loaded");

            let engine = Engine::new(settings.engine_config(timeout_ms, threads));
            let report = engine
                .run(&dataset, &spec)
                .with_context(|| format!("Error running {spec} on {}", file.display()))?;

            match format {
                OutputFormat::Table => print!("{}", report::render_table(&dataset, &report)),
                OutputFormat::Json => println!("{}", report::render_json(&report)?),
            }

            let mut code = ExitCode::SUCCESS;
            for failure in report.table.failures() {
                eprintln!("{}: {}", failure.dmu, failure.error);
                if strict || matches!(failure.error, DeaError::ModelInfeasible { .. }) {
                    code = ExitCode::FAILURE;
                }
            }
            Ok(code)
        }
        Commands::Models => {
            println!("{:<18} {:<14} RTS", "Formulation", "Orientation");
            for (formulation, orientation, rts) in registry::supported() {
                println!("{:<18} {:<14} {rts}", formulation.to_string(), orientation.to_string());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            file,
            inputs,
            outputs,
            undesirables,
            id,
        } => {
            let dataset = input::load_csv(
                &file,
                &ColumnSelection {
                    id: id.as_deref(),
                    inputs: &inputs,
                    outputs: &outputs,
                    undesirables: &undesirables,
                },
            )?;
            println!(
                "{}: {} units, {} inputs, {} outputs, {} undesirable outputs",
                file.display(),
                dataset.len(),
                dataset.num_inputs(),
                dataset.num_outputs(),
                dataset.num_undesirables()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn direction_from(arg: DirectionArg, gx: Vec<f64>, gy: Vec<f64>, gb: Vec<f64>) -> Result<Direction> {
    match arg {
        DirectionArg::Observed | DirectionArg::Unit if !gx.is_empty() || !gy.is_empty() || !gb.is_empty() => {
            bail!("--gx/--gy/--gb only apply with --direction custom")
        }
        DirectionArg::Observed => Ok(Direction::Observed),
        DirectionArg::Unit => Ok(Direction::Unit),
        DirectionArg::Custom => Ok(Direction::Custom {
            inputs: gx,
            outputs: gy,
            undesirables: gb,
        }),
    }
}

/// Turn the `--model` shorthand plus explicit flags into a model selection
fn model_spec(
    model: &str,
    orientation: Option<Orientation>,
    rts: Option<ReturnsToScale>,
    direction: Direction,
) -> Result<ModelSpec> {
    let (formulation, implied_rts) = match model.to_ascii_lowercase().as_str() {
        "ccr" => (Formulation::Radial, Some(ReturnsToScale::Constant)),
        "bcc" => (Formulation::Radial, Some(ReturnsToScale::Variable)),
        other => (other.parse::<Formulation>()?, None),
    };

    let rts = match (implied_rts, rts) {
        (Some(implied), Some(given)) if implied != given => {
            bail!("--model {model} implies {implied}; drop --rts {given} or use --model radial")
        }
        (Some(implied), _) => implied,
        (None, given) => given.unwrap_or(ReturnsToScale::Constant),
    };

    let orientation = orientation.unwrap_or(match formulation {
        Formulation::Directional => Orientation::NonOriented,
        _ => Orientation::Input,
    });

    if formulation != Formulation::Directional && direction != Direction::Observed {
        bail!("--direction only applies to --model ddf");
    }

    Ok(ModelSpec::new(formulation, orientation, rts).with_direction(direction))
}
