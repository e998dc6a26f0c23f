use std::io::Write;
use std::path::PathBuf;

use budget_unifier::consolidate::{self, ConsolidationRequest};
use budget_unifier::{Result, UnifyError};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging()?;

    let inputs = vec![cli.compositions, cli.abc, cli.synthetic];
    consolidate::validate_inputs(&inputs)?;
    let output = consolidate::build_output_path(cli.output.as_deref());

    let handle = consolidate::spawn_consolidation(ConsolidationRequest { inputs, output });
    let mut stderr = std::io::stderr();
    for event in handle.events().iter() {
        writeln!(stderr, "[{:>3}%] {}", event.percent, event.message)?;
    }
    let outcome = handle.join()?;

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&outcome.report)?;
        std::fs::write(path, json)?;
    }

    println!(
        "{} ({} formulas, {} warnings)",
        outcome.output.display(),
        outcome.report.formula_count(),
        outcome.report.warning_count()
    );
    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| UnifyError::Logging(error.to_string()))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Merge the composition, ABC curve and synthetic budget workbooks into one formula-driven budget."
)]
struct Cli {
    /// Workbook with the unit-price compositions.
    compositions: PathBuf,

    /// Workbook with the ABC curve of inputs.
    abc: PathBuf,

    /// Workbook with the synthetic budget.
    synthetic: PathBuf,

    /// Output file path. Defaults to a timestamped file in the downloads folder.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Writes the per-stage report as JSON to this path.
    #[arg(long)]
    report: Option<PathBuf>,
}
