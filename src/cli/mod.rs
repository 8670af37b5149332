// CLI module
// Command-line interface, argument parsing and subcommand drivers

mod args;

pub use args::{CliArgs, Command, GenerateArgs, ReconcileArgs, RunArgs, StrategyType};

use crate::io::{write_issues_csv, write_manifest, write_outcomes_csv};
use crate::payer::create_adapter;
use crate::strategy::{create_strategy, ProcessingStrategy};
use crate::types::AccumulationError;
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Parse command-line arguments using clap
///
/// If parsing fails (invalid arguments, missing required arguments, or
/// --help), clap displays an error message or help text and exits the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

fn strategy_for(run: &RunArgs) -> Box<dyn ProcessingStrategy> {
    let config = if matches!(run.strategy, StrategyType::Async) {
        Some(run.to_batch_config())
    } else {
        None
    };
    create_strategy(run.strategy, config)
}

fn create_file(path: &Path) -> Result<BufWriter<File>, AccumulationError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| AccumulationError::IoError {
            message: format!("Failed to create '{}': {}", path.display(), e),
        })
}

/// Run the selected subcommand
///
/// # Arguments
///
/// * `args` - Parsed command line
/// * `output` - Receives the batch file path (generate) or outcome CSV (reconcile)
pub fn run(args: CliArgs, output: &mut dyn Write) -> Result<(), AccumulationError> {
    match args.command {
        Command::Generate(args) => run_generate(&args, output),
        Command::Reconcile(args) => run_reconcile(&args, output),
    }
}

/// Generate a batch file and write it with its manifest into `--out-dir`
pub fn run_generate(args: &GenerateArgs, output: &mut dyn Write) -> Result<(), AccumulationError> {
    let adapter = create_adapter(args.run.payer, args.routing());
    let ctx = args.run.context();

    let file = strategy_for(&args.run).generate(&args.ledger, adapter, &ctx)?;

    std::fs::create_dir_all(&args.out_dir).map_err(|e| AccumulationError::IoError {
        message: format!("Failed to create '{}': {}", args.out_dir.display(), e),
    })?;

    let batch_path = args.out_dir.join(&file.file_name);
    std::fs::write(&batch_path, &file.bytes).map_err(|e| AccumulationError::IoError {
        message: format!("Failed to write '{}': {}", batch_path.display(), e),
    })?;

    let manifest_path = args.out_dir.join(format!("{}.manifest.csv", file.file_name));
    let mut manifest = create_file(&manifest_path)?;
    write_manifest(&file.batch.submission_records(), &mut manifest)?;
    manifest.flush()?;

    log::info!(
        "Wrote {} ({} details) and {}",
        batch_path.display(),
        file.batch.record_count(),
        manifest_path.display()
    );
    writeln!(output, "{}", batch_path.display())?;
    Ok(())
}

/// Reconcile a response file; outcomes go to `output`, issues to `--issues-out`
/// or the log
pub fn run_reconcile(args: &ReconcileArgs, output: &mut dyn Write) -> Result<(), AccumulationError> {
    let adapter = create_adapter(args.run.payer, None);
    let ctx = args.run.context();

    let report = strategy_for(&args.run).reconcile(
        &args.response,
        adapter,
        &ctx,
        &args.manifests,
        args.history_batches,
    )?;

    write_outcomes_csv(&report, output)?;

    match &args.issues_out {
        Some(path) => {
            let mut issues = create_file(path)?;
            write_issues_csv(&report.issues, &mut issues)?;
            issues.flush()?;
        }
        None => {
            for issue in &report.issues {
                log::warn!("{}", issue);
            }
        }
    }
    Ok(())
}
