//! Command-line argument definitions
//!
//! Two subcommands share a set of run options (payer, environment, clock,
//! strategy and batch tuning):
//!
//! ```text
//! accumulator generate  --payer P --ledger FILE --out-dir DIR [run options]
//! accumulator reconcile --payer P --response FILE --manifest FILE... [run options]
//! ```

use crate::core::DEFAULT_HISTORY_BATCHES;
use crate::payer::{default_routing, RoutingConfig};
use crate::strategy::BatchConfig;
use crate::types::{Environment, PayerId, RunContext};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Accumulator batch file generator and response reconciler
#[derive(Parser, Debug)]
#[command(name = "accumulator")]
#[command(about = "Generate payer accumulator files and reconcile their responses", long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate one batch file from a ledger export
    Generate(GenerateArgs),
    /// Reconcile a payer response file against submission manifests
    Reconcile(ReconcileArgs),
}

/// Options shared by both subcommands
#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long, value_name = "PAYER", help = "Target payer: northstar, keystone or summit")]
    pub payer: PayerId,

    #[arg(
        long = "env",
        value_name = "ENV",
        default_value = "production",
        help = "Environment: production, staging or test"
    )]
    pub environment: Environment,

    #[arg(
        long = "run-at",
        value_name = "TIMESTAMP",
        value_parser = parse_run_at,
        help = "Run timestamp as YYYY-MM-DDTHH:MM:SS or YYYYMMDDHHMMSS (default: now)"
    )]
    pub run_at: Option<NaiveDateTime>,

    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for single-threaded or 'async' for multi-threaded"
    )]
    pub strategy: StrategyType,

    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Records per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Worker threads for the async strategy (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[arg(long, value_name = "FILE", help = "Ledger export CSV")]
    pub ledger: PathBuf,

    #[arg(long = "out-dir", value_name = "DIR", help = "Directory for the batch file and its manifest")]
    pub out_dir: PathBuf,

    #[arg(long = "sender-id", value_name = "ID", help = "Override the payer's default sender id")]
    pub sender_id: Option<String>,

    #[arg(long = "receiver-id", value_name = "ID", help = "Override the payer's default receiver id")]
    pub receiver_id: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[arg(long, value_name = "FILE", help = "Payer response file")]
    pub response: PathBuf,

    #[arg(
        long = "manifest",
        value_name = "FILE",
        num_args = 1..,
        help = "Submission manifests, oldest first"
    )]
    pub manifests: Vec<PathBuf>,

    #[arg(
        long = "history-batches",
        value_name = "COUNT",
        default_value_t = DEFAULT_HISTORY_BATCHES,
        help = "Most recent batches kept for matching"
    )]
    pub history_batches: usize,

    #[arg(long = "issues-out", value_name = "FILE", help = "Write issues as CSV instead of logging them")]
    pub issues_out: Option<PathBuf>,
}

/// Processing strategy selector
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

fn parse_run_at(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S"))
        .map_err(|_| format!("Invalid run timestamp '{}'", value))
}

impl RunArgs {
    /// Run context, using the local clock when no timestamp was given
    pub fn context(&self) -> RunContext {
        let run_at = self
            .run_at
            .unwrap_or_else(|| chrono::Local::now().naive_local());
        RunContext::new(run_at, self.environment)
    }

    /// Convert CLI arguments to BatchConfig
    ///
    /// Zero values fall back to defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }
}

impl GenerateArgs {
    /// Routing overrides on top of the payer defaults, if any were given
    pub fn routing(&self) -> Option<RoutingConfig> {
        if self.sender_id.is_none() && self.receiver_id.is_none() {
            return None;
        }
        Some(
            default_routing(self.run.payer)
                .overridden(self.sender_id.clone(), self.receiver_id.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const GENERATE: &[&str] = &[
        "accumulator",
        "generate",
        "--payer",
        "summit",
        "--ledger",
        "ledger.csv",
        "--out-dir",
        "out",
    ];

    fn generate_with(extra: &[&str]) -> GenerateArgs {
        let args: Vec<&str> = GENERATE.iter().chain(extra).copied().collect();
        match CliArgs::try_parse_from(args).unwrap().command {
            Command::Generate(args) => args,
            other => panic!("expected generate, got {other:?}"),
        }
    }

    #[rstest]
    #[case::default_strategy(&[], StrategyType::Async)]
    #[case::explicit_sync(&["--strategy", "sync"], StrategyType::Sync)]
    #[case::explicit_async(&["--strategy", "async"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] extra: &[&str], #[case] expected: StrategyType) {
        assert_eq!(generate_with(extra).run.strategy, expected);
    }

    #[rstest]
    #[case::all_defaults(&[], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["--batch-size", "2000"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["--max-concurrent", "8"], 1000, 8)]
    #[case::zero_batch_size(&["--batch-size", "0"], 1000, num_cpus::get())]
    #[case::zero_max_concurrent(&["--batch-size", "50", "--max-concurrent", "0"], 50, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] extra: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = generate_with(extra).run.to_batch_config();
        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[rstest]
    #[case("2026-10-18T14:30:00")]
    #[case("20261018143000")]
    fn test_run_at_formats(#[case] value: &str) {
        let args = generate_with(&["--run-at", value, "--env", "stg"]);
        let ctx = args.run.context();
        assert_eq!(ctx.timestamp_token(), "20261018143000");
        assert_eq!(ctx.environment, Environment::Staging);
    }

    #[test]
    fn test_invalid_run_at_is_rejected() {
        let args: Vec<&str> = GENERATE
            .iter()
            .copied()
            .chain(["--run-at", "yesterday"])
            .collect();
        assert!(CliArgs::try_parse_from(args).is_err());
    }

    #[test]
    fn test_unknown_payer_is_rejected() {
        let result = CliArgs::try_parse_from([
            "accumulator", "generate", "--payer", "acme", "--ledger", "l.csv", "--out-dir", "o",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_routing_overrides() {
        assert_eq!(generate_with(&[]).routing(), None);

        let routing = generate_with(&["--sender-id", "HUB2"]).routing().unwrap();
        assert_eq!(routing.sender_id, "HUB2");
        assert_eq!(routing.receiver_id, default_routing(PayerId::Summit).receiver_id);
    }

    #[test]
    fn test_reconcile_arguments() {
        let parsed = CliArgs::try_parse_from([
            "accumulator",
            "reconcile",
            "--payer",
            "northstar",
            "--response",
            "resp.csv",
            "--manifest",
            "a.manifest.csv",
            "b.manifest.csv",
            "--issues-out",
            "issues.csv",
        ])
        .unwrap();

        match parsed.command {
            Command::Reconcile(args) => {
                assert_eq!(args.run.payer, PayerId::NorthStar);
                assert_eq!(args.manifests.len(), 2);
                assert_eq!(args.history_batches, DEFAULT_HISTORY_BATCHES);
                assert_eq!(args.issues_out, Some(PathBuf::from("issues.csv")));
            }
            other => panic!("expected reconcile, got {other:?}"),
        }
    }
}
