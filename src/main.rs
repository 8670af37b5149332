//! Accumulator file CLI
//!
//! Generates payer accumulator batch files from a ledger export and reconciles
//! the payers' response files.
//!
//! # Usage
//!
//! ```bash
//! accumulator generate --payer summit --ledger ledger.csv --out-dir outbox
//! accumulator generate --payer keystone --ledger ledger.csv --out-dir outbox --env test --strategy sync
//! accumulator reconcile --payer northstar --response northstar_accum_resp_20261019.csv \
//!     --manifest outbox/NORTHSTAR_ACCUM_20261018_143000.csv.manifest.csv > outcomes.csv
//! ```
//!
//! `generate` writes the batch file and `<file>.manifest.csv` into the output
//! directory and prints the batch file path. `reconcile` prints the outcome CSV
//! and writes issues to `--issues-out` or the log.
//!
//! Logging goes to stderr; set `RUST_LOG` to change the level (default `info`).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (unreadable input, aborted batch, unrecognized response file, etc.)

use accumulator_files::cli;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = cli::parse_args();

    let mut output = std::io::stdout();
    if let Err(e) = cli::run(args, &mut output) {
        log::error!("{}", e);
        process::exit(1);
    }
}
