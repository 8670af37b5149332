//! Benchmark suite for comparing generation strategies
//!
//! This benchmark compares synchronous and asynchronous batch generation using
//! the divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//! ```
//!
//! # Benchmark Ledgers
//!
//! Ledgers are written to a temporary directory before timing starts, at
//! 100, 1,000 and 9,000 details, all within Summit's 9,999-detail batch
//! capacity.
//! Every fifth detail is a reversal and every third carries an HRA amount.
//! Both a delimited payer (NorthStar) and a fixed-width overpunch payer
//! (Summit) are measured.

use accumulator_files::cli::StrategyType;
use accumulator_files::payer::create_adapter;
use accumulator_files::strategy::{create_strategy, BatchConfig};
use accumulator_files::types::{Environment, PayerId, RunContext};
use chrono::NaiveDate;
use divan::Bencher;
use std::fmt::Write as _;
use std::path::PathBuf;
use tempfile::TempDir;

const SIZES: &[usize] = &[100, 1_000, 9_000];

const HEADER: &str = "source_record_id,subscriber_id,first_name,last_name,date_of_birth,sex,relationship,group_id,service_start_date,deductible_cents,oop_cents,hra_cents,is_reversal,is_regeneration,sequence_number,cached_unique_id";

fn main() {
    divan::main();
}

fn context() -> RunContext {
    let run_at = NaiveDate::from_ymd_opt(2026, 10, 18)
        .and_then(|d| d.and_hms_opt(14, 30, 0))
        .expect("valid timestamp");
    RunContext::new(run_at, Environment::Production)
}

/// Write a ledger of `count` details and keep its directory alive
fn ledger(count: usize) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut contents = format!("{}\n", HEADER);
    for i in 1..=count {
        let hra = if i % 3 == 0 { (i % 500).to_string() } else { String::new() };
        writeln!(
            contents,
            "cb-{i},{:011},Dana,Whitfield,1984-03-09,F,subscriber,GRP100,2026-09-30,{},{},{hra},{},,,",
            10_000_000_000u64 + i as u64,
            (i * 37) % 20_000,
            (i * 11) % 5_000,
            i % 5 == 0,
        )
        .expect("Failed to format ledger row");
    }
    let path = dir.path().join("ledger.csv");
    std::fs::write(&path, contents).expect("Failed to write ledger");
    (dir, path)
}

fn bench_generation(bencher: Bencher, payer: PayerId, strategy_type: StrategyType, count: usize) {
    let (_dir, path) = ledger(count);
    let config = match strategy_type {
        StrategyType::Async => Some(BatchConfig::default()),
        StrategyType::Sync => None,
    };
    let strategy = create_strategy(strategy_type, config);
    let adapter = create_adapter(payer, None);
    let ctx = context();

    bencher.bench_local(|| {
        strategy
            .generate(&path, adapter.clone(), &ctx)
            .expect("Generation failed")
    });
}

/// Benchmark synchronous generation of a NorthStar CSV batch
#[divan::bench(args = SIZES)]
fn sync_northstar(bencher: Bencher, count: usize) {
    bench_generation(bencher, PayerId::NorthStar, StrategyType::Sync, count);
}

/// Benchmark asynchronous generation of a NorthStar CSV batch
#[divan::bench(args = SIZES)]
fn async_northstar(bencher: Bencher, count: usize) {
    bench_generation(bencher, PayerId::NorthStar, StrategyType::Async, count);
}

/// Benchmark synchronous generation of a Summit fixed-width batch
#[divan::bench(args = SIZES)]
fn sync_summit(bencher: Bencher, count: usize) {
    bench_generation(bencher, PayerId::Summit, StrategyType::Sync, count);
}

/// Benchmark asynchronous generation of a Summit fixed-width batch
#[divan::bench(args = SIZES)]
fn async_summit(bencher: Bencher, count: usize) {
    bench_generation(bencher, PayerId::Summit, StrategyType::Async, count);
}
