//! # pattern-solver
//!
//! A command-line CNF evaluator that expands formulas into a binary decision
//! tree by Shannon splits, canonicalizes every intermediate formula into
//! linear-order form, and deduplicates identical canonical subformulas
//! against a content-addressed store.
//!
//! ## Usage
//!
//! Exactly one input source must be given:
//!
//! ```sh
//! # single-line form
//! pattern-solver -l "a|b&-a|c"
//!
//! # the same, read from a file
//! pattern-solver --line-input-file formula.txt
//!
//! # DIMACS CNF
//! pattern-solver -d problem.cnf
//! ```
//!
//! The mode selector (`-m`) controls how aggressively canonicalization is
//! applied per tree level (`flo`, `flo+`, `lo`, `lou`, `normal`), `-t` sets
//! the worker count (0 = all cores), `-e` stops at the first solution, and
//! `--use-global-store` / `--use-frontier-store` enable the persistent
//! SQLite-backed stores.

use clap::Parser;
use pattern_solver::command_line::cli::Cli;
use pattern_solver::sat::error::SolverError;
use pattern_solver::sat::input::{parse_dimacs_file, parse_line_format};
use pattern_solver::sat::set::Set;
use pattern_solver::sat::solver::{PatternSolver, RunReport};
use pattern_solver::store::memory::MemoryStore;
use pattern_solver::store::sqlite::{SqliteFrontier, SqliteStore};
use pattern_solver::store::{FrontierStore, SetStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tikv_jemalloc_ctl::{epoch, stats};
use tracing_subscriber::EnvFilter;

/// Global allocator using `tikv-jemallocator`, which also backs the memory
/// figures in the statistics block.
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => {}
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(exit_code(&err));
        }
    }
}

/// Distinct exit codes per failure class, so scripts can tell malformed
/// input apart from store trouble.
fn exit_code(err: &SolverError) -> i32 {
    match err {
        SolverError::MalformedInput(_) => 3,
        SolverError::Store(_) => 4,
        _ => 1,
    }
}

fn init_tracing(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), SolverError> {
    let parse_start = Instant::now();
    let set = read_input(cli)?;
    let parse_time = parse_start.elapsed();

    let config = cli.solver_config();
    let store: Arc<dyn SetStore> = if cli.use_global_store {
        Arc::new(SqliteStore::open(&cli.store_path, "global")?)
    } else {
        Arc::new(MemoryStore::new())
    };

    let mut solver = PatternSolver::new(config.clone(), store);
    if cli.use_frontier_store {
        // One frontier table per process, dropped when the run ends.
        let namespace = format!("run_{}", std::process::id());
        let frontier: Arc<dyn FrontierStore> =
            Arc::new(SqliteFrontier::create(&cli.store_path, &namespace)?);
        solver = solver.with_frontier(frontier);
    }

    let solve_start = Instant::now();
    let report = solver.solve(set)?;
    let elapsed = solve_start.elapsed();

    println!(
        "{}",
        if report.satisfiable {
            "SATISFIABLE"
        } else {
            "UNSATISFIABLE"
        }
    );

    if !cli.no_stats {
        print_stats(parse_time, elapsed, &config.mode.to_string(), &report);
    }
    Ok(())
}

fn read_input(cli: &Cli) -> Result<Set, SolverError> {
    if let Some(line) = &cli.line_input {
        return parse_line_format(line);
    }
    if let Some(path) = &cli.line_input_file {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SolverError::MalformedInput(format!("cannot read {}: {e}", path.display()))
        })?;
        return parse_line_format(&text);
    }
    if let Some(path) = &cli.dimacs {
        return parse_dimacs_file(path);
    }
    // clap's required input group makes this unreachable.
    Err(SolverError::MalformedInput("no input provided".to_string()))
}

/// Helper function to print a single statistic line in the summary table.
fn stat_line(label: &str, value: impl std::fmt::Display) {
    println!("|  {:<28} {:>18}  |", label, value);
}

/// Helper function to print a statistic line that includes a rate
/// (value/second).
fn stat_line_with_rate(label: &str, value: u64, elapsed: f64) {
    let rate = if elapsed > 0.0 {
        value as f64 / elapsed
    } else {
        0.0
    };
    println!("|  {:<20} {:>12} ({:>9.0}/sec)  |", label, value, rate);
}

/// Prints a summary of run statistics, including memory usage as reported by
/// jemalloc.
fn print_stats(parse_time: Duration, elapsed: Duration, mode: &str, report: &RunReport) {
    let elapsed_secs = elapsed.as_secs_f64();

    // Advance the epoch so the allocator figures reflect the solving phase.
    epoch::advance().unwrap();
    let allocated_bytes = stats::allocated::mib().unwrap().read().unwrap();
    let resident_bytes = stats::resident::mib().unwrap().read().unwrap();
    let allocated_mib = allocated_bytes as f64 / (1024.0 * 1024.0);
    let resident_mib = resident_bytes as f64 / (1024.0 * 1024.0);

    println!("\n=========================[ Run Statistics ]==========================");
    stat_line("Parse time (s)", format!("{:.3}", parse_time.as_secs_f64()));
    stat_line("Mode", mode);
    stat_line("Root hash", report.root_hash.short());
    println!("=========================[ Node Statistics ]=========================");
    stat_line_with_rate("Unique nodes", report.unique_nodes, elapsed_secs);
    stat_line_with_rate("Redundant hits", report.redundant_hits, elapsed_secs);
    stat_line("Redundant nodes", report.redundant_nodes);
    stat_line("Stopped early", report.stopped_early);
    stat_line("Memory usage (MiB)", format!("{:.2}", allocated_mib));
    stat_line("Resident memory (MiB)", format!("{:.2}", resident_mib));
    stat_line("Solve time (s)", format!("{:.3}", elapsed_secs));
    println!("=====================================================================");
}
