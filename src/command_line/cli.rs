#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Defines the command-line interface for the pattern solver.
//!
//! Uses `clap` for parsing arguments. Exactly one input source must be
//! given; conflicting or missing flags exit with a non-zero status before
//! any solving begins.

use crate::sat::config::{Mode, SolverConfig};
use clap::{ArgAction, ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pattern-solver", version, about = "A pattern-based CNF evaluator")]
#[command(group(
    ArgGroup::new("input")
        .required(true)
        .args(["line_input", "line_input_file", "dimacs"])
))]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// The input set in one line. Format: a|b|c&d|e|f ...
    #[arg(short = 'l', long)]
    pub line_input: Option<String>,

    /// A file containing the input set in one line. Format: a|b|c&d|e|f ...
    #[arg(long)]
    pub line_input_file: Option<PathBuf>,

    /// A file containing the input set in DIMACS CNF format.
    #[arg(short = 'd', long)]
    pub dimacs: Option<PathBuf>,

    /// Solution mode, controlling how aggressively nodes are brought to
    /// linear-order form per tree level.
    #[arg(short, long, value_enum, default_value_t = Mode::Flo)]
    pub mode: Mode,

    /// Number of worker threads. 1 means no multithreading, 0 means as many
    /// workers as the machine has cores.
    #[arg(short, long, default_value_t = 1)]
    pub threads: usize,

    /// Exit as soon as a solution is found instead of walking the whole tree.
    #[arg(short, long)]
    pub exit_upon_solving: bool,

    /// Deduplicate against the persistent global store instead of an
    /// in-memory one.
    #[arg(long)]
    pub use_global_store: bool,

    /// Persist the traversal frontier in a per-run table, dropped at run end.
    #[arg(long)]
    pub use_frontier_store: bool,

    /// Path of the store database file.
    #[arg(long, default_value = "patterns.db")]
    pub store_path: PathBuf,

    /// Short concise output without the statistics block.
    #[arg(long)]
    pub no_stats: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// No log output except errors.
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// The solver configuration these flags describe.
    #[must_use]
    pub const fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            mode: self.mode,
            threads: self.threads,
            use_global_store: self.use_global_store,
            use_frontier_store: self.use_frontier_store,
            exit_on_solution: self.exit_upon_solving,
        }
    }
}
