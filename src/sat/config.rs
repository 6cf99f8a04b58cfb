#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Solver configuration, passed explicitly into every component constructor.

use clap::ValueEnum;
use std::fmt;

/// How aggressively canonicalization is applied per tree level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// Every node is brought to linear-order form.
    #[default]
    Flo,
    /// Like `flo`, with clauses ordered shortest-first before renaming.
    #[value(name = "flo+")]
    FloPlus,
    /// Only the root reaches linear-order form; descendants are sorted but
    /// not renamed.
    Lo,
    /// Every node is sorted, none renamed.
    Lou,
    /// No preprocessing beyond sorting literals within each clause.
    Normal,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Flo => "flo",
            Self::FloPlus => "flo+",
            Self::Lo => "lo",
            Self::Lou => "lou",
            Self::Normal => "normal",
        };
        f.write_str(name)
    }
}

/// Run configuration. A plain value: no process-wide singletons.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub mode: Mode,
    /// Worker count; 0 means autodetect.
    pub threads: usize,
    /// Deduplicate against the persistent global store.
    pub use_global_store: bool,
    /// Persist the traversal frontier in the per-run store.
    pub use_frontier_store: bool,
    /// Stop all workers as soon as the root has a determined value.
    pub exit_on_solution: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Flo,
            threads: 1,
            use_global_store: false,
            use_frontier_store: false,
            exit_on_solution: false,
        }
    }
}

impl SolverConfig {
    /// Resolves `threads == 0` to the machine's available parallelism.
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            self.threads
        }
    }
}
