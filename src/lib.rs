#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! A CNF evaluator built on canonical patterns rather than search.
//!
//! Formulas are expanded into a binary decision tree by Shannon splits, with
//! every intermediate formula brought to a linear-order normal form first.
//! Structurally identical subformulas then share one canonical body, one
//! content hash and one store record, so each distinct pattern is evaluated
//! exactly once no matter how often the expansion rederives it.

/// Command-line argument definitions for the solver binary.
pub mod command_line;

/// Clause and node types, canonicalization, splitting, and the solver loop.
pub mod sat;

/// Content-addressed persistence for canonical sets.
pub mod store;
