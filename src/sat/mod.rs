#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! The core of the solver: clauses and formula nodes, linear-order
//! canonicalization, Shannon splitting, and the worker pool that drives them
//! against the store.

/// Linear-order canonicalization and the per-mode normalization policies.
pub mod canonical;

/// Clauses as ordered sequences of signed integer literals.
pub mod clause;

/// Run configuration and the canonicalization mode selector.
pub mod config;

/// The error taxonomy shared by the solver and the store boundary.
pub mod error;

/// Readers for the single-line and DIMACS CNF input forms.
pub mod input;

/// Formula nodes and their content hashes.
pub mod set;

/// The pattern solver worker pool.
pub mod solver;

/// Shannon expansion of a node into its two branches.
pub mod split;
