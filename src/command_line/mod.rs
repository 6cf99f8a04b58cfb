#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Command-line argument definitions for the solver binary.

pub mod cli;
