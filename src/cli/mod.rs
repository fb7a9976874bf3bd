//! CLI module for the l7pool reconciler.
//!
//! This module provides the command-line interface for validating the pool
//! configuration and driving reconcile passes.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
