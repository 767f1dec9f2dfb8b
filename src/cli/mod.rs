//! Command-line interface for kongctl.
//!
//! Argument definitions live in [`commands`]; rendering of records,
//! listings and reconcile reports in [`output`].

mod commands;
mod output;

pub use commands::{
    Cli, Commands, ConfigTarget, CreateTarget, DumpTarget, GetTarget, ItemTarget, ListTarget,
    OutputFormat,
};
pub use output::OutputFormatter;
