//! CLI layer for kg-prompt.
//!
//! Provides the command-line interface using clap, with commands for
//! running the full pipeline, each stage on its own, and template
//! scaffolding.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, ContextArgs, QueryArgs};
