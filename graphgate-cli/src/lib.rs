//! Command-line front end for graphgate
//!
//! This crate provides:
//! - TOML config loading with environment variable expansion
//! - SQLite-based audit storage shared across processes
//! - Process and dry-run command executors
//! - An interactive approval prompt
//! - The `graphgate` subcommands and their text/JSON output

pub mod audit;
pub mod cli;
pub mod commands;
pub mod config;
mod error;
pub mod executor;
pub mod output;
pub mod prompt;

pub use audit::SqliteAuditSink;
pub use cli::Cli;
pub use commands::App;
pub use config::CliConfig;
pub use error::CliError;
pub use executor::{DryRunExecutor, ProcessExecutor};
pub use output::Format;
pub use prompt::{prompt_decision, DecisionPrompter, TerminalPrompter};
