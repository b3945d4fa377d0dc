//! Command-line interface
//!
//! Three subcommands: `check` verifies credentials against the ping
//! endpoint, `discover` prints the stream catalog with resolved schemas,
//! and `read` runs extraction and prints messages to stdout.

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
