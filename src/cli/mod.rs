//! CLI module for matchgate
//!
//! ## Usage
//!
//! ```bash
//! # Where must an approved, paid member without a profile be?
//! matchgate decide --application approved --paid --location "/(tabs)"
//!
//! # Full decision table at a location, as JSON
//! matchgate table --location "/(auth)/payment" --format json
//!
//! # Drive the guard over a fixture backend
//! matchgate replay fixture.json --location "/(tabs)" --purchase monthly
//!
//! # Configuration management
//! matchgate config --list
//! matchgate config --set status.payment_check=subscription
//! ```
//!
//! ## Module Structure
//!
//! - `commands`: CLI command definitions using clap
//! - `output`: Output formatters for different formats
//! - `config`: Configuration file handling
//! - `replay`: Fixture replay driver

pub mod commands;
pub mod config;
pub mod output;
pub mod replay;

// Re-exports for convenience
pub use commands::{Cli, CliApplicationStatus, CliOutputFormat, Commands, StatusArgs};
pub use config::{
    ConfigError, GateConfig, GuardConfig, OutputConfig, PaywallConfig, StatusConfig,
};
pub use output::{
    create_formatter, should_colorize, DecisionOutput, OutputFormat, OutputFormatter,
    ReplayReport, TableRow,
};
pub use replay::{run_replay, ReplayOptions};
