//! CLI command definitions for matchgate
//!
//! Defines all CLI commands and arguments using clap derive macros.
//!
//! ## Commands
//!
//! - `decide` - Run the routing decision for one status and location
//! - `table` - Print the decision for every status at a location
//! - `replay` - Drive a mounted guard against a fixture backend
//! - `config` - Show or modify configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::status::{AccountType, ApplicationStatus, UserStatus};

// =============================================================================
// Main CLI
// =============================================================================

/// matchgate - membership status routing guard
#[derive(Parser, Debug)]
#[command(name = "matchgate")]
#[command(about = "Membership status routing guard", long_about = None)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// =============================================================================
// Commands
// =============================================================================

/// Application status selector (CLI compatible)
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CliApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl From<CliApplicationStatus> for ApplicationStatus {
    fn from(status: CliApplicationStatus) -> Self {
        match status {
            CliApplicationStatus::Pending => ApplicationStatus::Pending,
            CliApplicationStatus::Approved => ApplicationStatus::Approved,
            CliApplicationStatus::Rejected => ApplicationStatus::Rejected,
        }
    }
}

/// Output format (CLI compatible)
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum CliOutputFormat {
    #[default]
    Human,
    Json,
}

/// Status flags shared by commands that build a snapshot by hand
#[derive(clap::Args, Debug, Clone)]
pub struct StatusArgs {
    /// Review outcome
    #[arg(long, value_enum)]
    pub application: CliApplicationStatus,

    /// A member profile exists
    #[arg(long)]
    pub profile: bool,

    /// An active subscription exists
    #[arg(long)]
    pub paid: bool,

    /// The affiliation question was answered
    #[arg(long)]
    pub affiliation: bool,

    /// At least one reference exists
    #[arg(long)]
    pub references: bool,
}

impl StatusArgs {
    pub fn to_status(&self) -> UserStatus {
        UserStatus::new(
            self.application.into(),
            AccountType::TypeA,
            self.profile,
            self.paid,
            self.affiliation,
            self.references,
        )
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decide where a member with the given status must be
    Decide {
        #[command(flatten)]
        status: StatusArgs,

        /// Current location, e.g. "/(auth)/payment"
        #[arg(short, long)]
        location: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: CliOutputFormat,
    },

    /// Print the decision for every status combination at a location
    Table {
        /// Current location, e.g. "/(tabs)"
        #[arg(short, long)]
        location: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: CliOutputFormat,
    },

    /// Mount the guard over a JSON fixture and print the navigation log
    Replay {
        /// Fixture file with application/profile/reference records
        fixture: PathBuf,

        /// Identity to sign in (defaults to the fixture's identity)
        #[arg(short, long)]
        identity: Option<String>,

        /// Starting location
        #[arg(short, long, default_value = "/(tabs)")]
        location: String,

        /// Purchase this package after the first settle
        #[arg(long)]
        purchase: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: CliOutputFormat,
    },

    /// Show or modify configuration
    Config {
        /// Get a specific config value
        #[arg(long)]
        get: Option<String>,

        /// Set a config value (key=value)
        #[arg(long)]
        set: Option<String>,

        /// List all config values
        #[arg(long)]
        list: bool,

        /// Reset to default configuration
        #[arg(long)]
        reset: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}
