//! matchgate CLI - membership status routing guard
//!
//! A command-line interface for inspecting the routing guard:
//! - Single decisions and full decision tables
//! - Fixture replays through the mounted guard
//! - Configuration file support

use std::io::{stdout, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matchgate::cli::{
    create_formatter, run_replay, should_colorize, Cli, Commands, DecisionOutput, GateConfig,
    OutputFormat, ReplayOptions, TableRow,
};
use matchgate::{
    decide_for_status, AccountType, ApplicationStatus, Fixture, RouteLocation, Stage, UserStatus,
};

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Quiet by default - only show errors unless explicitly verbose
    let filter = if cli.verbose { "debug" } else { "error" };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => GateConfig::load_from(path.clone()),
        None => GateConfig::load(),
    };

    match cli.command {
        Commands::Decide {
            status,
            location,
            format,
        } => handle_decide(status.to_status(), &location, format.into(), &config)?,

        Commands::Table { location, format } => {
            handle_table(&location, format.into(), &config)?
        }

        Commands::Replay {
            fixture,
            identity,
            location,
            purchase,
            format,
        } => {
            handle_replay(
                fixture,
                ReplayOptions {
                    identity,
                    start: RouteLocation::parse(&location),
                    purchase,
                },
                format.into(),
                &config,
            )
            .await?
        }

        Commands::Config {
            get,
            set,
            list,
            reset,
            path,
        } => handle_config(get, set, list, reset, path, cli.config.clone())?,
    }

    Ok(())
}

// =============================================================================
// Command Handlers
// =============================================================================

fn handle_decide(
    status: UserStatus,
    location: &str,
    format: OutputFormat,
    config: &GateConfig,
) -> anyhow::Result<()> {
    let location = RouteLocation::parse(location);
    let decision = decide_for_status(&status, &location);
    let formatter = create_formatter(format, should_colorize(format, config.output.color));
    let mut out = stdout();
    formatter.format_decision(&DecisionOutput::new(&status, &location, decision), &mut out)?;
    out.flush()?;
    Ok(())
}

fn handle_table(location: &str, format: OutputFormat, config: &GateConfig) -> anyhow::Result<()> {
    let location = RouteLocation::parse(location);
    let mut rows = Vec::new();
    for application in ApplicationStatus::ALL {
        for has_profile in [false, true] {
            for paid in [false, true] {
                for has_affiliation in [false, true] {
                    for has_references in [false, true] {
                        let status = UserStatus::new(
                            application,
                            AccountType::TypeA,
                            has_profile,
                            paid,
                            has_affiliation,
                            has_references,
                        );
                        rows.push(TableRow {
                            stage: Stage::of(&status),
                            decision: decide_for_status(&status, &location),
                            status,
                        });
                    }
                }
            }
        }
    }

    let formatter = create_formatter(format, should_colorize(format, config.output.color));
    let mut out = stdout();
    formatter.format_table(&location, &rows, &mut out)?;
    out.flush()?;
    Ok(())
}

async fn handle_replay(
    fixture: PathBuf,
    options: ReplayOptions,
    format: OutputFormat,
    config: &GateConfig,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&fixture)
        .map_err(|e| anyhow::anyhow!("Failed to read fixture {:?}: {}", fixture, e))?;
    let fixture = Fixture::from_json(&content)?;

    let report = run_replay(fixture, options, config).await?;

    let formatter = create_formatter(format, should_colorize(format, config.output.color));
    let mut out = stdout();
    formatter.format_replay(&report, &mut out)?;
    out.flush()?;
    Ok(())
}

fn handle_config(
    get: Option<String>,
    set: Option<String>,
    list: bool,
    reset: bool,
    path: bool,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config_path = config_path.unwrap_or_else(GateConfig::default_path);

    if path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if reset {
        GateConfig::default().save_to(config_path.clone())?;
        println!("Configuration reset to defaults at {}", config_path.display());
        return Ok(());
    }

    let mut config = GateConfig::load_from(config_path.clone());

    if let Some(key) = get {
        match config.get(&key) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("Unknown configuration key: {}", key),
        }
        return Ok(());
    }

    if let Some(assignment) = set {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected key=value, got '{}'", assignment))?;
        config.set(key.trim(), value.trim())?;
        config.save_to(config_path.clone())?;
        println!("{} = {}", key.trim(), value.trim());
        return Ok(());
    }

    if list {
        println!("Current configuration:");
        println!();
        for (key, value) in config.list() {
            println!("  {} = {}", key, value);
        }
        println!();
        println!("Config file: {}", config_path.display());
        return Ok(());
    }

    println!("Usage: matchgate config [--get KEY | --set KEY=VALUE | --list | --reset | --path]");
    Ok(())
}
