//! # Waypoint Configuration Validator
//!
//! Command-line tool for checking waypoint configuration files per environment
//! before shipping them to devices.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use waypoint_core::config::{ConfigManager, WaypointConfig};

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate waypoint configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate every configuration section
    All,

    /// Validate one configuration section
    Section {
        /// Section name (gate, location, sync, queue, notifications, routing, events)
        name: String,
    },

    /// List environments that have an overlay file
    Environments,

    /// Print the effective configuration
    Show,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::All) | None => validate_all(&cli),
        Some(Commands::Section { name }) => validate_section(&cli, name),
        Some(Commands::Environments) => list_environments(&cli),
        Some(Commands::Show) => show_config(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {e:#}");
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn config_directory(cli: &Cli) -> PathBuf {
    cli.config_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("config"))
}

fn load(cli: &Cli) -> anyhow::Result<Arc<ConfigManager>> {
    ConfigManager::load_from_directory_with_env(Some(config_directory(cli)), &cli.environment)
        .with_context(|| format!("loading configuration for '{}'", cli.environment))
}

fn validate_all(cli: &Cli) -> anyhow::Result<()> {
    println!("🔧 Validating Waypoint Configuration");
    println!("Environment: {}", cli.environment);
    println!("Config Directory: {}", config_directory(cli).display());
    println!();

    let manager = load(cli)?;
    println!("✅ Configuration loaded and validated");

    let config = manager.config();
    for section in SECTIONS {
        report_section(config, section)?;
    }

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

const SECTIONS: [&str; 7] = [
    "gate",
    "location",
    "sync",
    "queue",
    "notifications",
    "routing",
    "events",
];

fn validate_section(cli: &Cli, name: &str) -> anyhow::Result<()> {
    let manager = load(cli)?;
    report_section(manager.config(), &name.to_lowercase())?;
    println!("✅ Section '{name}' validation passed!");
    Ok(())
}

fn report_section(config: &WaypointConfig, section: &str) -> anyhow::Result<()> {
    match section {
        "gate" => {
            println!("📍 Gate");
            println!(
                "   ✅ Proximity threshold: {} m",
                config.gate.proximity_threshold_meters
            );
        }
        "location" => {
            println!("🛰️  Location");
            println!(
                "   ✅ Distance filter: {} m",
                config.location.distance_filter_meters
            );
            println!(
                "   ✅ Publish interval: {} s (enabled: {})",
                config.location.publish_interval_seconds, config.location.publish_enabled
            );
        }
        "sync" => {
            println!("🔄 Sync");
            println!("   ✅ Store timeout: {} ms", config.sync.store_timeout_ms);
            println!(
                "   ✅ Retries: {} (backoff {} ms to {} ms, x{})",
                config.sync.max_retry_attempts,
                config.sync.backoff.base_delay_ms,
                config.sync.backoff.max_delay_ms,
                config.sync.backoff.multiplier
            );
        }
        "queue" => {
            println!("💾 Queue");
            println!(
                "   ✅ Database: {}",
                config.queue.database_path.display()
            );
        }
        "notifications" => {
            println!("📨 Notifications");
            println!("   ✅ Timeout: {} ms", config.notifications.timeout_ms);
            if config.notifications.notify_on_start
                && config.notifications.operations_recipients.is_empty()
            {
                println!("   ℹ️  Route start notifications enabled without recipients");
            }
        }
        "routing" => {
            println!("🗺️  Routing");
            println!(
                "   ✅ Recompute on skip: {} (timeout {} ms)",
                config.routing.recompute_on_skip, config.routing.timeout_ms
            );
        }
        "events" => {
            println!("📣 Events");
            println!(
                "   ✅ Channel capacity: {}",
                config.events.channel_capacity
            );
        }
        other => bail!("Unknown section: {other}"),
    }
    Ok(())
}

fn list_environments(cli: &Cli) -> anyhow::Result<()> {
    let directory = config_directory(cli);
    println!("📋 Available Environments ({}):", directory.display());

    let mut environments = overlay_environments(&directory)?;
    environments.sort();
    for environment in environments {
        println!("  • {environment}");
    }
    Ok(())
}

fn overlay_environments(directory: &Path) -> anyhow::Result<Vec<String>> {
    let mut environments = Vec::new();
    for entry in std::fs::read_dir(directory)
        .with_context(|| format!("reading {}", directory.display()))?
    {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if let Some(environment) = name
            .strip_prefix("waypoint-config.")
            .and_then(|rest| rest.strip_suffix(".yaml"))
        {
            environments.push(environment.to_string());
        }
    }
    Ok(environments)
}

fn show_config(cli: &Cli) -> anyhow::Result<()> {
    let manager = load(cli)?;
    let rendered = manager.debug_config();

    match cli.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&rendered)?),
        "table" => {
            if let Some(sections) = rendered.as_object() {
                for (section, values) in sections {
                    println!("[{section}]");
                    if let Some(values) = values.as_object() {
                        for (key, value) in values {
                            println!("  {key:<32} {value}");
                        }
                    }
                }
            }
        }
        other => bail!("Unknown format: {other}"),
    }
    Ok(())
}
