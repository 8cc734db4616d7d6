//! Command-line interface
//!
//! `observe` plays the observer end of the mirror channel; `demo` drives a
//! cache against it.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "rsc-cache")]
#[command(about = "Render cache mirror tools", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .rsc-cache/config.yaml)
    #[arg(short, long, global = true, env = "RSC_CACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Listen for a cache and print every snapshot it publishes
    Observe(commands::observe::ObserveArgs),

    /// Cache a few deferred values and mirror them to the observer
    Demo(commands::demo::DemoArgs),
}

/// Load configuration and install the logger.
pub fn bootstrap(cli: &Cli) -> Result<(Config, LoggerImpl)> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let logger = LoggerImpl::init(&LogConfig::from_settings(&config.logging)?)?;
    Ok((config, logger))
}

/// Report a failed command and exit.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{body}");
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
