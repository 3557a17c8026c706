//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── runtime: RuntimeConfig      # Engine selection, interpreter options
//! ├── telemetry: TelemetryConfig  # Log output format
//! └── command: Command            # list | run
//! ```
//!
//! All options can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.

mod runtime;
mod telemetry;

use std::process;

use clap::{Args, Parser, Subcommand};
use serde_json::Value as JsonValue;

pub use runtime::RuntimeConfig;
pub use telemetry::TelemetryConfig;

use crate::TRACING_TARGET_STARTUP;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "tessera")]
#[command(about = "Declare and run typed dataflow algorithms")]
#[command(version)]
pub struct Cli {
    /// Engine selection and interpreter options.
    #[clap(flatten)]
    pub runtime: RuntimeConfig,

    /// Log output options.
    #[clap(flatten)]
    pub telemetry: TelemetryConfig,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Lists declared actions and algorithms with their engines.
    List(ListArgs),
    /// Evaluates an action or algorithm.
    Run(RunArgs),
}

/// Arguments of the `list` command.
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Also print the steps and binds of every algorithm.
    #[arg(long)]
    pub graph: bool,
}

/// Arguments of the `run` command.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Code of the action or algorithm to evaluate.
    pub code: String,

    /// Input value as `name=value`; the value is parsed as JSON and falls
    /// back to a plain string.
    #[arg(short = 'i', long = "input", value_parser = parse_input)]
    pub inputs: Vec<(String, JsonValue)>,
}

/// Parses one `name=value` input.
fn parse_input(raw: &str) -> Result<(String, JsonValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected `name=value`, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing input name in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_owned()));
    Ok((name.to_owned(), value))
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Logs build information and configuration.
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
        self.runtime.log();
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
