//! Engine selection and interpreter options.

use anyhow::Context as _;
use clap::Args;
use serde::{Deserialize, Serialize};
use tessera_runtime::context::DEFAULT_ENGINE_KEY;
use tessera_runtime::{Context, InterpreterConfig};

use crate::TRACING_TARGET_CONFIG;

/// Runtime configuration.
///
/// # Environment Variables
///
/// - `TESSERA_ENGINE` - Engine requested for every strategy lookup
/// - `TESSERA_ENGINE_KEY` - Context setting that carries the engine (default: engine)
/// - `TESSERA_TRACE_VALUES` - Log step inputs and outputs at trace level
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct RuntimeConfig {
    /// Engine requested for every strategy lookup.
    ///
    /// Without it each action runs its first registered strategy.
    #[arg(long, env = "TESSERA_ENGINE")]
    pub engine: Option<String>,

    /// Context setting that carries the engine.
    #[arg(long, env = "TESSERA_ENGINE_KEY", default_value = DEFAULT_ENGINE_KEY)]
    #[serde(default = "default_engine_key")]
    pub engine_key: String,

    /// Log step inputs and outputs at trace level.
    #[arg(long, env = "TESSERA_TRACE_VALUES")]
    #[serde(default)]
    pub trace_values: bool,
}

fn default_engine_key() -> String {
    DEFAULT_ENGINE_KEY.to_owned()
}

impl RuntimeConfig {
    /// Builds the interpreter configuration.
    pub fn interpreter_config(&self) -> anyhow::Result<InterpreterConfig> {
        InterpreterConfig::builder()
            .engine_key(self.engine_key.as_str())
            .trace_values(self.trace_values)
            .build()
            .context("invalid interpreter configuration")
    }

    /// Builds the evaluation context.
    pub fn context(&self) -> Context {
        match &self.engine {
            Some(engine) => Context::new().with_setting(self.engine_key.clone(), engine.as_str()),
            None => Context::new(),
        }
    }

    /// Logs the configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            engine = ?self.engine,
            engine_key = %self.engine_key,
            trace_values = self.trace_values,
            "Runtime configuration"
        );
    }
}
