#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod library;

use std::process;

use anyhow::Context as _;
use tessera_runtime::{Catalog, Interpreter, Values};

use crate::config::{Cli, Command, ListArgs, RunArgs, RuntimeConfig};

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "tessera_cli::startup";
pub const TRACING_TARGET_CONFIG: &str = "tessera_cli::config";
pub const TRACING_TARGET_RUN: &str = "tessera_cli::run";

fn main() {
    let Err(error) = run() else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_RUN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
fn run() -> anyhow::Result<()> {
    let cli = Cli::init();
    cli.telemetry.init_tracing()?;
    cli.log();

    let catalog = library::catalog().context("failed to declare the bundled library")?;

    match &cli.command {
        Command::List(args) => list(&catalog, args),
        Command::Run(args) => evaluate(&catalog, &cli.runtime, args),
    }
}

/// Prints declared actions and algorithms with their engines.
fn list(catalog: &Catalog, args: &ListArgs) -> anyhow::Result<()> {
    for action in catalog.actions().iter() {
        let engines: Vec<&str> = catalog
            .implementations()
            .engines(action.code())
            .map(|engine| engine.as_str())
            .collect();

        if engines.is_empty() {
            println!("{action}");
        } else {
            println!("{action} [{}]", engines.join(", "));
        }
    }

    if args.graph {
        for algorithm in catalog.algorithms().iter() {
            let graph = algorithm
                .graph()
                .with_context(|| format!("algorithm `{}` has no graph", algorithm.code()))?;
            println!();
            print!("{}", graph.display(algorithm));
        }
    }

    Ok(())
}

/// Evaluates one action and prints its outputs as JSON.
fn evaluate(catalog: &Catalog, runtime: &RuntimeConfig, args: &RunArgs) -> anyhow::Result<()> {
    let action = catalog.action(&args.code)?;
    let inputs: Values = args.inputs.iter().cloned().collect();

    let interpreter = Interpreter::with_config(catalog, runtime.interpreter_config()?);
    let evaluation = interpreter
        .evaluate_timed(action, &runtime.context(), inputs)
        .with_context(|| format!("failed to evaluate `{}`", args.code))?;

    tracing::info!(
        target: TRACING_TARGET_RUN,
        action = action.code(),
        elapsed_ms = evaluation.timing.duration().as_millis(),
        "Evaluation finished"
    );

    let rendered = serde_json::to_string_pretty(&evaluation.outputs.to_json_lossy())
        .context("failed to render outputs")?;
    println!("{rendered}");

    Ok(())
}
