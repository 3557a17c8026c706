//! Evaluation of actions and algorithms.
//!
//! The [`Interpreter`] evaluates an action in five stages: context injection,
//! input validation, dispatch, graph evaluation (for algorithms) and output
//! validation. Dispatch picks a strategy by the engine named in the context,
//! falling back to the first registered one; a strategy that delegates to
//! another action is evaluated recursively.

use std::collections::HashMap;

use derive_builder::Builder;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::catalog::Catalog;
use crate::context::{Context, DEFAULT_ENGINE_KEY};
use crate::error::{Error, Result};
use crate::graph::{Destination, Graph, Source, StepPort};
use crate::strategy::{Strategy, StrategyTarget};
use crate::timing::Timing;
use crate::value::{Value, Values};

/// Tracing target for evaluation.
pub const TRACING_TARGET: &str = "tessera_runtime::interpreter";

/// Configuration of an [`Interpreter`].
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct InterpreterConfig {
    /// Context setting read to choose the engine.
    #[builder(default = "DEFAULT_ENGINE_KEY.to_owned()")]
    pub engine_key: String,

    /// Log resolved step inputs and outputs at trace level.
    #[builder(default)]
    pub trace_values: bool,
}

impl InterpreterConfig {
    /// Returns a builder for the configuration.
    pub fn builder() -> InterpreterConfigBuilder {
        InterpreterConfigBuilder::default()
    }
}

impl InterpreterConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(key) = &self.engine_key
            && key.trim().is_empty()
        {
            return Err("engine_key must not be empty".into());
        }
        Ok(())
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            engine_key: DEFAULT_ENGINE_KEY.to_owned(),
            trace_values: false,
        }
    }
}

/// Outputs of an evaluation together with its timing.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Validated outputs keyed by outlet name.
    pub outputs: Values,
    /// Start and end of the evaluation.
    pub timing: Timing,
}

/// Value table key: the ports that produce values inside an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Inlet(usize),
    StepOutlet(StepPort),
}

/// Evaluates actions against a [`Catalog`].
///
/// Holds no state between calls; every evaluation owns its value table.
#[derive(Debug, Clone)]
pub struct Interpreter<'c> {
    catalog: &'c Catalog,
    config: InterpreterConfig,
}

impl<'c> Interpreter<'c> {
    /// Creates an interpreter with the default configuration.
    pub fn new(catalog: &'c Catalog) -> Self {
        Self::with_config(catalog, InterpreterConfig::default())
    }

    /// Creates an interpreter with the given configuration.
    pub fn with_config(catalog: &'c Catalog, config: InterpreterConfig) -> Self {
        Self { catalog, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Evaluates `action` with the given inputs and returns its outputs.
    pub fn evaluate(&self, action: &Action, context: &Context, inputs: Values) -> Result<Values> {
        self.evaluate_timed(action, context, inputs)
            .map(|evaluation| evaluation.outputs)
    }

    /// Evaluates `action` and records when the evaluation started and ended.
    pub fn evaluate_timed(
        &self,
        action: &Action,
        context: &Context,
        inputs: Values,
    ) -> Result<Evaluation> {
        let started_at = Timestamp::now();

        tracing::debug!(
            target: TRACING_TARGET,
            action = action.code(),
            algorithm = action.is_algorithm(),
            "Evaluation started"
        );

        let outputs = self.evaluate_action(action, context, inputs, 0)?;
        let timing = Timing::since(started_at);

        tracing::debug!(
            target: TRACING_TARGET,
            action = action.code(),
            outputs = outputs.len(),
            elapsed_ms = timing.duration().as_millis(),
            "Evaluation completed"
        );

        Ok(Evaluation { outputs, timing })
    }

    fn evaluate_action(
        &self,
        action: &Action,
        context: &Context,
        mut inputs: Values,
        depth: usize,
    ) -> Result<Values> {
        if let Some(inlet) = action.context_inlet() {
            inputs.insert(inlet.code(), context.clone());
        }

        let inputs = action.validate_inputs(inputs)?;
        let outputs = match action.graph() {
            Some(graph) => self.evaluate_graph(action, graph, context, inputs, depth)?,
            None => self.dispatch(action, context, inputs, depth)?,
        };
        action.validate_outputs(outputs)
    }

    fn dispatch(
        &self,
        action: &Action,
        context: &Context,
        inputs: Values,
        depth: usize,
    ) -> Result<Values> {
        let strategy = self.choose_strategy(action, context)?;

        tracing::trace!(
            target: TRACING_TARGET,
            action = action.code(),
            engine = %strategy.engine(),
            depth,
            "Strategy selected"
        );

        match strategy.target() {
            StrategyTarget::SubAction(target) => {
                self.evaluate_action(target, context, inputs, depth + 1)
            }
            StrategyTarget::Callable(_) => strategy.evaluate(&inputs)?.into_outputs(action),
        }
    }

    /// Returns the strategy named by the context, or the first registered one.
    fn choose_strategy(&self, action: &Action, context: &Context) -> Result<&'c Strategy> {
        let strategies = self
            .catalog
            .implementations()
            .list(action.code())
            .map_err(|_| Error::NoImplementation {
                action: action.code().to_owned(),
            })?;

        match context.engine_under(&self.config.engine_key) {
            Some(engine) => strategies.get(&engine).ok_or_else(|| Error::UnknownEngine {
                action: action.code().to_owned(),
                engine,
            }),
            None => strategies
                .first()
                .map(|(_, strategy)| strategy)
                .ok_or_else(|| Error::NoImplementation {
                    action: action.code().to_owned(),
                }),
        }
    }

    fn evaluate_graph(
        &self,
        algorithm: &Action,
        graph: &Graph,
        context: &Context,
        inputs: Values,
        depth: usize,
    ) -> Result<Values> {
        let mut table = HashMap::new();
        for (name, value) in inputs {
            let index = algorithm.inlet(&name)?.index();
            table.insert(Slot::Inlet(index), value);
        }

        for step in graph.steps() {
            let action = step.action();
            let mut args = Values::new();
            for inlet in action.inlets() {
                let value = if inlet.is_context() {
                    Value::Context(context.clone())
                } else {
                    let port = StepPort::new(step.ordinal(), inlet.index());
                    let source = graph
                        .source_of(&Destination::StepInlet(port))
                        .ok_or_else(|| Error::UnboundInlet {
                            algorithm: algorithm.code().to_owned(),
                            step: step.ordinal(),
                            action: action.code().to_owned(),
                            inlet: inlet.code().to_owned(),
                        })?;
                    self.resolve(algorithm, graph, &table, source)?
                };
                args.insert(inlet.code(), value);
            }

            tracing::trace!(
                target: TRACING_TARGET,
                algorithm = algorithm.code(),
                step = step.ordinal(),
                action = action.code(),
                depth,
                "Executing step"
            );
            if self.config.trace_values {
                tracing::trace!(
                    target: TRACING_TARGET,
                    step = step.ordinal(),
                    inputs = %args.to_json_lossy(),
                    "Step inputs"
                );
            }

            let outputs = self.evaluate_action(action, context, args, depth + 1)?;

            if self.config.trace_values {
                tracing::trace!(
                    target: TRACING_TARGET,
                    step = step.ordinal(),
                    outputs = %outputs.to_json_lossy(),
                    "Step outputs"
                );
            }

            for (name, value) in outputs {
                let index = action.outlet(&name)?.index();
                table.insert(Slot::StepOutlet(StepPort::new(step.ordinal(), index)), value);
            }
        }

        let mut outputs = Values::new();
        for outlet in algorithm.outlets() {
            let destination = Destination::Outlet(outlet.index());
            let source = graph
                .source_of(&destination)
                .ok_or_else(|| Error::MissingValue {
                    algorithm: algorithm.code().to_owned(),
                    port: graph.describe_destination(algorithm, &destination),
                })?;
            outputs.insert(outlet.code(), self.resolve(algorithm, graph, &table, source)?);
        }
        Ok(outputs)
    }

    fn resolve(
        &self,
        algorithm: &Action,
        graph: &Graph,
        table: &HashMap<Slot, Value>,
        source: &Source,
    ) -> Result<Value> {
        let slot = match source {
            Source::Const(value) => return Ok(value.clone()),
            Source::Inlet(index) => Slot::Inlet(*index),
            Source::StepOutlet(port) => Slot::StepOutlet(*port),
        };
        table.get(&slot).cloned().ok_or_else(|| Error::MissingValue {
            algorithm: algorithm.code().to_owned(),
            port: graph.describe_source(algorithm, source),
        })
    }
}
