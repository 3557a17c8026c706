//! Algorithm graphs: steps and the binds between their ports.
//!
//! - [`Step`]: one placement of an action inside an algorithm
//! - [`Source`]: where a value comes from (algorithm inlet, step outlet or a constant)
//! - [`Destination`]: where a value goes (step inlet or algorithm outlet)
//! - [`Graph`]: the ordered steps and the binding map

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::action::Action;
use crate::error::{Error, Result};
use crate::value::Value;

/// A port of a step, addressed by step ordinal and port index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepPort {
    /// Ordinal of the step within its algorithm.
    pub step: usize,
    /// Declaration index of the port on the step's action.
    pub port: usize,
}

impl StepPort {
    /// Creates a step port.
    pub fn new(step: usize, port: usize) -> Self {
        Self { step, port }
    }
}

/// Origin of a bound value.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// An inlet of the algorithm itself, by index.
    Inlet(usize),
    /// An outlet of a step.
    StepOutlet(StepPort),
    /// A literal value.
    Const(Value),
}

/// Target of a bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// An inlet of a step.
    StepInlet(StepPort),
    /// An outlet of the algorithm itself, by index.
    Outlet(usize),
}

/// One placement of an action inside an algorithm.
#[derive(Debug, Clone)]
pub struct Step {
    algorithm: String,
    ordinal: usize,
    action: Arc<Action>,
}

impl Step {
    pub(crate) fn new(algorithm: impl Into<String>, ordinal: usize, action: Arc<Action>) -> Self {
        Self {
            algorithm: algorithm.into(),
            ordinal,
            action,
        }
    }

    /// Returns the code of the owning algorithm.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Returns the position of the step in the algorithm.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Returns the action placed at this step.
    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} step of {}: {}",
            self.ordinal,
            self.algorithm,
            self.action.code()
        )
    }
}

/// The steps of an algorithm in declared order and the binds feeding their ports.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    steps: Vec<Step>,
    binds: IndexMap<Destination, Source>,
}

impl Graph {
    pub(crate) fn new(steps: Vec<Step>, binds: IndexMap<Destination, Source>) -> Self {
        Self { steps, binds }
    }

    /// Returns the steps in declared order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Returns the step at an ordinal.
    pub fn step(&self, ordinal: usize) -> Option<&Step> {
        self.steps.get(ordinal)
    }

    /// Returns the binds in the order they were made.
    pub fn binds(&self) -> impl Iterator<Item = (&Destination, &Source)> {
        self.binds.iter()
    }

    /// Returns the number of binds.
    pub fn bind_count(&self) -> usize {
        self.binds.len()
    }

    /// Returns the source bound to a destination.
    pub fn source_of(&self, destination: &Destination) -> Option<&Source> {
        self.binds.get(destination)
    }

    /// Checks that every non-context step inlet has a source.
    pub fn validate(&self, algorithm: &str) -> Result<()> {
        for step in &self.steps {
            for inlet in step.action.inlets() {
                if inlet.is_context() {
                    continue;
                }
                let destination = Destination::StepInlet(StepPort::new(step.ordinal, inlet.index()));
                if !self.binds.contains_key(&destination) {
                    return Err(Error::UnboundInlet {
                        algorithm: algorithm.to_owned(),
                        step: step.ordinal,
                        action: step.action.code().to_owned(),
                        inlet: inlet.code().to_owned(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Describes a source port with names resolved against `algorithm`.
    pub fn describe_source(&self, algorithm: &Action, source: &Source) -> String {
        match source {
            Source::Inlet(index) => match algorithm.inlet(*index) {
                Ok(inlet) => format!("inlet `{}` of `{}`", inlet.code(), algorithm.code()),
                Err(_) => format!("inlet #{index} of `{}`", algorithm.code()),
            },
            Source::StepOutlet(port) => self.describe_step_port(port, false),
            Source::Const(value) => format!("const {value}"),
        }
    }

    /// Describes a destination port with names resolved against `algorithm`.
    pub fn describe_destination(&self, algorithm: &Action, destination: &Destination) -> String {
        match destination {
            Destination::StepInlet(port) => self.describe_step_port(port, true),
            Destination::Outlet(index) => match algorithm.outlet(*index) {
                Ok(outlet) => format!("outlet `{}` of `{}`", outlet.code(), algorithm.code()),
                Err(_) => format!("outlet #{index} of `{}`", algorithm.code()),
            },
        }
    }

    fn describe_step_port(&self, port: &StepPort, inlet: bool) -> String {
        let Some(step) = self.step(port.step) else {
            return format!("port #{} of step #{}", port.port, port.step);
        };
        let (role, found) = if inlet {
            ("inlet", step.action.inlet(port.port).map(|l| l.code().to_owned()))
        } else {
            ("outlet", step.action.outlet(port.port).map(|l| l.code().to_owned()))
        };
        match found {
            Ok(code) => format!("{role} `{code}` of step {} (`{}`)", step.ordinal, step.action.code()),
            Err(_) => format!("{role} #{} of step {}", port.port, step.ordinal),
        }
    }

    /// Returns a multi-line dump of the steps and binds of `algorithm`.
    pub fn display<'a>(&'a self, algorithm: &'a Action) -> GraphDisplay<'a> {
        GraphDisplay {
            graph: self,
            algorithm,
        }
    }
}

/// Display adapter returned by [`Graph::display`].
pub struct GraphDisplay<'a> {
    graph: &'a Graph,
    algorithm: &'a Action,
}

impl fmt::Display for GraphDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.algorithm)?;
        for step in &self.graph.steps {
            writeln!(f, "  {step}")?;
        }
        for (destination, source) in &self.graph.binds {
            writeln!(
                f,
                "  {} ---> {}",
                self.graph.describe_source(self.algorithm, source),
                self.graph.describe_destination(self.algorithm, destination)
            )?;
        }
        Ok(())
    }
}
