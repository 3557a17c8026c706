//! Algorithm construction.
//!
//! [`AlgorithmBuilder::build`] hands a builder function a [`Scope`] for the new
//! algorithm. The function places steps with [`Scope::register`], wires ports
//! with [`Scope::bind`] (or does both at once with [`Scope::invoke`]) and
//! returns what feeds the algorithm's outlets.
//!
//! Port handles are tagged with the id of the scope that issued them, so a
//! handle can never be bound inside another algorithm.

use std::sync::Arc;

use derive_more::{Debug, Display, From, Into};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::action::{Action, Direction, Parameter, PortKey};
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::graph::{Destination, Graph, Source, Step, StepPort};
use crate::value::{Object, Value};

/// Tracing target for algorithm construction.
pub const TRACING_TARGET: &str = "tessera_runtime::builder";

/// Identifier of one build scope.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Debug, Display, From, Into)]
#[debug("{_0}")]
#[display("{_0}")]
pub struct ScopeId(Uuid);

impl ScopeId {
    /// Creates a new scope id.
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Port {
    Inlet(usize),
    StepInlet(StepPort),
    StepOutlet(StepPort),
}

/// Handle to a single port inside a build scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Terminal {
    scope: ScopeId,
    port: Port,
}

impl Terminal {
    /// Returns the scope that issued this handle.
    pub fn scope(&self) -> ScopeId {
        self.scope
    }
}

/// Handle to a step placed in a build scope.
#[derive(Debug, Clone)]
pub struct StepHandle {
    scope: ScopeId,
    ordinal: usize,
    action: Arc<Action>,
}

impl StepHandle {
    /// Returns the step ordinal.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Returns the action placed at the step.
    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }

    /// Returns an inlet of the step by code or index.
    pub fn inlet<'k>(&self, key: impl Into<PortKey<'k>>) -> Result<Terminal> {
        let index = self.port_index(Direction::In, key.into())?;
        Ok(Terminal {
            scope: self.scope,
            port: Port::StepInlet(StepPort::new(self.ordinal, index)),
        })
    }

    /// Returns an outlet of the step by code or index.
    pub fn outlet<'k>(&self, key: impl Into<PortKey<'k>>) -> Result<Terminal> {
        let index = self.port_index(Direction::Out, key.into())?;
        Ok(Terminal {
            scope: self.scope,
            port: Port::StepOutlet(StepPort::new(self.ordinal, index)),
        })
    }

    fn port_index(&self, direction: Direction, key: PortKey<'_>) -> Result<usize> {
        let found = match direction {
            Direction::In => self.action.inlet(key),
            Direction::Out => self.action.outlet(key),
        };
        found.map(|port| port.index()).map_err(|_| Error::UnknownPort {
            owner: format!("step {} (`{}`)", self.ordinal, self.action.code()),
            direction,
            port: key.to_string(),
        })
    }
}

/// Anything that can feed a port: a port handle, a step standing in for its
/// only outlet, or a literal.
#[derive(Debug, Clone)]
pub enum Output {
    /// A port handle.
    Port(Terminal),
    /// A step with exactly one outlet.
    Step(StepHandle),
    /// A literal, bound as a constant.
    Const(Value),
}

impl From<Terminal> for Output {
    fn from(terminal: Terminal) -> Self {
        Self::Port(terminal)
    }
}

impl From<StepHandle> for Output {
    fn from(step: StepHandle) -> Self {
        Self::Step(step)
    }
}

impl From<&StepHandle> for Output {
    fn from(step: &StepHandle) -> Self {
        Self::Step(step.clone())
    }
}

macro_rules! impl_output_const {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Output {
                fn from(value: $ty) -> Self {
                    Self::Const(Value::from(value))
                }
            }
        )*
    };
}

impl_output_const!(Value, JsonValue, Object, bool, i32, i64, u32, u64, f64, &str, String);

/// What a builder function produced for the algorithm outlets.
#[derive(Debug, Clone)]
pub enum Produced {
    /// Nothing; valid only for algorithms without outlets.
    Nothing,
    /// One result.
    Single(Output),
    /// Results in outlet order.
    Sequence(Vec<Output>),
}

impl From<()> for Produced {
    fn from(_: ()) -> Self {
        Self::Nothing
    }
}

impl From<Output> for Produced {
    fn from(output: Output) -> Self {
        Self::Single(output)
    }
}

impl From<Terminal> for Produced {
    fn from(terminal: Terminal) -> Self {
        Self::Single(terminal.into())
    }
}

impl From<StepHandle> for Produced {
    fn from(step: StepHandle) -> Self {
        Self::Single(step.into())
    }
}

impl<T: Into<Output>> From<Vec<T>> for Produced {
    fn from(outputs: Vec<T>) -> Self {
        Self::Sequence(outputs.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Output>, const N: usize> From<[T; N]> for Produced {
    fn from(outputs: [T; N]) -> Self {
        Self::Sequence(outputs.into_iter().map(Into::into).collect())
    }
}

/// Arguments of [`Scope::invoke`]: positional by inlet index, then named.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    positional: Vec<Output>,
    named: Vec<(String, Output)>,
}

impl Arguments {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a positional argument.
    pub fn arg(mut self, value: impl Into<Output>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Adds a named argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Output>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }
}

impl From<()> for Arguments {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl<T: Into<Output>> From<Vec<T>> for Arguments {
    fn from(values: Vec<T>) -> Self {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            named: Vec::new(),
        }
    }
}

impl<T: Into<Output>, const N: usize> From<[T; N]> for Arguments {
    fn from(values: [T; N]) -> Self {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            named: Vec::new(),
        }
    }
}

macro_rules! impl_arguments_tuple {
    ($($name:ident),+) => {
        impl<$($name: Into<Output>),+> From<($($name,)+)> for Arguments {
            #[allow(non_snake_case)]
            fn from(($($name,)+): ($($name,)+)) -> Self {
                Self {
                    positional: vec![$($name.into()),+],
                    named: Vec::new(),
                }
            }
        }
    };
}

impl_arguments_tuple!(A);
impl_arguments_tuple!(A, B);
impl_arguments_tuple!(A, B, C);
impl_arguments_tuple!(A, B, C, D);

/// Construction context of one algorithm.
///
/// Lives only for the duration of one [`AlgorithmBuilder::build`] call.
#[derive(Debug)]
pub struct Scope<'a> {
    id: ScopeId,
    algorithm: &'a Action,
    steps: Vec<Step>,
    binds: IndexMap<Destination, Source>,
}

impl<'a> Scope<'a> {
    fn new(algorithm: &'a Action) -> Self {
        Self {
            id: ScopeId::new(),
            algorithm,
            steps: Vec::new(),
            binds: IndexMap::new(),
        }
    }

    /// Returns the scope id.
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Returns the code of the algorithm under construction.
    pub fn code(&self) -> &str {
        self.algorithm.code()
    }

    /// Returns an inlet of the algorithm by code or index.
    pub fn inlet<'k>(&self, key: impl Into<PortKey<'k>>) -> Result<Terminal> {
        let inlet = self.algorithm.inlet(key)?;
        Ok(Terminal {
            scope: self.id,
            port: Port::Inlet(inlet.index()),
        })
    }

    /// Returns all inlets of the algorithm in declaration order.
    pub fn inlets(&self) -> Vec<Terminal> {
        (0..self.algorithm.inlet_count())
            .map(|index| Terminal {
                scope: self.id,
                port: Port::Inlet(index),
            })
            .collect()
    }

    /// Places `action` as the next step.
    pub fn register(&mut self, action: &Arc<Action>) -> StepHandle {
        let ordinal = self.steps.len();
        self.steps
            .push(Step::new(self.algorithm.code(), ordinal, action.clone()));

        tracing::trace!(
            target: TRACING_TARGET,
            algorithm = self.algorithm.code(),
            step = ordinal,
            action = action.code(),
            "Step registered"
        );

        StepHandle {
            scope: self.id,
            ordinal,
            action: action.clone(),
        }
    }

    /// Binds `source` to `destination`, replacing any earlier bind of that
    /// destination.
    pub fn bind(&mut self, source: impl Into<Output>, destination: Terminal) -> Result<()> {
        let source = self.resolve_source(source.into())?;
        let destination = self.resolve_destination(destination)?;
        self.binds.insert(destination, source);
        Ok(())
    }

    /// Places `action` as the next step and binds its arguments.
    ///
    /// Positional arguments feed inlets by declaration index, named arguments
    /// feed inlets by code.
    pub fn invoke(
        &mut self,
        action: &Arc<Action>,
        arguments: impl Into<Arguments>,
    ) -> Result<StepHandle> {
        let Arguments { positional, named } = arguments.into();
        let step = self.register(action);
        for (index, value) in positional.into_iter().enumerate() {
            self.bind(value, step.inlet(index)?)?;
        }
        for (name, value) in named {
            self.bind(value, step.inlet(&name)?)?;
        }
        Ok(step)
    }

    fn invalid_binding(&self, reason: impl Into<String>) -> Error {
        Error::InvalidBinding {
            algorithm: self.algorithm.code().to_owned(),
            reason: reason.into(),
        }
    }

    fn check_scope(&self, scope: ScopeId) -> Result<()> {
        if scope != self.id {
            return Err(self.invalid_binding("port belongs to another algorithm"));
        }
        Ok(())
    }

    fn resolve_source(&self, output: Output) -> Result<Source> {
        match output {
            Output::Const(value) => Ok(Source::Const(value)),
            Output::Step(step) => {
                self.check_scope(step.scope)?;
                if step.action.outlet_count() > 1 {
                    return Err(Error::AmbiguousStep {
                        step: step.ordinal,
                        action: step.action.code().to_owned(),
                        outlets: step.action.outlet_count(),
                    });
                }
                let outlet = step.outlet(0)?;
                self.resolve_source(Output::Port(outlet))
            }
            Output::Port(terminal) => {
                self.check_scope(terminal.scope)?;
                match terminal.port {
                    Port::Inlet(index) => Ok(Source::Inlet(index)),
                    Port::StepOutlet(port) => Ok(Source::StepOutlet(port)),
                    Port::StepInlet(_) => Err(self.invalid_binding("a step inlet cannot be a source")),
                }
            }
        }
    }

    fn resolve_destination(&self, terminal: Terminal) -> Result<Destination> {
        self.check_scope(terminal.scope)?;
        match terminal.port {
            Port::StepInlet(port) => Ok(Destination::StepInlet(port)),
            Port::Inlet(_) => Err(self.invalid_binding("an algorithm inlet cannot be a destination")),
            Port::StepOutlet(_) => Err(self.invalid_binding("a step outlet cannot be a destination")),
        }
    }

    /// Binds the produced results to the algorithm outlets and returns the graph.
    fn finish(mut self, produced: Produced) -> Result<Graph> {
        let outputs = match produced {
            Produced::Nothing => Vec::new(),
            Produced::Single(output) => vec![output],
            Produced::Sequence(outputs) => outputs,
        };
        if outputs.len() != self.algorithm.outlet_count() {
            return Err(Error::OutletCountMismatch {
                algorithm: self.algorithm.code().to_owned(),
                declared: self.algorithm.outlet_count(),
                received: outputs.len(),
            });
        }

        let sources = outputs
            .into_iter()
            .map(|output| self.resolve_source(output))
            .collect::<Result<Vec<_>>>()?;

        for (index, source) in sources.into_iter().enumerate() {
            self.binds.insert(Destination::Outlet(index), source);
        }

        Ok(Graph::new(self.steps, self.binds))
    }
}

/// Builds algorithms into a [`Catalog`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AlgorithmBuilder;

impl AlgorithmBuilder {
    /// Builds and registers an algorithm.
    ///
    /// The code is checked for duplicates before `builder` runs. The result
    /// of `builder` must match the declared outlets in number; every
    /// non-context step inlet must end up bound. The algorithm is registered
    /// only if all of this holds.
    pub fn build<F, P>(
        catalog: &mut Catalog,
        code: impl Into<String>,
        in_params: impl IntoIterator<Item = Parameter>,
        out_params: impl IntoIterator<Item = Parameter>,
        builder: F,
    ) -> Result<Arc<Action>>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<P>,
        P: Into<Produced>,
    {
        let code = code.into();
        catalog.ensure_vacant(&code)?;

        let shell = Action::new(code, in_params, out_params)?;
        let mut scope = Scope::new(&shell);
        let produced = builder(&mut scope)?.into();
        let graph = scope.finish(produced)?;
        graph.validate(shell.code())?;

        let steps = graph.steps().len();
        let binds = graph.bind_count();
        let algorithm = Arc::new(shell.with_graph(graph));
        catalog.insert_algorithm(algorithm.clone())?;

        tracing::debug!(
            target: TRACING_TARGET,
            algorithm = algorithm.code(),
            steps,
            binds,
            "Algorithm built"
        );

        Ok(algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::Type;

    fn numeric(name: &str) -> Parameter {
        Parameter::new(name, Type::numeric())
    }

    struct Library {
        catalog: Catalog,
        negation: Arc<Action>,
        sum: Arc<Action>,
        divmod: Arc<Action>,
    }

    fn library() -> Library {
        let mut catalog = Catalog::new();
        let negation = catalog
            .declare("Negation", [numeric("a")], [numeric("res")])
            .unwrap();
        let sum = catalog
            .declare("Sum", [numeric("a"), numeric("b")], [numeric("res")])
            .unwrap();
        let divmod = catalog
            .declare("DivMod", [numeric("a"), numeric("b")], [numeric("div"), numeric("rem")])
            .unwrap();
        Library {
            catalog,
            negation,
            sum,
            divmod,
        }
    }

    fn binds(algorithm: &Action) -> Vec<(Destination, Source)> {
        algorithm
            .graph()
            .unwrap()
            .binds()
            .map(|(d, s)| (*d, s.clone()))
            .collect()
    }

    #[test]
    fn test_explicit_and_invoke_forms_build_the_same_graph() {
        let Library {
            mut catalog,
            negation,
            sum,
            ..
        } = library();

        let explicit = AlgorithmBuilder::build(
            &mut catalog,
            "Subtraction",
            [numeric("a"), numeric("b")],
            [numeric("res")],
            |scope| {
                let neg = scope.register(&negation);
                scope.bind(scope.inlet("b")?, neg.inlet("a")?)?;
                let add = scope.register(&sum);
                scope.bind(scope.inlet("a")?, add.inlet("a")?)?;
                scope.bind(neg.outlet("res")?, add.inlet("b")?)?;
                Ok(add.outlet(0)?)
            },
        )
        .unwrap();

        let sugared = AlgorithmBuilder::build(
            &mut catalog,
            "SubtractionSugar",
            [numeric("a"), numeric("b")],
            [numeric("res")],
            |scope| {
                let (a, b) = (scope.inlet("a")?, scope.inlet("b")?);
                let neg = scope.invoke(&negation, [b])?;
                let add = scope.invoke(&sum, Arguments::new().arg(a).kwarg("b", neg))?;
                Ok(add)
            },
        )
        .unwrap();

        assert!(explicit.is_algorithm());
        assert_eq!(binds(&explicit), binds(&sugared));
        assert_eq!(explicit.graph().unwrap().steps().len(), 2);
        assert!(catalog.algorithm("Subtraction").is_ok());
        assert!(catalog.action("SubtractionSugar").is_ok());
    }

    #[test]
    fn test_literals_are_bound_as_constants() {
        let Library {
            mut catalog, sum, ..
        } = library();

        let increment = AlgorithmBuilder::build(
            &mut catalog,
            "Increment",
            [numeric("a")],
            [numeric("res")],
            |scope| {
                let a = scope.inlet("a")?;
                scope.invoke(&sum, (a, 1))
            },
        )
        .unwrap();

        let graph = increment.graph().unwrap();
        let source = graph.source_of(&Destination::StepInlet(StepPort::new(0, 1)));
        assert_eq!(source, Some(&Source::Const(Value::from(1))));
    }

    #[test]
    fn test_outlet_count_must_match_for_any_arity() {
        let Library {
            mut catalog,
            negation,
            ..
        } = library();

        let error = AlgorithmBuilder::build(&mut catalog, "None", [numeric("a")], [], |scope| {
            scope.inlet("a")
        })
        .unwrap_err();
        assert!(matches!(error, Error::OutletCountMismatch { declared: 0, received: 1, .. }));

        let error = AlgorithmBuilder::build(
            &mut catalog,
            "One",
            [numeric("a")],
            [numeric("res")],
            |_| Ok(()),
        )
        .unwrap_err();
        assert!(matches!(error, Error::OutletCountMismatch { declared: 1, received: 0, .. }));

        let error = AlgorithmBuilder::build(
            &mut catalog,
            "Two",
            [numeric("a")],
            [numeric("x"), numeric("y")],
            |scope| {
                let a = scope.inlet("a")?;
                scope.invoke(&negation, [a])
            },
        )
        .unwrap_err();
        assert!(matches!(error, Error::OutletCountMismatch { declared: 2, received: 1, .. }));
        assert_eq!(error.kind(), ErrorKind::InvalidParams);

        assert!(AlgorithmBuilder::build(&mut catalog, "Empty", [], [], |_| Ok(())).is_ok());
    }

    #[test]
    fn test_zero_outlet_step_as_result_is_invalid_params() {
        let Library { mut catalog, .. } = library();
        let notify = catalog
            .declare("Notify", [Parameter::new("message", Type::string())], [])
            .unwrap();

        let error = AlgorithmBuilder::build(
            &mut catalog,
            "NotifyTwice",
            [Parameter::new("message", Type::string())],
            [],
            |scope| {
                let message = scope.inlet("message")?;
                scope.invoke(&notify, [message])?;
                scope.invoke(&notify, [message])
            },
        )
        .unwrap_err();
        assert!(matches!(error, Error::OutletCountMismatch { declared: 0, received: 1, .. }));
        assert_eq!(error.kind(), ErrorKind::InvalidParams);

        let error = AlgorithmBuilder::build(
            &mut catalog,
            "NotifyValue",
            [Parameter::new("message", Type::string())],
            [numeric("res")],
            |scope| {
                let message = scope.inlet("message")?;
                scope.invoke(&notify, [message])
            },
        )
        .unwrap_err();
        assert!(matches!(error, Error::UnknownPort { direction: Direction::Out, .. }));
        assert_eq!(error.kind(), ErrorKind::InvalidParams);

        assert!(catalog.algorithm("NotifyTwice").is_err());
        assert!(catalog.algorithm("NotifyValue").is_err());
    }

    #[test]
    fn test_multi_outlet_step_cannot_stand_in_for_a_value() {
        let Library {
            mut catalog,
            divmod,
            ..
        } = library();

        let error = AlgorithmBuilder::build(
            &mut catalog,
            "Quotient",
            [numeric("a"), numeric("b")],
            [numeric("res")],
            |scope| {
                let args = scope.inlets();
                scope.invoke(&divmod, args)
            },
        )
        .unwrap_err();
        assert!(matches!(error, Error::AmbiguousStep { outlets: 2, .. }));
        assert_eq!(error.kind(), ErrorKind::InvalidDeclaration);

        let split = AlgorithmBuilder::build(
            &mut catalog,
            "Split",
            [numeric("a"), numeric("b")],
            [numeric("div"), numeric("rem")],
            |scope| {
                let args = scope.inlets();
                let step = scope.invoke(&divmod, args)?;
                Ok([step.outlet("div")?, step.outlet("rem")?])
            },
        );
        assert!(split.is_ok());
    }

    #[test]
    fn test_unbound_inlet_fails_and_registers_nothing() {
        let Library {
            mut catalog, sum, ..
        } = library();

        let error = AlgorithmBuilder::build(
            &mut catalog,
            "Half",
            [numeric("a")],
            [numeric("res")],
            |scope| {
                let a = scope.inlet("a")?;
                scope.invoke(&sum, [a])
            },
        )
        .unwrap_err();
        assert!(matches!(error, Error::UnboundInlet { ref inlet, .. } if inlet == "b"));
        assert!(catalog.algorithm("Half").is_err());
        assert!(catalog.action("Half").is_err());
    }

    #[test]
    fn test_duplicate_code_is_rejected_before_building() {
        let Library {
            mut catalog,
            negation,
            ..
        } = library();
        let mut called = false;

        let error = AlgorithmBuilder::build(
            &mut catalog,
            "Negation",
            [numeric("a")],
            [numeric("res")],
            |scope| {
                called = true;
                let a = scope.inlet("a")?;
                scope.invoke(&negation, [a])
            },
        )
        .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AlreadyExists);
        assert!(!called);
    }

    #[test]
    fn test_handles_do_not_cross_scopes() {
        let Library {
            mut catalog,
            negation,
            ..
        } = library();
        let mut leaked = None;

        AlgorithmBuilder::build(
            &mut catalog,
            "First",
            [numeric("a")],
            [numeric("res")],
            |scope| {
                let a = scope.inlet("a")?;
                leaked = Some(a);
                scope.invoke(&negation, [a])
            },
        )
        .unwrap();

        let error = AlgorithmBuilder::build(
            &mut catalog,
            "Second",
            [numeric("a")],
            [numeric("res")],
            |_| Ok(leaked.unwrap()),
        )
        .unwrap_err();
        assert!(matches!(error, Error::InvalidBinding { .. }));
    }

    #[test]
    fn test_ports_used_in_the_wrong_role_are_rejected() {
        let Library {
            mut catalog,
            negation,
            ..
        } = library();

        let error = AlgorithmBuilder::build(
            &mut catalog,
            "Backwards",
            [numeric("a")],
            [numeric("res")],
            |scope| {
                let step = scope.register(&negation);
                scope.bind(step.outlet(0)?, scope.inlet("a")?)?;
                Ok(step)
            },
        )
        .unwrap_err();
        assert!(matches!(error, Error::InvalidBinding { .. }));

        let error = AlgorithmBuilder::build(
            &mut catalog,
            "TooMany",
            [numeric("a")],
            [numeric("res")],
            |scope| {
                let a = scope.inlet("a")?;
                scope.invoke(&negation, [a, a])
            },
        )
        .unwrap_err();
        assert!(matches!(error, Error::UnknownPort { .. }));
    }
}
