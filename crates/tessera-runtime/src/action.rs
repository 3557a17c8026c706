//! Actions: named contracts of ordered inlets and outlets.

use std::fmt;

use indexmap::IndexMap;
use strum::{AsRefStr, Display};

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::types::{Rejection, Type};
use crate::value::{Value, Values};

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    /// Input port.
    In,
    /// Output port.
    Out,
}

/// A named, typed value slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    ty: Type,
}

impl Parameter {
    /// Creates a parameter.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// The conventional `context` parameter of the context sentinel type.
    pub fn context() -> Self {
        Self::new("context", Type::context())
    }

    /// Returns the parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parameter type.
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Validates a value against the parameter type.
    pub fn validate(&self, value: Value) -> Result<Value, Rejection> {
        self.ty.validate(value)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

/// Port lookup key: by code or by declaration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKey<'a> {
    /// Port name.
    Code(&'a str),
    /// Zero-based declaration index.
    Index(usize),
}

impl<'a> From<&'a str> for PortKey<'a> {
    fn from(code: &'a str) -> Self {
        Self::Code(code)
    }
}

impl<'a> From<&'a String> for PortKey<'a> {
    fn from(code: &'a String) -> Self {
        Self::Code(code)
    }
}

impl From<usize> for PortKey<'_> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PortKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "code `{code}`"),
            Self::Index(index) => write!(f, "index `{index}`"),
        }
    }
}

/// A parameter bound to an action as an input or output port.
#[derive(Debug, Clone, Copy)]
pub struct Let<'a> {
    action: &'a Action,
    parameter: &'a Parameter,
    index: usize,
    direction: Direction,
}

impl<'a> Let<'a> {
    /// Returns the owning action.
    pub fn action(&self) -> &'a Action {
        self.action
    }

    /// Returns the bound parameter.
    pub fn parameter(&self) -> &'a Parameter {
        self.parameter
    }

    /// Returns the port code (the parameter name).
    pub fn code(&self) -> &'a str {
        self.parameter.name()
    }

    /// Returns the declaration index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the port direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the parameter type.
    pub fn ty(&self) -> &'a Type {
        self.parameter.ty()
    }

    /// Returns whether the port receives the execution context.
    pub fn is_context(&self) -> bool {
        self.ty().is_context()
    }

    /// Validates a value against the port type.
    pub fn validate(&self, value: Value) -> Result<Value, Rejection> {
        self.parameter.validate(value)
    }
}

impl fmt::Display for Let<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}let `{}` of `{}`", self.direction, self.code(), self.action.code)
    }
}

/// A named operation contract: ordered inlets and ordered outlets.
///
/// An action whose behavior is a graph of steps is an algorithm; it carries
/// its [`Graph`] and is registered in both the action and the algorithm pools.
#[derive(Debug, Clone)]
pub struct Action {
    code: String,
    inlets: IndexMap<String, Parameter>,
    outlets: IndexMap<String, Parameter>,
    graph: Option<Graph>,
}

impl Action {
    /// Creates an action with the given ports.
    ///
    /// Registration happens through [`Catalog::declare`](crate::Catalog::declare).
    pub(crate) fn new(
        code: impl Into<String>,
        in_params: impl IntoIterator<Item = Parameter>,
        out_params: impl IntoIterator<Item = Parameter>,
    ) -> Result<Self> {
        let mut action = Self {
            code: code.into(),
            inlets: IndexMap::new(),
            outlets: IndexMap::new(),
            graph: None,
        };
        action.register_in_params(in_params)?;
        action.register_out_params(out_params)?;
        Ok(action)
    }

    /// Builds the ordered inlet map.
    pub(crate) fn register_in_params(
        &mut self,
        params: impl IntoIterator<Item = Parameter>,
    ) -> Result<()> {
        self.inlets = self.port_map(Direction::In, params)?;
        Ok(())
    }

    /// Builds the ordered outlet map.
    pub(crate) fn register_out_params(
        &mut self,
        params: impl IntoIterator<Item = Parameter>,
    ) -> Result<()> {
        self.outlets = self.port_map(Direction::Out, params)?;
        Ok(())
    }

    fn port_map(
        &self,
        direction: Direction,
        params: impl IntoIterator<Item = Parameter>,
    ) -> Result<IndexMap<String, Parameter>> {
        let mut ports = IndexMap::new();
        for param in params {
            let name = param.name().to_owned();
            if ports.insert(name.clone(), param).is_some() {
                return Err(Error::DuplicatePort {
                    action: self.code.clone(),
                    direction,
                    name,
                });
            }
        }
        Ok(ports)
    }

    /// Turns this action into an algorithm defined by `graph`.
    pub(crate) fn with_graph(mut self, graph: Graph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Returns the action code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the graph if this action is an algorithm.
    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    /// Returns whether this action is an algorithm.
    pub fn is_algorithm(&self) -> bool {
        self.graph.is_some()
    }

    /// Returns the inlet names in declaration order.
    pub fn inlet_names(&self) -> impl Iterator<Item = &str> {
        self.inlets.keys().map(String::as_str)
    }

    /// Returns the outlet names in declaration order.
    pub fn outlet_names(&self) -> impl Iterator<Item = &str> {
        self.outlets.keys().map(String::as_str)
    }

    /// Returns the number of inlets.
    pub fn inlet_count(&self) -> usize {
        self.inlets.len()
    }

    /// Returns the number of outlets.
    pub fn outlet_count(&self) -> usize {
        self.outlets.len()
    }

    /// Returns the inlets in declaration order.
    pub fn inlets(&self) -> impl Iterator<Item = Let<'_>> {
        self.lets(Direction::In)
    }

    /// Returns the outlets in declaration order.
    pub fn outlets(&self) -> impl Iterator<Item = Let<'_>> {
        self.lets(Direction::Out)
    }

    /// Returns an inlet by code or index.
    pub fn inlet<'k>(&self, key: impl Into<PortKey<'k>>) -> Result<Let<'_>> {
        self.get_let(Direction::In, key.into())
    }

    /// Returns an outlet by code or index.
    pub fn outlet<'k>(&self, key: impl Into<PortKey<'k>>) -> Result<Let<'_>> {
        self.get_let(Direction::Out, key.into())
    }

    /// Returns the first inlet of the context type, if any.
    pub fn context_inlet(&self) -> Option<Let<'_>> {
        self.inlets().find(Let::is_context)
    }

    fn ports(&self, direction: Direction) -> &IndexMap<String, Parameter> {
        match direction {
            Direction::In => &self.inlets,
            Direction::Out => &self.outlets,
        }
    }

    fn lets(&self, direction: Direction) -> impl Iterator<Item = Let<'_>> {
        self.ports(direction)
            .values()
            .enumerate()
            .map(move |(index, parameter)| Let {
                action: self,
                parameter,
                index,
                direction,
            })
    }

    fn get_let(&self, direction: Direction, key: PortKey<'_>) -> Result<Let<'_>> {
        let ports = self.ports(direction);
        let found = match key {
            PortKey::Code(code) => ports.get_full(code).map(|(index, _, p)| (index, p)),
            PortKey::Index(index) => ports.get_index(index).map(|(_, p)| (index, p)),
        };
        let (index, parameter) = found.ok_or_else(|| Error::UnknownPort {
            owner: format!("action `{}`", self.code),
            direction,
            port: key.to_string(),
        })?;
        Ok(Let {
            action: self,
            parameter,
            index,
            direction,
        })
    }

    /// Validates call-time inputs: exact key set, then per-port types.
    ///
    /// Returns the inputs in declaration order with coerced values.
    pub fn validate_inputs(&self, values: Values) -> Result<Values> {
        self.validate_values(Direction::In, values)
    }

    /// Validates results: exact key set, then per-port types.
    ///
    /// Returns the outputs in declaration order with coerced values.
    pub fn validate_outputs(&self, values: Values) -> Result<Values> {
        self.validate_values(Direction::Out, values)
    }

    fn validate_values(&self, direction: Direction, values: Values) -> Result<Values> {
        self.validate_quantity(direction, &values)?;
        self.validate_quality(direction, values)
    }

    fn validate_quantity(&self, direction: Direction, values: &Values) -> Result<()> {
        let ports = self.ports(direction);
        let unexpected: Vec<String> = values
            .keys()
            .filter(|key| !ports.contains_key(*key))
            .map(str::to_owned)
            .collect();
        let missing: Vec<String> = ports
            .keys()
            .filter(|key| !values.contains_key(key))
            .cloned()
            .collect();

        if unexpected.is_empty() && missing.is_empty() {
            return Ok(());
        }

        Err(Error::MismatchedKeys {
            action: self.code.clone(),
            direction,
            unexpected,
            missing,
        })
    }

    fn validate_quality(&self, direction: Direction, mut values: Values) -> Result<Values> {
        let mut validated = Values::new();
        for (name, parameter) in self.ports(direction) {
            let Some(value) = values.remove(name) else {
                continue;
            };
            let rendered = value.to_string();
            match parameter.validate(value) {
                Ok(value) => {
                    validated.insert(name.clone(), value);
                }
                Err(Rejection::Invalid(reason)) => {
                    return Err(Error::InvalidType {
                        action: self.code.clone(),
                        direction,
                        parameter: name.clone(),
                        value: rendered,
                        expected: parameter.ty().code().to_owned(),
                        reason,
                    });
                }
                Err(Rejection::Unexpected(source)) => {
                    return Err(Error::Unexpected {
                        type_code: parameter.ty().code().to_owned(),
                        source,
                    });
                }
            }
        }
        Ok(validated)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_algorithm() {
            "Algorithm"
        } else {
            "Action"
        };
        let inlets: Vec<&str> = self.inlet_names().collect();
        let outlets: Vec<&str> = self.outlet_names().collect();
        write!(
            f,
            "{kind} `{}`({}) -> {}",
            self.code,
            inlets.join(","),
            outlets.join(",")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sum() -> Action {
        Action::new(
            "Sum",
            [
                Parameter::new("a", Type::numeric()),
                Parameter::new("b", Type::numeric()),
            ],
            [Parameter::new("res", Type::numeric())],
        )
        .unwrap()
    }

    #[test]
    fn test_ports_keep_declaration_order() {
        let action = sum();
        assert_eq!(action.inlet_names().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(action.outlet_names().collect::<Vec<_>>(), ["res"]);
        assert_eq!(action.to_string(), "Action `Sum`(a,b) -> res");
    }

    #[test]
    fn test_get_let_by_code_and_index() {
        let action = sum();
        assert_eq!(action.inlet("b").unwrap().index(), 1);
        assert_eq!(action.inlet(0).unwrap().code(), "a");
        assert_eq!(action.outlet(0).unwrap().direction(), Direction::Out);

        let error = action.inlet("c").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidParams);
        let error = action.outlet(1).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidParams);
    }

    #[test]
    fn test_duplicate_port_names_are_rejected() {
        let error = Action::new(
            "Twice",
            [
                Parameter::new("a", Type::any()),
                Parameter::new("a", Type::any()),
            ],
            [],
        )
        .unwrap_err();
        assert!(matches!(error, Error::DuplicatePort { direction: Direction::In, .. }));
    }

    #[test]
    fn test_validate_inputs_accepts_exact_keys() {
        let validated = sum()
            .validate_inputs(Values::new().with("b", 2).with("a", "1"))
            .unwrap();
        assert_eq!(validated.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(validated["a"].as_f64(), Some(1.0));
        assert_eq!(validated["b"], Value::from(2));
    }

    #[test]
    fn test_validate_inputs_reports_unexpected_and_missing() {
        let error = sum()
            .validate_inputs(Values::new().with("a", 1).with("c", 3))
            .unwrap_err();
        match error {
            Error::MismatchedKeys {
                direction,
                unexpected,
                missing,
                ..
            } => {
                assert_eq!(direction, Direction::In);
                assert_eq!(unexpected, ["c"]);
                assert_eq!(missing, ["b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_outputs_reports_only_missing() {
        let error = sum().validate_outputs(Values::new()).unwrap_err();
        assert!(matches!(
            error,
            Error::MismatchedKeys { direction: Direction::Out, ref unexpected, ref missing, .. }
                if unexpected.is_empty() && missing == &["res"]
        ));
    }

    #[test]
    fn test_invalid_type_names_action_parameter_and_value() {
        let error = sum()
            .validate_inputs(Values::new().with("a", "x").with("b", 1))
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidType);
        let message = error.to_string();
        assert!(message.contains("`Sum`"));
        assert!(message.contains("`a`"));
        assert!(message.contains("\"x\""));
        assert!(message.contains("`Numeric`"));
    }

    #[test]
    fn test_unexpected_validator_failure_is_wrapped() {
        let flaky = Type::new("Flaky", |_| Err(Rejection::unexpected("boom")));
        let action = Action::new("Probe", [Parameter::new("a", flaky)], []).unwrap();
        let error = action
            .validate_inputs(Values::new().with("a", 1))
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn test_context_inlet_is_found() {
        let action = Action::new(
            "Create",
            [Parameter::context(), Parameter::new("name", Type::any())],
            [],
        )
        .unwrap();
        assert_eq!(action.context_inlet().map(|l| l.code()), Some("context"));
        assert!(sum().context_inlet().is_none());
    }
}
