//! Strategies: concrete ways to compute an action.
//!
//! A [`Strategy`] binds an action to an [`EngineKey`] and a target, which is
//! either a host [`Callable`] or another [`Action`] (usually an algorithm)
//! that the interpreter evaluates in its place.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use derive_more::{Debug, Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::action::Action;
use crate::error::{BoxedError, Error, Result};
use crate::value::{Object, Value, Values};

/// Name of an engine a strategy is registered under.
///
/// Engine keys are compared as strings; integer keys are rendered in decimal.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize, From, Into)]
#[debug("{_0:?}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct EngineKey(String);

impl EngineKey {
    /// Creates an engine key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EngineKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

macro_rules! impl_engine_key_from_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for EngineKey {
                fn from(key: $ty) -> Self {
                    Self(key.to_string())
                }
            }
        )*
    };
}

impl_engine_key_from_int!(i32, i64, u32, u64);

type Body = Arc<dyn Fn(&Values) -> Result<Returned, BoxedError> + Send + Sync>;

/// A host function with a declared keyword signature.
#[derive(Clone)]
pub struct Callable {
    signature: Vec<String>,
    body: Body,
}

impl Callable {
    /// Creates a callable accepting exactly the named keyword arguments.
    pub fn new<I, S, F, R>(signature: I, body: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Values) -> Result<R, BoxedError> + Send + Sync + 'static,
        R: Into<Returned>,
    {
        Self {
            signature: signature.into_iter().map(Into::into).collect(),
            body: Arc::new(move |args| body(args).map(Into::into)),
        }
    }

    /// Returns the accepted keyword names.
    pub fn signature(&self) -> &[String] {
        &self.signature
    }

    /// Returns whether the callable accepts exactly these keyword names.
    pub fn accepts(&self, args: &Values) -> bool {
        let expected: BTreeSet<&str> = self.signature.iter().map(String::as_str).collect();
        let received: BTreeSet<&str> = args.keys().collect();
        expected == received
    }

    fn call(&self, args: &Values) -> Result<Returned, BoxedError> {
        (self.body)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self.signature.join(", "))
    }
}

/// What a callable returned, before it is matched to the declared outlets.
#[derive(Debug, Clone, PartialEq)]
pub enum Returned {
    /// No value.
    Nothing,
    /// One value.
    Single(Value),
    /// Positional values.
    Sequence(Vec<Value>),
    /// Values keyed by outlet name, passed through unchanged.
    Named(Values),
}

impl Returned {
    /// Maps the returned values onto the outlets of `action`.
    ///
    /// Actions without outlets discard the result. Otherwise a single value
    /// becomes a one-element sequence, and the sequence must match the outlet
    /// count exactly. Named results are returned as they are and checked by
    /// output validation.
    pub fn into_outputs(self, action: &Action) -> Result<Values> {
        if action.outlet_count() == 0 {
            return Ok(Values::new());
        }

        let results = match self {
            Self::Named(values) => return Ok(values),
            Self::Nothing => Vec::new(),
            Self::Single(value) => vec![value],
            Self::Sequence(values) => values,
        };

        if results.len() != action.outlet_count() {
            return Err(Error::ResultCountMismatch {
                action: action.code().to_owned(),
                declared: action.outlet_count(),
                received: results.len(),
            });
        }

        Ok(action.outlet_names().zip(results).collect())
    }
}

impl From<()> for Returned {
    fn from(_: ()) -> Self {
        Self::Nothing
    }
}

impl From<Value> for Returned {
    fn from(value: Value) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<Value>> for Returned {
    fn from(values: Vec<Value>) -> Self {
        Self::Sequence(values)
    }
}

impl From<Values> for Returned {
    fn from(values: Values) -> Self {
        Self::Named(values)
    }
}

macro_rules! impl_returned_single {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Returned {
                fn from(value: $ty) -> Self {
                    Self::Single(Value::from(value))
                }
            }
        )*
    };
}

impl_returned_single!(JsonValue, Object, bool, i32, i64, f64, &str, String);

/// What a strategy runs.
#[derive(Debug, Clone)]
pub enum StrategyTarget {
    /// A host function.
    Callable(Callable),
    /// Another action evaluated by the interpreter with the same inputs.
    SubAction(Arc<Action>),
}

/// A concrete way to compute an action, tagged with an engine key.
#[derive(Debug, Clone)]
pub struct Strategy {
    action: Arc<Action>,
    engine: EngineKey,
    target: StrategyTarget,
}

impl Strategy {
    /// Creates a strategy.
    pub fn new(action: Arc<Action>, engine: impl Into<EngineKey>, target: StrategyTarget) -> Self {
        Self {
            action,
            engine: engine.into(),
            target,
        }
    }

    /// Returns the implemented action.
    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }

    /// Returns the engine key.
    pub fn engine(&self) -> &EngineKey {
        &self.engine
    }

    /// Returns the target.
    pub fn target(&self) -> &StrategyTarget {
        &self.target
    }

    /// Calls the target function with keyword arguments.
    ///
    /// Only callable targets can be evaluated directly; delegating strategies
    /// are resolved by the [`Interpreter`](crate::Interpreter).
    pub fn evaluate(&self, args: &Values) -> Result<Returned> {
        let callable = match &self.target {
            StrategyTarget::Callable(callable) => callable,
            StrategyTarget::SubAction(target) => {
                return Err(Error::NotCallable {
                    action: self.action.code().to_owned(),
                    engine: self.engine.clone(),
                    target: target.code().to_owned(),
                });
            }
        };

        if !callable.accepts(args) {
            return Err(Error::SignatureMismatch {
                action: self.action.code().to_owned(),
                engine: self.engine.clone(),
                expected: callable.signature().to_vec(),
                received: args.keys().map(str::to_owned).collect(),
            });
        }

        callable.call(args).map_err(|source| Error::ExecutionFailed {
            action: self.action.code().to_owned(),
            engine: self.engine.clone(),
            source,
        })
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            StrategyTarget::Callable(_) => {
                write!(f, "Strategy `{}` [{}]: callable", self.action.code(), self.engine)
            }
            StrategyTarget::SubAction(target) => write!(
                f,
                "Strategy `{}` [{}]: `{}`",
                self.action.code(),
                self.engine,
                target.code()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Parameter;
    use crate::error::ErrorKind;
    use crate::types::Type;

    fn action(outlets: &[&str]) -> Arc<Action> {
        let outs = outlets
            .iter()
            .map(|name| Parameter::new(*name, Type::any()));
        Arc::new(Action::new("Probe", [Parameter::new("a", Type::any())], outs).unwrap())
    }

    fn echo() -> Callable {
        Callable::new(["a"], |args: &Values| Ok(args.value("a")?.clone()))
    }

    #[test]
    fn test_engine_keys_from_integers_match_strings() {
        assert_eq!(EngineKey::from(1), EngineKey::new("1"));
        assert_eq!(EngineKey::from("sql").to_string(), "sql");
    }

    #[test]
    fn test_single_result_fills_single_outlet() {
        let outputs = Returned::from(5).into_outputs(&action(&["res"])).unwrap();
        assert_eq!(outputs, Values::new().with("res", 5));
    }

    #[test]
    fn test_sequence_is_zipped_by_position() {
        let returned = Returned::from(vec![Value::from(1), Value::from(2)]);
        let outputs = returned.into_outputs(&action(&["x", "y"])).unwrap();
        assert_eq!(outputs.keys().collect::<Vec<_>>(), ["x", "y"]);
        assert_eq!(outputs["y"], Value::from(2));
    }

    #[test]
    fn test_zero_outlets_discard_results() {
        let outputs = Returned::from("ignored").into_outputs(&action(&[])).unwrap();
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_result_count_must_match() {
        let error = Returned::from(1).into_outputs(&action(&["x", "y"])).unwrap_err();
        assert!(matches!(
            error,
            Error::ResultCountMismatch { declared: 2, received: 1, .. }
        ));
        assert_eq!(error.kind(), ErrorKind::InvalidDeclaration);
    }

    #[test]
    fn test_accepts_exact_keyword_set_in_any_order() {
        let callable = Callable::new(["a", "b"], |_: &Values| Ok(()));

        assert!(callable.accepts(&Values::new().with("b", 1).with("a", 2)));
        assert!(!callable.accepts(&Values::new().with("a", 1)));
        assert!(!callable.accepts(&Values::new().with("a", 1).with("b", 2).with("c", 3)));
    }

    #[test]
    fn test_evaluate_checks_signature() {
        let strategy = Strategy::new(action(&["res"]), 1, StrategyTarget::Callable(echo()));
        let returned = strategy.evaluate(&Values::new().with("a", 3)).unwrap();
        assert_eq!(returned, Returned::from(3));

        let error = strategy
            .evaluate(&Values::new().with("b", 3))
            .unwrap_err();
        assert!(matches!(error, Error::SignatureMismatch { .. }));
    }

    #[test]
    fn test_evaluate_wraps_body_errors() {
        let failing = Callable::new(["a"], |_: &Values| -> Result<Returned, BoxedError> {
            Err("division by zero".into())
        });
        let strategy = Strategy::new(action(&["res"]), "native", StrategyTarget::Callable(failing));
        let error = strategy.evaluate(&Values::new().with("a", 0)).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ExecutionFailed);
    }

    #[test]
    fn test_sub_action_target_is_not_callable() {
        let strategy = Strategy::new(
            action(&["res"]),
            2,
            StrategyTarget::SubAction(action(&["res"])),
        );
        let error = strategy.evaluate(&Values::new().with("a", 1)).unwrap_err();
        assert!(matches!(error, Error::NotCallable { .. }));
    }
}
