//! Value types and their validators.
//!
//! A [`Type`] pairs a code with a validator: a single-argument predicate that
//! accepts a value (possibly coercing it) or rejects it. Builtin types:
//! - [`Type::any`]: accepts everything unchanged
//! - [`Type::numeric`]: numbers, booleans as 0 or 1, and strings parsed as numbers
//! - [`Type::string`]: strings, anything else becomes the empty string
//! - [`Type::context`]: the sentinel for ports that receive the context

use std::fmt;
use std::sync::Arc;

use serde_json::{Number, Value as JsonValue};
use thiserror::Error;

use crate::error::BoxedError;
use crate::value::Value;

/// Code of the builtin type that accepts anything.
pub const ANY: &str = "Any";
/// Code of the builtin numeric type.
pub const NUMERIC: &str = "Numeric";
/// Code of the builtin string type.
pub const STRING: &str = "String";
/// Code of the context sentinel type.
pub const CONTEXT: &str = "Context";

/// Failure reported by a type validator.
#[derive(Debug, Error)]
pub enum Rejection {
    /// The value is not admissible for the type.
    #[error("{0}")]
    Invalid(String),
    /// The validator itself failed.
    #[error(transparent)]
    Unexpected(BoxedError),
}

impl Rejection {
    /// Creates a rejection for an inadmissible value.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Creates a rejection for an internal validator failure.
    pub fn unexpected(source: impl Into<BoxedError>) -> Self {
        Self::Unexpected(source.into())
    }
}

type Validator = Arc<dyn Fn(Value) -> Result<Value, Rejection> + Send + Sync>;

/// A named value type with a validator.
#[derive(Clone)]
pub struct Type {
    code: String,
    validator: Validator,
    context: bool,
}

impl Type {
    /// Creates a type from a code and a validator.
    ///
    /// The validator returns the admissible (possibly coerced) value. Coercion
    /// must be idempotent: validating its own output yields the same value.
    pub fn new<F>(code: impl Into<String>, validator: F) -> Self
    where
        F: Fn(Value) -> Result<Value, Rejection> + Send + Sync + 'static,
    {
        Self {
            code: code.into(),
            validator: Arc::new(validator),
            context: false,
        }
    }

    /// Type that accepts any value unchanged.
    pub fn any() -> Self {
        Self::new(ANY, Ok)
    }

    /// Numeric type: JSON numbers pass, booleans become 0 or 1, strings are
    /// parsed as floats.
    pub fn numeric() -> Self {
        Self::new(NUMERIC, |value| match value {
            Value::Json(JsonValue::Number(_)) => Ok(value),
            Value::Json(JsonValue::Bool(flag)) => Ok(Value::from(u64::from(flag))),
            Value::Json(JsonValue::String(ref s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(|n| Value::Json(JsonValue::Number(n)))
                .ok_or_else(|| Rejection::invalid(format!("could not convert string to float: {s:?}"))),
            other => Err(Rejection::invalid(format!("{other} is not a number"))),
        })
    }

    /// String type: strings pass, any other value becomes the empty string.
    pub fn string() -> Self {
        Self::new(STRING, |value| match value {
            Value::Json(JsonValue::String(_)) => Ok(value),
            _ => Ok(Value::Json(JsonValue::String(String::new()))),
        })
    }

    /// Sentinel type of ports that receive the execution context.
    pub fn context() -> Self {
        Self {
            context: true,
            ..Self::new(CONTEXT, |value| match value {
                Value::Context(_) => Ok(value),
                other => Err(Rejection::invalid(format!("{other} is not the execution context"))),
            })
        }
    }

    /// Returns the type code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns whether this is the context sentinel type.
    pub fn is_context(&self) -> bool {
        self.context
    }

    /// Validates a value, returning the admissible value.
    pub fn validate(&self, value: Value) -> Result<Value, Rejection> {
        (self.validator)(value)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.context == other.context
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type(code={})", self.code)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::context::Context;

    #[test]
    fn test_numeric_coerces_strings() {
        let numeric = Type::numeric();
        let coerced = numeric.validate(Value::from("1")).unwrap();
        assert_eq!(coerced.as_f64(), Some(1.0));

        let again = numeric.validate(coerced.clone()).unwrap();
        assert_eq!(again, coerced);

        assert_eq!(numeric.validate(Value::from(2)).unwrap(), Value::from(2));
    }

    #[test]
    fn test_numeric_rejects_garbage() {
        let numeric = Type::numeric();
        assert!(matches!(numeric.validate(Value::from("one")), Err(Rejection::Invalid(_))));
        assert!(matches!(numeric.validate(Value::from(json!([1]))), Err(Rejection::Invalid(_))));
        assert!(matches!(numeric.validate(Value::from(JsonValue::Null)), Err(Rejection::Invalid(_))));
    }

    #[test]
    fn test_numeric_treats_booleans_as_integers() {
        let numeric = Type::numeric();
        let one = numeric.validate(Value::from(true)).unwrap();
        assert_eq!(one.as_f64(), Some(1.0));
        assert_eq!(numeric.validate(Value::from(false)).unwrap().as_f64(), Some(0.0));
        assert_eq!(numeric.validate(one.clone()).unwrap(), one);
    }

    #[test]
    fn test_string_falls_back_to_empty() {
        let string = Type::string();
        assert_eq!(string.validate(Value::from("abc")).unwrap(), Value::from("abc"));
        assert_eq!(string.validate(Value::from(5)).unwrap(), Value::from(""));
    }

    #[test]
    fn test_context_accepts_only_context() {
        let context = Type::context();
        assert!(context.is_context());
        assert!(context.validate(Value::from(Context::new())).is_ok());
        assert!(context.validate(Value::from(1)).is_err());
        assert!(!Type::any().is_context());
    }

    #[test]
    fn test_custom_validator_can_fail_unexpectedly() {
        let broken = Type::new("Broken", |_| Err(Rejection::unexpected("lost connection")));
        assert!(matches!(broken.validate(Value::from(1)), Err(Rejection::Unexpected(_))));
    }
}
