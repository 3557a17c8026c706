//! Values carried along bindings.

use std::any::{Any, type_name};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::{IntoIter, Iter};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::context::Context;

/// A value flowing through an algorithm.
///
/// Most values are JSON data. The execution [`Context`] travels as its own
/// variant so that context-typed ports can recognize it, and arbitrary host
/// objects can be shared through [`Object`].
#[derive(Debug, Clone)]
pub enum Value {
    /// Plain JSON data.
    Json(JsonValue),
    /// The ambient execution context.
    Context(Context),
    /// A shared host object.
    Object(Object),
}

impl Value {
    /// Wraps a host object.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Object::new(value))
    }

    /// Returns the JSON data, if this is a JSON value.
    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the number as `f64`, if this is a JSON number.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_json()?.as_f64()
    }

    /// Returns the string, if this is a JSON string.
    pub fn as_str(&self) -> Option<&str> {
        self.as_json()?.as_str()
    }

    /// Returns the context, if this is the context value.
    pub fn as_context(&self) -> Option<&Context> {
        match self {
            Self::Context(context) => Some(context),
            _ => None,
        }
    }

    /// Returns the host object as `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Object(object) => object.downcast_ref(),
            _ => None,
        }
    }

    /// Converts to JSON, rendering non-JSON values as descriptive strings.
    pub fn to_json_lossy(&self) -> JsonValue {
        match self {
            Self::Json(value) => value.clone(),
            other => JsonValue::String(other.to_string()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Context(a), Self::Context(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => write!(f, "{value}"),
            Self::Context(_) => f.write_str("<context>"),
            Self::Object(object) => write!(f, "<object {}>", object.type_name()),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Self::Json(value)
    }
}

impl From<Context> for Value {
    fn from(context: Context) -> Self {
        Self::Context(context)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

macro_rules! impl_from_json {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Json(JsonValue::from(value))
                }
            }
        )*
    };
}

impl_from_json!(bool, i32, i64, u32, u64, f64, &str, String);

/// A shared, type-erased host object.
#[derive(Clone)]
pub struct Object {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Object {
    /// Wraps a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    /// Returns the wrapped value as `T`, if it has that type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Returns the Rust type name of the wrapped value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns whether two handles point to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.type_name)
    }
}

/// Error returned by the typed accessors of [`Values`].
#[derive(Debug, Clone, Error)]
pub enum ArgumentError {
    /// No value under the name.
    #[error("argument `{0}` was not supplied")]
    Missing(String),
    /// The value has another shape.
    #[error("argument `{name}` is not {expected}")]
    WrongShape {
        /// Argument name.
        name: String,
        /// Expected shape.
        expected: &'static str,
    },
}

/// Values keyed by parameter name, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    inner: IndexMap<String, Value>,
}

impl Values {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value and returns the map.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a value, returning the previous one under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.insert(name.into(), value.into())
    }

    /// Returns the value under a name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get(name)
    }

    /// Removes a value, keeping the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.inner.shift_remove(name)
    }

    /// Returns whether a value is present under a name.
    pub fn contains_key(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Returns the names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    /// Returns the entries in order.
    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.inner.iter()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the value under a name or a [`ArgumentError::Missing`].
    pub fn value(&self, name: &str) -> Result<&Value, ArgumentError> {
        self.get(name)
            .ok_or_else(|| ArgumentError::Missing(name.to_owned()))
    }

    /// Returns a numeric argument as `f64`.
    pub fn number(&self, name: &str) -> Result<f64, ArgumentError> {
        self.value(name)?
            .as_f64()
            .ok_or_else(|| ArgumentError::WrongShape {
                name: name.to_owned(),
                expected: "a number",
            })
    }

    /// Returns a string argument.
    pub fn text(&self, name: &str) -> Result<&str, ArgumentError> {
        self.value(name)?
            .as_str()
            .ok_or_else(|| ArgumentError::WrongShape {
                name: name.to_owned(),
                expected: "a string",
            })
    }

    /// Returns the context argument.
    pub fn context(&self, name: &str) -> Result<&Context, ArgumentError> {
        self.value(name)?
            .as_context()
            .ok_or_else(|| ArgumentError::WrongShape {
                name: name.to_owned(),
                expected: "the context",
            })
    }

    /// Returns a host object argument.
    pub fn object<T: Any>(&self, name: &str) -> Result<&T, ArgumentError> {
        self.value(name)?
            .downcast_ref::<T>()
            .ok_or_else(|| ArgumentError::WrongShape {
                name: name.to_owned(),
                expected: type_name::<T>(),
            })
    }

    /// Converts to a JSON object, rendering non-JSON values as strings.
    pub fn to_json_lossy(&self) -> JsonValue {
        JsonValue::Object(
            self.inner
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json_lossy()))
                .collect(),
        )
    }
}

impl Index<&str> for Values {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        &self.inner[name]
    }
}

impl<K, V> FromIterator<(K, V)> for Values
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Values {
    type Item = (String, Value);
    type IntoIter = IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<'a> IntoIterator for &'a Values {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Table(&'static str);

    #[test]
    fn test_typed_accessors() {
        let values = Values::new()
            .with("a", 3)
            .with("name", "tmp")
            .with("table", Value::object(Table("t1")));

        assert_eq!(values.number("a").unwrap(), 3.0);
        assert_eq!(values.text("name").unwrap(), "tmp");
        assert_eq!(values.object::<Table>("table").unwrap(), &Table("t1"));
        assert!(matches!(values.number("name"), Err(ArgumentError::WrongShape { .. })));
        assert!(matches!(values.number("b"), Err(ArgumentError::Missing(_))));
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut values: Values = [("b", 1), ("a", 2)].into_iter().collect();
        values.insert("c", 3);
        assert_eq!(values.keys().collect::<Vec<_>>(), ["b", "a", "c"]);

        values.remove("a");
        assert_eq!(values.keys().collect::<Vec<_>>(), ["b", "c"]);
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let table = Value::object(Table("t1"));
        assert_eq!(table, table.clone());
        assert_ne!(table, Value::object(Table("t1")));
    }

    #[test]
    fn test_lossy_json() {
        let values = Values::new()
            .with("res", 9)
            .with("context", Context::new());
        assert_eq!(values.to_json_lossy(), json!({"res": 9, "context": "<context>"}));
    }
}
