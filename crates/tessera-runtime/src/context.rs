//! Ambient execution context.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::strategy::EngineKey;

/// Setting name read for strategy selection unless configured otherwise.
pub const DEFAULT_ENGINE_KEY: &str = "engine";

/// Opaque mapping of configuration and runtime values passed through every
/// evaluation unchanged.
///
/// Holds JSON settings (such as the preferred engine) and named shared host
/// resources (such as connections). Cloning is cheap; clones share storage
/// until one of them is modified.
#[derive(Clone, Default)]
pub struct Context {
    inner: Arc<ContextInner>,
}

#[derive(Clone, Default)]
struct ContextInner {
    settings: Map<String, JsonValue>,
    resources: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context from a JSON settings object.
    pub fn from_settings(settings: Map<String, JsonValue>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                settings,
                resources: HashMap::new(),
            }),
        }
    }

    /// Sets a setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Arc::make_mut(&mut self.inner)
            .settings
            .insert(key.into(), value.into());
        self
    }

    /// Sets the preferred engine under [`DEFAULT_ENGINE_KEY`].
    pub fn with_engine(self, engine: impl Into<EngineKey>) -> Self {
        let engine: EngineKey = engine.into();
        self.with_setting(DEFAULT_ENGINE_KEY, engine.as_str())
    }

    /// Attaches a shared host resource under a name.
    pub fn with_resource<T>(mut self, name: impl Into<String>, resource: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Arc::make_mut(&mut self.inner)
            .resources
            .insert(name.into(), Arc::new(resource));
        self
    }

    /// Returns a setting, if set.
    pub fn setting(&self, key: &str) -> Option<&JsonValue> {
        self.inner.settings.get(key)
    }

    /// Returns all settings.
    pub fn settings(&self) -> &Map<String, JsonValue> {
        &self.inner.settings
    }

    /// Returns a resource by name if it exists and has type `T`.
    pub fn resource<T: Any>(&self, name: &str) -> Option<&T> {
        self.inner.resources.get(name)?.downcast_ref::<T>()
    }

    /// Returns the engine requested under [`DEFAULT_ENGINE_KEY`].
    pub fn engine(&self) -> Option<EngineKey> {
        self.engine_under(DEFAULT_ENGINE_KEY)
    }

    /// Returns the engine requested under the given setting name.
    ///
    /// String and integer settings are both accepted, so `1` and `"1"` name
    /// the same engine.
    pub fn engine_under(&self, key: &str) -> Option<EngineKey> {
        match self.setting(key)? {
            JsonValue::String(s) => Some(EngineKey::new(s.clone())),
            JsonValue::Number(n) => Some(EngineKey::new(n.to_string())),
            _ => None,
        }
    }

    /// Returns whether two handles share the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut resources: Vec<&str> = self.inner.resources.keys().map(String::as_str).collect();
        resources.sort_unstable();
        f.debug_struct("Context")
            .field("settings", &self.inner.settings)
            .field("resources", &resources)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_from_string_and_number() {
        let by_string = Context::new().with_engine("sql");
        assert_eq!(by_string.engine(), Some(EngineKey::new("sql")));

        let by_number = Context::new().with_setting("engine", 2);
        assert_eq!(by_number.engine(), Some(EngineKey::from(2)));
    }

    #[test]
    fn test_engine_under_custom_key() {
        let context = Context::new().with_setting("strategy", "fast");
        assert_eq!(context.engine(), None);
        assert_eq!(context.engine_under("strategy"), Some(EngineKey::new("fast")));
    }

    #[test]
    fn test_resources_are_typed() {
        struct Connection(&'static str);

        let context = Context::new().with_resource("conn", Connection("memory"));
        assert_eq!(context.resource::<Connection>("conn").map(|c| c.0), Some("memory"));
        assert!(context.resource::<String>("conn").is_none());
        assert!(context.resource::<Connection>("other").is_none());
    }

    #[test]
    fn test_clones_share_until_modified() {
        let context = Context::new().with_setting("a", 1);
        let shared = context.clone();
        assert!(context.ptr_eq(&shared));

        let modified = shared.with_setting("b", 2);
        assert!(!context.ptr_eq(&modified));
        assert!(context.setting("b").is_none());
    }
}
