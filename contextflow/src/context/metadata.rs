//! Namespaced run metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open key/value map accumulating per-stage diagnostics.
///
/// Each stage writes under its own top-level key. Flags such as
/// `systemRoleInjected` sit at the top level; structured data such as
/// `ragContext` lives in a nested object (a namespace).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    data: Map<String, Value>,
}

impl Metadata {
    /// Creates an empty metadata map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a top-level value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Gets a top-level boolean, treating absence as `false`.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.data.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Gets a top-level string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Sets a top-level value, overwriting any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Checks if a top-level key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns a namespace object, if present.
    #[must_use]
    pub fn namespace(&self, namespace: &str) -> Option<&Map<String, Value>> {
        self.data.get(namespace).and_then(Value::as_object)
    }

    /// Returns a namespace object, creating it when absent.
    ///
    /// A non-object value already stored under the key is replaced.
    pub fn namespace_mut(&mut self, namespace: &str) -> &mut Map<String, Value> {
        let entry = self
            .data
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(map) => map,
            _ => unreachable!("namespace entry was just set to an object"),
        }
    }

    /// Sets `namespace.key = value`.
    pub fn set_in(&mut self, namespace: &str, key: impl Into<String>, value: impl Into<Value>) {
        self.namespace_mut(namespace).insert(key.into(), value.into());
    }

    /// Gets `namespace.key`.
    #[must_use]
    pub fn get_in(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.namespace(namespace).and_then(|ns| ns.get(key))
    }

    /// Gets `namespace.key` as a boolean, false when absent.
    #[must_use]
    pub fn get_bool_in(&self, namespace: &str, key: &str) -> bool {
        self.get_in(namespace, key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Adds one to the integer counter at `namespace.key`.
    pub fn increment(&mut self, namespace: &str, key: &str) {
        let ns = self.namespace_mut(namespace);
        let current = ns.get(key).and_then(Value::as_u64).unwrap_or(0);
        ns.insert(key.to_string(), Value::from(current + 1));
    }

    /// Returns all top-level keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    /// Returns the number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no entry was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the metadata as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }
}
