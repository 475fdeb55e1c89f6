//! Key-value state threaded through a workflow run.
//!
//! State is plain owned data: every value is a `serde_json::Value`, so
//! cloning a `State` is always a deep copy. Snapshots rely on this to stay
//! independent of whatever the caller does with a state afterwards.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Ordered mapping of field names to values.
///
/// Fields are never removed by the engine. A step can only replace a
/// field by returning a new value for it.
///
/// # Example
///
/// ```rust
/// use stepgraph::core::State;
/// use serde_json::json;
///
/// let mut state = State::new().with("x", 0).with("y", 2);
/// state.merge(State::new().with("x", 1));
///
/// assert_eq!(state.get("x"), Some(&json!(1)));
/// assert_eq!(state.get("y"), Some(&json!(2)));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    fields: BTreeMap<String, Value>,
}

impl State {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a field, returning the previous value if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Shallow overwrite: every key in `update` replaces the key in `self`.
    /// Keys not mentioned in `update` are left alone.
    pub fn merge(&mut self, update: State) {
        self.fields.extend(update.fields);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Deserialize a field into a concrete type.
    ///
    /// Returns `None` when the field is missing or has the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.fields
            .get(key)
            .and_then(|value| T::deserialize(value).ok())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    pub fn get_array(&self, key: &str) -> Option<&Vec<Value>> {
        self.fields.get(key).and_then(Value::as_array)
    }

    /// Check whether a field is present. A field holding `null` counts as present.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert into a JSON object value.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields.into_iter().collect())
    }
}

impl From<Map<String, Value>> for State {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            fields: map.into_iter().collect(),
        }
    }
}

impl TryFrom<Value> for State {
    /// The rejected value, handed back untouched.
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self::from(map)),
            other => Err(other),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for State {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl IntoIterator for State {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Build a [`State`] from `key => value` pairs.
///
/// Values go through `serde_json::json!`, so nested literals work.
/// Negative numbers need parentheses: `"delta" => (-1)`.
///
/// ```
/// use stepgraph::state;
///
/// let state = state! {
///     "count" => 0,
///     "tags" => ["a", "b"],
/// };
/// assert_eq!(state.get_i64("count"), Some(0));
/// ```
#[macro_export]
macro_rules! state {
    () => {
        $crate::core::State::new()
    };
    ($($key:expr => $value:tt),+ $(,)?) => {{
        let mut state = $crate::core::State::new();
        $(
            state.insert($key, $crate::__private::json!($value));
        )+
        state
    }};
}
