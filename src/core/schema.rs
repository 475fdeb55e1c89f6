//! Declared field sets for workflow state.

use super::state::State;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised when a state carries fields the schema does not declare.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Field '{field}' is not declared by the schema (produced by '{origin}')")]
    UndeclaredField { field: String, origin: String },
}

/// Names of the fields a graph's state is expected to carry.
///
/// A schema documents the state shape and checks field names only; values
/// are never type-checked. Declared fields are not required to be present.
/// An open schema (no declared fields) accepts everything.
///
/// # Example
///
/// ```rust
/// use stepgraph::core::{Schema, State};
///
/// let schema = Schema::new(["count", "max_value"]);
/// let state = State::new().with("count", 0);
///
/// assert!(schema.undeclared(&state).is_empty());
/// assert_eq!(schema.undeclared(&State::new().with("other", 1)), vec!["other"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: BTreeSet<String>,
    strict: bool,
}

impl Schema {
    pub fn new<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            strict: false,
        }
    }

    /// A schema that declares nothing and accepts any field.
    pub fn open() -> Self {
        Self::default()
    }

    /// Reject undeclared fields instead of warning about them.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn is_open(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn declares(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Fields of `state` not declared by this schema, in key order.
    pub fn undeclared<'a>(&self, state: &'a State) -> Vec<&'a str> {
        if self.is_open() {
            return Vec::new();
        }
        state.keys().filter(|key| !self.declares(key)).collect()
    }

    /// Check a state produced by `origin` (a step name, or the caller).
    ///
    /// Non-strict schemas log undeclared fields and accept the state.
    pub fn check(&self, state: &State, origin: &str) -> Result<(), SchemaError> {
        for field in self.undeclared(state) {
            if self.strict {
                return Err(SchemaError::UndeclaredField {
                    field: field.to_string(),
                    origin: origin.to_string(),
                });
            }
            tracing::warn!(field, origin, "State field not declared by schema");
        }
        Ok(())
    }
}
