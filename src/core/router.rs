//! Routers for conditional transitions.
//!
//! A router is a pure function of the current state that names the next
//! step. It never runs a step itself; the engine checks the returned id
//! against the transition's declared targets.

use super::state::State;
use super::step_id::StepId;
use std::fmt;
use std::sync::Arc;

/// Pure selector that picks the next step from the current state.
///
/// # Example
///
/// ```rust
/// use stepgraph::core::{Router, State, StepId};
///
/// let router = Router::new(|state: &State| {
///     if state.get_i64("count") >= state.get_i64("max_value") {
///         StepId::from("__termination__")
///     } else {
///         StepId::from("increment")
///     }
/// });
///
/// let state = State::new().with("count", 1).with("max_value", 3);
/// assert_eq!(router.select(&state), "increment");
/// ```
#[derive(Clone)]
pub struct Router {
    select: Arc<dyn Fn(&State) -> StepId + Send + Sync>,
}

impl Router {
    /// Create a router from a selector function.
    ///
    /// The selector must be deterministic and thread-safe (Send + Sync).
    pub fn new<F>(select: F) -> Self
    where
        F: Fn(&State) -> StepId + Send + Sync + 'static,
    {
        Self {
            select: Arc::new(select),
        }
    }

    /// Route on a boolean field: `when_true` if the field is `true`,
    /// `otherwise` for anything else, including a missing field.
    pub fn on_flag(
        field: impl Into<String>,
        when_true: impl Into<StepId>,
        otherwise: impl Into<StepId>,
    ) -> Self {
        let field = field.into();
        let when_true = when_true.into();
        let otherwise = otherwise.into();
        Self::new(move |state| {
            if state.get_bool(&field) == Some(true) {
                when_true.clone()
            } else {
                otherwise.clone()
            }
        })
    }

    /// Route on presence: `when_set` if the field exists and is neither
    /// `null`, `false`, nor an empty array, `otherwise` if not.
    pub fn on_present(
        field: impl Into<String>,
        when_set: impl Into<StepId>,
        otherwise: impl Into<StepId>,
    ) -> Self {
        let field = field.into();
        let when_set = when_set.into();
        let otherwise = otherwise.into();
        Self::new(move |state| {
            let set = match state.get(&field) {
                None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => {
                    false
                }
                Some(serde_json::Value::Array(items)) => !items.is_empty(),
                Some(_) => true,
            };
            if set {
                when_set.clone()
            } else {
                otherwise.clone()
            }
        })
    }

    pub fn select(&self, state: &State) -> StepId {
        (self.select)(state)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter_router() -> Router {
        Router::new(|state: &State| {
            let count = state.get_i64("count").unwrap_or(0);
            let max = state.get_i64("max_value").unwrap_or(0);
            if count >= max {
                StepId::from("__termination__")
            } else {
                StepId::from("increment")
            }
        })
    }

    #[test]
    fn router_selects_by_state() {
        let router = counter_router();

        let below = State::new().with("count", 1).with("max_value", 3);
        let at = State::new().with("count", 3).with("max_value", 3);

        assert_eq!(router.select(&below), "increment");
        assert_eq!(router.select(&at), "__termination__");
    }

    #[test]
    fn router_is_deterministic() {
        let router = counter_router();
        let state = State::new().with("count", 2).with("max_value", 3);

        assert_eq!(router.select(&state), router.select(&state));
    }

    #[test]
    fn flag_router_treats_missing_as_false() {
        let router = Router::on_flag("approved", "publish", "revise");

        assert_eq!(router.select(&State::new().with("approved", true)), "publish");
        assert_eq!(router.select(&State::new().with("approved", false)), "revise");
        assert_eq!(router.select(&State::new()), "revise");
    }

    #[test]
    fn presence_router_follows_pending_tool_calls() {
        let router = Router::on_present("current_tool_calls", "tool_executor", "__termination__");

        let pending = State::new().with("current_tool_calls", json!([{"name": "get_games"}]));
        let empty = State::new().with("current_tool_calls", json!([]));
        let cleared = State::new().with("current_tool_calls", json!(null));

        assert_eq!(router.select(&pending), "tool_executor");
        assert_eq!(router.select(&empty), "__termination__");
        assert_eq!(router.select(&cleared), "__termination__");
        assert_eq!(router.select(&State::new()), "__termination__");
    }

    #[test]
    fn cloned_router_shares_selector() {
        let router = counter_router();
        let cloned = router.clone();
        let state = State::new().with("count", 0).with("max_value", 1);

        assert_eq!(router.select(&state), cloned.select(&state));
    }
}
