//! Steps: the nodes of a workflow graph.

use crate::core::{State, StepId};
use crate::engine::error::ActionError;
use crate::resources::Resources;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Name given to the entry point.
pub const ENTRY_NAME: &str = "__entry__";

/// Name given to a termination created with [`Termination::new`].
pub const TERMINATION_NAME: &str = "__termination__";

/// What an action returns: a JSON object of field updates, or a failure.
pub type ActionResult = Result<Value, ActionError>;

/// The work a step performs.
///
/// `execute` receives the current state and the run's resources, and
/// returns a partial update. Returning anything but a JSON object breaks
/// the step contract and fails the run.
///
/// Closures implement this trait through [`Step::new`] and
/// [`Step::with_resources`]; implement it directly for actions that carry
/// their own configuration.
pub trait Action: Send + Sync {
    fn execute(&self, state: &State, resources: &Resources) -> ActionResult;
}

struct StateFn<F>(F);

impl<F> Action for StateFn<F>
where
    F: Fn(&State) -> ActionResult + Send + Sync,
{
    fn execute(&self, state: &State, _resources: &Resources) -> ActionResult {
        (self.0)(state)
    }
}

struct ResourceFn<F>(F);

impl<F> Action for ResourceFn<F>
where
    F: Fn(&State, &Resources) -> ActionResult + Send + Sync,
{
    fn execute(&self, state: &State, resources: &Resources) -> ActionResult {
        (self.0)(state, resources)
    }
}

/// Role of a step in the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    /// The unique start node. Has no action.
    Entry,
    /// A node that runs an action.
    Task,
    /// An end node. Has no action and no outgoing transition.
    Termination,
}

#[derive(Clone)]
enum Body {
    Marker,
    Action {
        action: Arc<dyn Action>,
        uses_resources: bool,
    },
}

/// A named unit of work.
///
/// Steps are built once, registered with a machine, and never change.
/// Cloning a step is cheap and shares the action.
///
/// # Example
///
/// ```rust
/// use stepgraph::core::State;
/// use stepgraph::engine::{Step, StepKind};
/// use serde_json::json;
///
/// let increment = Step::new("increment", |state: &State| {
///     Ok(json!({ "count": state.get_i64("count").unwrap_or(0) + 1 }))
/// });
///
/// assert_eq!(increment.name(), "increment");
/// assert_eq!(increment.kind(), StepKind::Task);
/// assert!(!increment.uses_resources());
/// ```
#[derive(Clone)]
pub struct Step {
    id: StepId,
    kind: StepKind,
    body: Body,
}

impl Step {
    /// A step whose action reads only the state.
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&State) -> ActionResult + Send + Sync + 'static,
    {
        Self::from_action(name, StateFn(action), false)
    }

    /// A step whose action also receives the run's resources.
    pub fn with_resources<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&State, &Resources) -> ActionResult + Send + Sync + 'static,
    {
        Self::from_action(name, ResourceFn(action), true)
    }

    /// A step backed by an [`Action`] implementation.
    pub fn from_action<A>(name: impl Into<String>, action: A, uses_resources: bool) -> Self
    where
        A: Action + 'static,
    {
        Self {
            id: StepId::new(name),
            kind: StepKind::Task,
            body: Body::Action {
                action: Arc::new(action),
                uses_resources,
            },
        }
    }

    fn marker(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: StepId::new(name),
            kind,
            body: Body::Marker,
        }
    }

    pub fn id(&self) -> &StepId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.as_str()
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn is_entry(&self) -> bool {
        self.kind == StepKind::Entry
    }

    pub fn is_termination(&self) -> bool {
        self.kind == StepKind::Termination
    }

    /// Whether the action declared a dependency on resources.
    pub fn uses_resources(&self) -> bool {
        matches!(
            self.body,
            Body::Action {
                uses_resources: true,
                ..
            }
        )
    }

    /// Run the action, if this step has one.
    ///
    /// Resource-free actions are handed an empty container instead of the
    /// run's resources. Markers return `None`.
    pub(crate) fn invoke(&self, state: &State, resources: &Resources) -> Option<ActionResult> {
        match &self.body {
            Body::Marker => None,
            Body::Action {
                action,
                uses_resources: true,
            } => Some(action.execute(state, resources)),
            Body::Action { action, .. } => Some(action.execute(state, &Resources::new())),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("uses_resources", &self.uses_resources())
            .finish()
    }
}

impl From<&Step> for StepId {
    fn from(step: &Step) -> Self {
        step.id.clone()
    }
}

/// Constructor for the unique start node of a graph.
pub struct EntryPoint;

impl EntryPoint {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> Step {
        Step::marker(ENTRY_NAME, StepKind::Entry)
    }
}

/// Constructor for end nodes. A graph may have several.
pub struct Termination;

impl Termination {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> Step {
        Step::marker(TERMINATION_NAME, StepKind::Termination)
    }

    /// An additional end node under its own name, e.g. `"failed"`.
    pub fn named(name: impl Into<String>) -> Step {
        Step::marker(name, StepKind::Termination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Scale {
        factor: i64,
    }

    impl Action for Scale {
        fn execute(&self, state: &State, _resources: &Resources) -> ActionResult {
            Ok(json!({ "output": state.get_i64("output").unwrap_or(0) * self.factor }))
        }
    }

    #[test]
    fn markers_have_fixed_names_and_no_action() {
        let entry = EntryPoint::new();
        let end = Termination::new();

        assert_eq!(entry.name(), ENTRY_NAME);
        assert!(entry.is_entry());
        assert_eq!(end.name(), TERMINATION_NAME);
        assert!(end.is_termination());
        assert!(entry.invoke(&State::new(), &Resources::new()).is_none());
        assert!(end.invoke(&State::new(), &Resources::new()).is_none());
    }

    #[test]
    fn named_termination_keeps_its_name() {
        let failed = Termination::named("failed");
        assert_eq!(failed.name(), "failed");
        assert_eq!(failed.kind(), StepKind::Termination);
    }

    #[test]
    fn state_step_runs_closure() {
        let step = Step::new("input", |s: &State| {
            Ok(json!({ "output": s.get_i64("input").unwrap_or(0) + 1 }))
        });

        let update = step
            .invoke(&State::new().with("input", 4), &Resources::new())
            .unwrap()
            .unwrap();
        assert_eq!(update, json!({ "output": 5 }));
    }

    #[test]
    fn resource_step_sees_resources() {
        let step = Step::with_resources("lookup", |_s: &State, r: &Resources| {
            let factor = r.require::<i64>("factor")?;
            Ok(json!({ "factor": *factor }))
        });
        assert!(step.uses_resources());

        let resources = Resources::new().with("factor", 7_i64);
        let update = step.invoke(&State::new(), &resources).unwrap().unwrap();
        assert_eq!(update, json!({ "factor": 7 }));
    }

    #[test]
    fn state_step_does_not_see_resources() {
        let step = Step::from_action("probe", ProbeResources, false);
        let resources = Resources::new().with("secret", 1_u8);

        let update = step.invoke(&State::new(), &resources).unwrap().unwrap();
        assert_eq!(update, json!({ "visible": 0 }));
    }

    struct ProbeResources;

    impl Action for ProbeResources {
        fn execute(&self, _state: &State, resources: &Resources) -> ActionResult {
            Ok(json!({ "visible": resources.len() }))
        }
    }

    #[test]
    fn action_trait_implementations_work() {
        let step = Step::from_action("scale", Scale { factor: 3 }, false);
        let update = step
            .invoke(&State::new().with("output", 2), &Resources::new())
            .unwrap()
            .unwrap();
        assert_eq!(update, json!({ "output": 6 }));
    }

    #[test]
    fn action_errors_are_returned() {
        let step = Step::new("fail", |_s: &State| Err("tool unavailable".into()));
        let result = step.invoke(&State::new(), &Resources::new()).unwrap();
        assert_eq!(result.unwrap_err().to_string(), "tool unavailable");
    }

    #[test]
    fn step_id_from_step() {
        let step = Step::new("llm", |_s: &State| Ok(json!({})));
        assert_eq!(StepId::from(&step), "llm");
    }
}
