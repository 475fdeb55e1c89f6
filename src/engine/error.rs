//! Errors raised while building or running a workflow graph.

use crate::core::{SchemaError, StepId};
use thiserror::Error;

/// Failure type returned by step actions.
///
/// Any error an action raises propagates out of `run` unchanged, wrapped in
/// [`EngineError::Action`].
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structural problems in a graph.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphError {
    #[error("Step '{0}' is already registered")]
    DuplicateStep(StepId),

    #[error("No entry point registered. Add exactly one EntryPoint")]
    MissingEntryPoint,

    #[error("No termination registered. Add at least one Termination")]
    MissingTermination,

    #[error("Step '{0}' is not registered. Call add_steps first")]
    UnknownStep(StepId),

    #[error("Step '{0}' already has an outgoing transition")]
    TransitionAlreadyDefined(StepId),

    #[error("Transition from '{0}' has no targets")]
    NoTargets(StepId),

    #[error("Transition from '{step}' has {targets} targets but no router")]
    MissingRouter { step: StepId, targets: usize },

    #[error("Termination '{0}' cannot have outgoing transitions")]
    TerminationHasTransition(StepId),

    #[error("Transition from '{step}' cannot target the entry point '{entry}'")]
    TargetsEntryPoint { step: StepId, entry: StepId },

    #[error("Entry point '{0}' has no outgoing transition")]
    EntryNotConnected(StepId),

    #[error("Step '{0}' has no outgoing transition")]
    DanglingStep(StepId),
}

/// A step's action returned something other than a partial-state object.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Step '{step}' must return an object of state updates, got {found}")]
pub struct StepContractError {
    pub step: StepId,
    /// JSON type name of the rejected value
    pub found: &'static str,
}

/// A router picked a step outside its transition's declared targets.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Router for '{step}' selected '{selected}', which is not one of {allowed:?}")]
pub struct RoutingError {
    /// The step whose transition was being resolved
    pub step: StepId,
    pub selected: StepId,
    pub allowed: Vec<StepId>,
}

/// A run executed more steps than the configured bound.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Run exceeded {limit} step executions (next step: '{step}')")]
pub struct IterationLimitError {
    pub limit: usize,
    /// The step that would have run next
    pub step: StepId,
}

/// Everything `StateMachine::run` can fail with.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    StepContract(#[from] StepContractError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    IterationLimit(#[from] IterationLimitError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// An action failed. The engine does not retry or recover.
    #[error("Step '{step}' failed: {source}")]
    Action {
        step: StepId,
        #[source]
        source: ActionError,
    },
}

impl EngineError {
    /// The action's own error, if this is a propagated action failure.
    pub fn action_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Action { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_error_names_allowed_targets() {
        let err = RoutingError {
            step: StepId::from("llm"),
            selected: StepId::from("nowhere"),
            allowed: vec![StepId::from("tools"), StepId::from("__termination__")],
        };

        let message = err.to_string();
        assert!(message.contains("'llm'"));
        assert!(message.contains("'nowhere'"));
        assert!(message.contains("tools"));
    }

    #[test]
    fn graph_errors_convert_into_engine_errors() {
        let err: EngineError = GraphError::DanglingStep(StepId::from("orphan")).into();
        assert!(matches!(err, EngineError::Graph(GraphError::DanglingStep(_))));
        assert_eq!(err.to_string(), "Step 'orphan' has no outgoing transition");
    }

    #[test]
    fn action_error_exposes_source() {
        let err = EngineError::Action {
            step: StepId::from("fetch"),
            source: "connection refused".into(),
        };

        assert_eq!(
            err.action_error().map(|e| e.to_string()),
            Some("connection refused".to_string())
        );
        assert!(EngineError::from(GraphError::MissingEntryPoint)
            .action_error()
            .is_none());
    }
}
