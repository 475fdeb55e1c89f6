//! Outgoing edges of a step.

use crate::core::{Router, State, StepId};
use crate::engine::error::RoutingError;

/// The single outgoing transition of a step.
///
/// With one target and no router the edge is unconditional. With a router
/// the next step is whatever the router selects, provided it is one of
/// `targets`. Transitions are created through `StateMachine::connect*`,
/// which checks these shapes.
#[derive(Clone, Debug)]
pub struct Transition {
    source: StepId,
    targets: Vec<StepId>,
    router: Option<Router>,
}

impl Transition {
    pub(crate) fn new(source: StepId, targets: Vec<StepId>, router: Option<Router>) -> Self {
        Self {
            source,
            targets,
            router,
        }
    }

    pub fn source(&self) -> &StepId {
        &self.source
    }

    pub fn targets(&self) -> &[StepId] {
        &self.targets
    }

    pub fn router(&self) -> Option<&Router> {
        self.router.as_ref()
    }

    pub fn is_conditional(&self) -> bool {
        self.router.is_some()
    }

    /// Pick the next step for `state` (pure).
    pub fn resolve(&self, state: &State) -> Result<StepId, RoutingError> {
        let Some(router) = &self.router else {
            // Plain edges always have exactly one target.
            return Ok(self.targets[0].clone());
        };

        let selected = router.select(state);
        if self.targets.contains(&selected) {
            Ok(selected)
        } else {
            Err(RoutingError {
                step: self.source.clone(),
                selected,
                allowed: self.targets.clone(),
            })
        }
    }
}
