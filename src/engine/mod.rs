//! Graph construction and execution.
//!
//! A [`StateMachine`] owns the steps and transitions of one workflow and
//! walks them synchronously:
//!
//! 1. Start at the entry point.
//! 2. Run the current step's action and merge its update into the state.
//! 3. Snapshot the state.
//! 4. Follow the step's transition, asking its router when it has one.
//! 5. Stop at the first termination reached.
//!
//! The engine adds no threads, timeouts, or retries. Cycles are allowed
//! and bounded only by [`EngineConfig::max_steps`](crate::config::EngineConfig).

mod error;
mod machine;
mod step;
mod transition;

pub use error::{
    ActionError, EngineError, GraphError, IterationLimitError, RoutingError, StepContractError,
};
pub use machine::StateMachine;
pub use step::{
    Action, ActionResult, EntryPoint, Step, StepKind, Termination, ENTRY_NAME, TERMINATION_NAME,
};
pub use transition::Transition;
