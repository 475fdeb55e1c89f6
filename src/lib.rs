//! Stepgraph: a synchronous graph-based step executor
//!
//! Stepgraph drives agent reasoning loops as a small graph: prepare
//! messages, call a model, run tools when the model asks for them, loop
//! back, and stop. Each call to [`StateMachine::run`](engine::StateMachine::run)
//! walks the graph once and returns a [`Run`](core::Run) holding a snapshot
//! of the state after every step.
//!
//! # Core Concepts
//!
//! - **State**: An ordered key-value payload threaded through every step
//! - **Steps**: Named actions that return partial state updates
//! - **Transitions**: Plain or router-guarded edges between steps
//! - **Resources**: Shared handles injected into steps, kept out of state
//! - **Runs**: Immutable execution history, threaded into the next turn
//!
//! # Example
//!
//! ```rust
//! use stepgraph::core::{Schema, State};
//! use stepgraph::engine::{EntryPoint, StateMachine, Step, Termination};
//! use serde_json::json;
//!
//! let mut workflow = StateMachine::new(Schema::new(["input", "output"]));
//!
//! let entry = EntryPoint::new();
//! let input = Step::new("input", |s: &State| {
//!     Ok(json!({ "output": s.get_i64("input").unwrap_or(0) + 1 }))
//! });
//! let double = Step::new("double", |s: &State| {
//!     Ok(json!({ "output": s.get_i64("output").unwrap_or(0) * 2 }))
//! });
//! let termination = Termination::new();
//!
//! workflow
//!     .add_steps(vec![entry.clone(), input.clone(), double.clone(), termination.clone()])
//!     .unwrap();
//! workflow.connect(&entry, &input).unwrap();
//! workflow.connect(&input, &double).unwrap();
//! workflow.connect(&double, &termination).unwrap();
//!
//! let run = workflow.run(State::new().with("input", 4), None).unwrap();
//! assert_eq!(run.snapshots().len(), 3);
//! assert_eq!(run.get_final_state().get_i64("output"), Some(10));
//! ```

pub mod checkpoint;
pub mod config;
pub mod core;
pub mod engine;
pub mod memory;
pub mod resources;

// Re-export commonly used types
pub use crate::core::{Router, Run, Schema, Snapshot, State, StepId};
pub use crate::engine::{EngineError, EntryPoint, StateMachine, Step, Termination};
pub use crate::resources::Resources;

#[doc(hidden)]
pub mod __private {
    pub use serde_json::json;
}
