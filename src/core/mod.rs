//! Core workflow data types.
//!
//! This module contains the plain-data side of the engine:
//! - State values and the schema that names their fields
//! - Step identifiers and routers for conditional transitions
//! - Immutable run history
//!
//! Nothing here performs I/O or runs a step.

mod history;
mod router;
mod schema;
mod state;
mod step_id;

pub use history::{Run, RunMetadata, Snapshot};
pub use router::Router;
pub use schema::{Schema, SchemaError};
pub use state::State;
pub use step_id::StepId;
