//! Saving and restoring runs.
//!
//! Agents thread the last run of a conversation into the next turn. A
//! checkpoint wraps a [`Run`] with a format version so that history can
//! be written to disk or a database between process restarts.

use crate::core::Run;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable record of a finished run.
/// Holds state and history only. Steps, routers and resources are not
/// serializable and are never part of a checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: Uuid,

    /// When the checkpoint was taken
    pub saved_at: DateTime<Utc>,

    /// The captured run
    pub run: Run,
}

impl RunCheckpoint {
    pub fn capture(run: &Run) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4(),
            saved_at: Utc::now(),
            run: run.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    /// Restore a checkpoint, rejecting unknown versions and empty runs.
    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(json)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: checkpoint.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        Ok(checkpoint)
    }

    pub fn into_run(self) -> Run {
        self.run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Schema, State};
    use crate::engine::{EntryPoint, StateMachine, Step, Termination};
    use serde_json::json;

    fn sample_run() -> Run {
        let mut machine = StateMachine::new(Schema::open());
        let entry = EntryPoint::new();
        let reply = Step::new("reply", |s: &State| {
            let mut messages = s.get_array("messages").cloned().unwrap_or_default();
            messages.push(json!({ "role": "assistant", "content": "hello" }));
            Ok(json!({ "messages": messages }))
        });
        let end = Termination::new();
        machine
            .add_steps(vec![entry.clone(), reply.clone(), end.clone()])
            .unwrap();
        machine.connect(&entry, &reply).unwrap();
        machine.connect(&reply, &end).unwrap();
        machine
            .run(State::new().with("messages", json!([])), None)
            .unwrap()
    }

    #[test]
    fn checkpoint_restores_run() {
        let run = sample_run();
        let checkpoint = RunCheckpoint::capture(&run);

        let json = checkpoint.to_json().unwrap();
        let restored = RunCheckpoint::from_json(&json).unwrap();

        assert_eq!(restored.version, CHECKPOINT_VERSION);
        assert_eq!(restored.into_run(), run);
    }

    #[test]
    fn checkpoint_rejects_future_versions() {
        let mut checkpoint = RunCheckpoint::capture(&sample_run());
        checkpoint.version = CHECKPOINT_VERSION + 1;
        let json = serde_json::to_string(&checkpoint).unwrap();

        let result = RunCheckpoint::from_json(&json);
        assert!(matches!(
            result,
            Err(CheckpointError::UnsupportedVersion { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn checkpoint_rejects_garbage() {
        assert!(matches!(
            RunCheckpoint::from_json("{not json"),
            Err(CheckpointError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn checkpoint_rejects_empty_history() {
        let checkpoint = RunCheckpoint::capture(&sample_run());
        let mut value = serde_json::to_value(&checkpoint).unwrap();
        value["run"]["snapshots"] = json!([]);

        let result = RunCheckpoint::from_json(&value.to_string());
        assert!(matches!(result, Err(CheckpointError::DeserializationFailed(_))));
    }
}
