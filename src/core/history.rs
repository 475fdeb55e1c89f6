//! Execution history of a workflow run.
//!
//! A [`Run`] is the append-only record produced by one call to
//! `StateMachine::run`: one [`Snapshot`] per executed step, ending with
//! the snapshot of the termination node that stopped the run.

use super::state::State;
use super::step_id::StepId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// State captured right after a step's update was merged.
///
/// Snapshots own a deep copy of the state, so nothing the caller does
/// later can reach back into the history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The step that produced this state
    pub step: StepId,
    /// Zero-based position in the run
    pub sequence: usize,
    /// State after the step's update was merged
    pub state: State,
    /// When the snapshot was taken
    pub recorded_at: DateTime<Utc>,
}

/// Summary of a run, in the shape agent code usually logs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub snapshot_count: usize,
}

/// Complete record of one execution, from entry point to termination.
///
/// A run always holds at least the termination snapshot, and it never
/// changes once the engine hands it back.
///
/// # Example
///
/// ```rust
/// use stepgraph::core::{Schema, State};
/// use stepgraph::engine::{EntryPoint, StateMachine, Step, Termination};
/// use serde_json::json;
///
/// let mut machine = StateMachine::new(Schema::new(["input", "output"]));
/// let entry = EntryPoint::new();
/// let double = Step::new("double", |s: &State| {
///     Ok(json!({ "output": s.get_i64("input").unwrap_or(0) * 2 }))
/// });
/// let end = Termination::new();
///
/// machine.add_steps(vec![entry.clone(), double.clone(), end.clone()]).unwrap();
/// machine.connect(&entry, &double).unwrap();
/// machine.connect(&double, &end).unwrap();
///
/// let run = machine.run(State::new().with("input", 4), None).unwrap();
/// assert_eq!(run.len(), 2);
/// assert_eq!(run.get_final_state().get_i64("output"), Some(8));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RunRecord")]
pub struct Run {
    id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    snapshots: Vec<Snapshot>,
}

impl Run {
    /// Assemble a finished run from the executed steps and the snapshot of
    /// the termination that ended it.
    pub(crate) fn completed(
        id: Uuid,
        started_at: DateTime<Utc>,
        mut snapshots: Vec<Snapshot>,
        termination: Snapshot,
    ) -> Self {
        let finished_at = termination.recorded_at;
        snapshots.push(termination);
        Self {
            id,
            started_at,
            finished_at,
            snapshots,
        }
    }

    /// Rebuild a run from its parts, rejecting an empty snapshot list.
    pub(crate) fn new(
        id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        snapshots: Vec<Snapshot>,
    ) -> Option<Self> {
        if snapshots.is_empty() {
            return None;
        }
        Some(Self {
            id,
            started_at,
            finished_at,
            snapshots,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Owned copy of the state carried by the last snapshot.
    ///
    /// Mutating the returned state never affects the run.
    pub fn get_final_state(&self) -> State {
        self.final_state().clone()
    }

    /// Borrow the state carried by the last snapshot.
    pub fn final_state(&self) -> &State {
        &self.last().state
    }

    /// The termination node that ended the run.
    pub fn terminated_at(&self) -> &StepId {
        &self.last().step
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Always `false`; a run holds at least its termination snapshot.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Step ids in execution order.
    pub fn path(&self) -> Vec<&StepId> {
        self.snapshots.iter().map(|s| &s.step).collect()
    }

    /// Snapshots recorded for one step, in order.
    pub fn snapshots_for<'a>(&'a self, step: &'a str) -> impl Iterator<Item = &'a Snapshot> + 'a {
        self.snapshots.iter().filter(move |s| s.step == step)
    }

    /// Wall-clock time from start to finish.
    pub fn duration(&self) -> Duration {
        self.finished_at
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn metadata(&self) -> RunMetadata {
        RunMetadata {
            run_id: self.id,
            start_timestamp: self.started_at,
            end_timestamp: self.finished_at,
            snapshot_count: self.snapshots.len(),
        }
    }

    fn last(&self) -> &Snapshot {
        // `Run::new` and deserialization both reject empty runs.
        &self.snapshots[self.snapshots.len() - 1]
    }
}

/// Wire form of a run, validated before it becomes a [`Run`].
#[derive(Deserialize)]
struct RunRecord {
    id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    snapshots: Vec<Snapshot>,
}

impl TryFrom<RunRecord> for Run {
    type Error = String;

    fn try_from(record: RunRecord) -> Result<Self, Self::Error> {
        if let Some((index, snapshot)) = record
            .snapshots
            .iter()
            .enumerate()
            .find(|(index, snapshot)| snapshot.sequence != *index)
        {
            return Err(format!(
                "snapshot {index} has sequence {}, expected {index}",
                snapshot.sequence
            ));
        }
        Run::new(
            record.id,
            record.started_at,
            record.finished_at,
            record.snapshots,
        )
        .ok_or_else(|| "run has no snapshots".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(step: &str, sequence: usize, state: State) -> Snapshot {
        Snapshot {
            step: StepId::from(step),
            sequence,
            state,
            recorded_at: Utc::now(),
        }
    }

    fn sample_run() -> Run {
        let start = Utc::now();
        Run::new(
            Uuid::new_v4(),
            start,
            start + chrono::Duration::milliseconds(25),
            vec![
                snapshot("input", 0, State::new().with("input", 4).with("output", 5)),
                snapshot("double", 1, State::new().with("input", 4).with("output", 10)),
                snapshot(
                    "__termination__",
                    2,
                    State::new().with("input", 4).with("output", 10),
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn completed_run_ends_at_termination() {
        let start = Utc::now();
        let run = Run::completed(
            Uuid::new_v4(),
            start,
            vec![snapshot("increment", 0, State::new().with("count", 1))],
            snapshot("__termination__", 1, State::new().with("count", 1)),
        );

        assert_eq!(run.len(), 2);
        assert_eq!(run.terminated_at(), "__termination__");
        assert_eq!(run.finished_at(), run.snapshots()[1].recorded_at);
    }

    #[test]
    fn empty_run_is_rejected() {
        let now = Utc::now();
        assert!(Run::new(Uuid::new_v4(), now, now, Vec::new()).is_none());
    }

    #[test]
    fn final_state_comes_from_last_snapshot() {
        let run = sample_run();

        assert_eq!(run.get_final_state().get_i64("output"), Some(10));
        assert_eq!(run.terminated_at(), "__termination__");
    }

    #[test]
    fn get_final_state_returns_independent_copy() {
        let run = sample_run();

        let mut first = run.get_final_state();
        first.insert("output", json!("tampered"));

        assert_eq!(run.get_final_state().get_i64("output"), Some(10));
    }

    #[test]
    fn path_lists_steps_in_order() {
        let run = sample_run();
        let path: Vec<_> = run.path().into_iter().map(StepId::as_str).collect();
        assert_eq!(path, vec!["input", "double", "__termination__"]);
    }

    #[test]
    fn snapshots_for_filters_by_step() {
        let run = sample_run();
        assert_eq!(run.snapshots_for("double").count(), 1);
        assert_eq!(run.snapshots_for("missing").count(), 0);
    }

    #[test]
    fn metadata_counts_snapshots() {
        let run = sample_run();
        let metadata = run.metadata();

        assert_eq!(metadata.run_id, run.id());
        assert_eq!(metadata.snapshot_count, 3);
        assert_eq!(run.duration(), Duration::from_millis(25));
    }

    #[test]
    fn deserializing_empty_run_fails() {
        let json = format!(
            r#"{{"id":"{}","started_at":"2025-01-01T00:00:00Z","finished_at":"2025-01-01T00:00:00Z","snapshots":[]}}"#,
            Uuid::new_v4()
        );
        assert!(serde_json::from_str::<Run>(&json).is_err());
    }

    #[test]
    fn deserializing_out_of_order_snapshots_fails() {
        let mut value = serde_json::to_value(sample_run()).unwrap();
        value["snapshots"][1]["sequence"] = json!(5);

        let err = serde_json::from_value::<Run>(value).unwrap_err();
        assert!(err.to_string().contains("snapshot 1 has sequence 5"));
    }

    #[test]
    fn run_serializes_correctly() {
        let run = sample_run();
        let json = serde_json::to_string(&run).unwrap();
        let back: Run = serde_json::from_str(&json).unwrap();
        assert_eq!(back, run);
    }
}
