//! Workflow graph that executes steps and records their history.

use crate::config::EngineConfig;
use crate::core::{Router, Run, Schema, Snapshot, State, StepId};
use crate::engine::error::{EngineError, GraphError, IterationLimitError, StepContractError};
use crate::engine::step::{Step, StepKind};
use crate::engine::transition::Transition;
use crate::resources::Resources;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Graph of steps and transitions that drives one workflow.
///
/// Build the graph once with [`add_steps`](Self::add_steps) and the
/// `connect*` methods, then call [`run`](Self::run) as often as needed.
/// `run` takes `&self`, so a built machine can be shared across threads;
/// any resource handed to concurrent runs must do its own locking.
///
/// # Example
///
/// ```rust
/// use stepgraph::core::{Router, Schema, State, StepId};
/// use stepgraph::engine::{EntryPoint, StateMachine, Step, Termination};
/// use serde_json::json;
///
/// let mut machine = StateMachine::new(Schema::new(["count", "max_value"]));
/// let entry = EntryPoint::new();
/// let increment = Step::new("increment", |s: &State| {
///     Ok(json!({ "count": s.get_i64("count").unwrap_or(0) + 1 }))
/// });
/// let end = Termination::new();
///
/// machine.add_steps(vec![entry.clone(), increment.clone(), end.clone()]).unwrap();
/// machine.connect(&entry, &increment).unwrap();
///
/// let (again, done) = (increment.id().clone(), end.id().clone());
/// machine
///     .connect_when(&increment, [&increment, &end], Router::new(move |s: &State| {
///         if s.get_i64("count") >= s.get_i64("max_value") { done.clone() } else { again.clone() }
///     }))
///     .unwrap();
///
/// let run = machine.run(State::new().with("count", 0).with("max_value", 3), None).unwrap();
/// assert_eq!(run.get_final_state().get_i64("count"), Some(3));
/// ```
pub struct StateMachine {
    schema: Schema,
    config: EngineConfig,
    steps: HashMap<StepId, Step>,
    order: Vec<StepId>,
    entry: Option<StepId>,
    transitions: HashMap<StepId, Transition>,
}

impl StateMachine {
    /// Create an empty graph whose state follows `schema`.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            config: EngineConfig::default(),
            steps: HashMap::new(),
            order: Vec::new(),
            entry: None,
            transitions: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register steps.
    ///
    /// After this batch the graph must hold an entry point and at least
    /// one termination, and every name must be unique. Every entry point
    /// shares one name, so the uniqueness check also keeps the entry point
    /// unique. On error nothing from the batch is registered.
    pub fn add_steps(&mut self, steps: impl IntoIterator<Item = Step>) -> Result<(), GraphError> {
        let batch: Vec<Step> = steps.into_iter().collect();

        let mut seen: HashSet<&StepId> = HashSet::new();
        let mut entry = self.entry.clone();
        let mut has_termination = self.terminations().next().is_some();

        for step in &batch {
            if self.steps.contains_key(step.id()) || !seen.insert(step.id()) {
                return Err(GraphError::DuplicateStep(step.id().clone()));
            }
            match step.kind() {
                StepKind::Entry => entry = Some(step.id().clone()),
                StepKind::Termination => has_termination = true,
                StepKind::Task => {}
            }
        }

        if entry.is_none() {
            return Err(GraphError::MissingEntryPoint);
        }
        if !has_termination {
            return Err(GraphError::MissingTermination);
        }

        self.entry = entry;
        for step in batch {
            debug!(step = %step.id(), kind = ?step.kind(), "Registered step");
            self.order.push(step.id().clone());
            self.steps.insert(step.id().clone(), step);
        }
        Ok(())
    }

    /// Register an unconditional transition from `source` to `target`.
    pub fn connect(
        &mut self,
        source: impl Into<StepId>,
        target: impl Into<StepId>,
    ) -> Result<(), GraphError> {
        self.connect_with(source, [target], None)
    }

    /// Register a conditional transition: `router` picks one of `targets`.
    pub fn connect_when<I, T>(
        &mut self,
        source: impl Into<StepId>,
        targets: I,
        router: Router,
    ) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = T>,
        T: Into<StepId>,
    {
        self.connect_with(source, targets, Some(router))
    }

    /// Register the outgoing transition of `source`.
    ///
    /// A step has at most one outgoing transition. More than one target
    /// requires a router. A router on a single target is still consulted,
    /// and must return that target. The entry point is never a target.
    pub fn connect_with<I, T>(
        &mut self,
        source: impl Into<StepId>,
        targets: I,
        router: Option<Router>,
    ) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = T>,
        T: Into<StepId>,
    {
        let source = source.into();
        let targets: Vec<StepId> = targets.into_iter().map(Into::into).collect();

        let step = self
            .steps
            .get(&source)
            .ok_or_else(|| GraphError::UnknownStep(source.clone()))?;
        if step.is_termination() {
            return Err(GraphError::TerminationHasTransition(source));
        }
        if self.transitions.contains_key(&source) {
            return Err(GraphError::TransitionAlreadyDefined(source));
        }
        if targets.is_empty() {
            return Err(GraphError::NoTargets(source));
        }
        if let Some(unknown) = targets.iter().find(|t| !self.steps.contains_key(*t)) {
            return Err(GraphError::UnknownStep(unknown.clone()));
        }
        let entry_target = targets
            .iter()
            .find(|t| self.steps.get(*t).is_some_and(Step::is_entry));
        if let Some(entry) = entry_target {
            return Err(GraphError::TargetsEntryPoint {
                step: source,
                entry: entry.clone(),
            });
        }
        if targets.len() > 1 && router.is_none() {
            return Err(GraphError::MissingRouter {
                step: source,
                targets: targets.len(),
            });
        }

        debug!(
            source = %source,
            targets = ?targets,
            conditional = router.is_some(),
            "Registered transition"
        );
        self.transitions
            .insert(source.clone(), Transition::new(source, targets, router));
        Ok(())
    }

    /// Check the whole graph, collecting every problem instead of stopping
    /// at the first.
    ///
    /// `run` does not call this: a step with no outgoing transition is
    /// only an error once execution reaches it.
    pub fn validate(&self) -> Validation<(), NonEmptyVec<GraphError>> {
        let mut checks: Vec<Validation<(), NonEmptyVec<GraphError>>> = Vec::new();

        match &self.entry {
            None => checks.push(Validation::fail(GraphError::MissingEntryPoint)),
            Some(entry) if !self.transitions.contains_key(entry) => {
                checks.push(Validation::fail(GraphError::EntryNotConnected(entry.clone())))
            }
            Some(_) => checks.push(Validation::success(())),
        }

        if self.terminations().next().is_none() {
            checks.push(Validation::fail(GraphError::MissingTermination));
        }

        for step in self.steps() {
            let dangling = step.kind() == StepKind::Task && !self.transitions.contains_key(step.id());
            checks.push(if dangling {
                Validation::fail(GraphError::DanglingStep(step.id().clone()))
            } else {
                Validation::success(())
            });
        }

        Validation::all_vec(checks).map(|_| ())
    }

    /// Execute the graph from its entry point until a termination.
    ///
    /// Each executed step's update is merged into the running state and
    /// snapshotted. The entry point itself records nothing. Steps that
    /// declared a resource dependency receive `resources`; others do not.
    /// Errors raised by actions propagate unchanged and no partial run is
    /// returned.
    pub fn run(&self, initial: State, resources: Option<&Resources>) -> Result<Run, EngineError> {
        let entry = self.entry.clone().ok_or(GraphError::MissingEntryPoint)?;
        self.schema.check(&initial, "initial state")?;

        let empty = Resources::new();
        let resources = resources.unwrap_or(&empty);

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, entry = %entry, "Starting run");

        let mut state = initial;
        let mut snapshots: Vec<Snapshot> = Vec::new();
        let mut executed = 0usize;
        let mut current = entry;

        loop {
            let step = self
                .steps
                .get(&current)
                .ok_or_else(|| GraphError::UnknownStep(current.clone()))?;

            match step.kind() {
                StepKind::Termination => {
                    let termination = Snapshot {
                        step: current,
                        sequence: snapshots.len(),
                        state,
                        recorded_at: Utc::now(),
                    };
                    let run = Run::completed(run_id, started_at, snapshots, termination);
                    info!(
                        %run_id,
                        terminated_at = %run.terminated_at(),
                        snapshots = run.len(),
                        "Run finished"
                    );
                    return Ok(run);
                }
                StepKind::Entry => {}
                StepKind::Task => {
                    if let Some(limit) = self.config.max_steps {
                        if executed >= limit {
                            warn!(%run_id, limit, step = %current, "Iteration limit reached");
                            return Err(IterationLimitError {
                                limit,
                                step: current,
                            }
                            .into());
                        }
                    }
                    executed += 1;

                    debug!(%run_id, step = %current, sequence = snapshots.len(), "Executing step");
                    let update = Self::execute(step, &state, resources)?;
                    self.schema.check(&update, step.name())?;
                    state.merge(update);

                    snapshots.push(Snapshot {
                        step: current.clone(),
                        sequence: snapshots.len(),
                        state: state.clone(),
                        recorded_at: Utc::now(),
                    });
                }
            }

            let transition = self
                .transitions
                .get(&current)
                .ok_or_else(|| GraphError::DanglingStep(current.clone()))?;
            let next = transition.resolve(&state).map_err(|err| {
                warn!(%run_id, error = %err, "Routing failed");
                err
            })?;
            debug!(%run_id, from = %current, to = %next, "Resolved transition");
            current = next;
        }
    }

    /// Continue a conversation: run again starting from `previous`'s final
    /// state with `input` merged over it.
    pub fn resume(
        &self,
        previous: &Run,
        input: State,
        resources: Option<&Resources>,
    ) -> Result<Run, EngineError> {
        let mut state = previous.get_final_state();
        state.merge(input);
        self.run(state, resources)
    }

    fn execute(step: &Step, state: &State, resources: &Resources) -> Result<State, EngineError> {
        let Some(result) = step.invoke(state, resources) else {
            return Ok(State::new());
        };
        let value = result.map_err(|source| EngineError::Action {
            step: step.id().clone(),
            source,
        })?;
        State::try_from(value).map_err(|rejected| {
            StepContractError {
                step: step.id().clone(),
                found: json_type(&rejected),
            }
            .into()
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn entry(&self) -> Option<&StepId> {
        self.entry.as_ref()
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.get(id)
    }

    /// Registered steps in registration order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.order.iter().filter_map(|id| self.steps.get(id))
    }

    pub fn terminations(&self) -> impl Iterator<Item = &Step> {
        self.steps().filter(|step| step.is_termination())
    }

    pub fn transition(&self, source: &str) -> Option<&Transition> {
        self.transitions.get(source)
    }

    /// Transitions in the registration order of their source steps.
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.order.iter().filter_map(|id| self.transitions.get(id))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
