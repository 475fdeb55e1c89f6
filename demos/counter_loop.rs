//! Linear and looping workflows over a small counter state.
//!
//! Run with `RUST_LOG=stepgraph=debug cargo run --example counter_loop`
//! to see each step and transition.

use serde_json::json;
use stepgraph::core::{Router, Schema, State};
use stepgraph::engine::{EngineError, EntryPoint, StateMachine, Step, Termination};
use tracing_subscriber::EnvFilter;

fn linear_workflow() -> Result<(), EngineError> {
    let mut workflow = StateMachine::new(Schema::new(["input", "output"]));

    let entry = EntryPoint::new();
    let input = Step::new("input", |s: &State| {
        Ok(json!({ "output": s.get_i64("input").unwrap_or(0) + 1 }))
    });
    let double = Step::new("double", |s: &State| {
        Ok(json!({ "output": s.get_i64("output").unwrap_or(0) * 2 }))
    });
    let termination = Termination::new();

    workflow.add_steps(vec![
        entry.clone(),
        input.clone(),
        double.clone(),
        termination.clone(),
    ])?;
    workflow.connect(&entry, &input)?;
    workflow.connect(&input, &double)?;
    workflow.connect(&double, &termination)?;

    let run = workflow.run(State::new().with("input", 4), None)?;

    println!("Snapshots ({}):", run.len());
    for snapshot in run.snapshots() {
        println!("  #{} {}: {:?}", snapshot.sequence, snapshot.step, snapshot.state);
    }
    println!("Final state: {:?}\n", run.get_final_state());
    Ok(())
}

fn looping_workflow() -> Result<(), EngineError> {
    let mut workflow = StateMachine::new(Schema::new(["count", "max_value"]));

    let entry = EntryPoint::new();
    let increment = Step::new("increment", |s: &State| {
        Ok(json!({ "count": s.get_i64("count").unwrap_or(0) + 1 }))
    });
    let termination = Termination::new();

    let (again, done) = (increment.id().clone(), termination.id().clone());
    let check_counter = Router::new(move |s: &State| {
        if s.get_i64("count") >= s.get_i64("max_value") {
            done.clone()
        } else {
            again.clone()
        }
    });

    workflow.add_steps(vec![entry.clone(), increment.clone(), termination.clone()])?;
    workflow.connect(&entry, &increment)?;
    workflow.connect_when(&increment, [&increment, &termination], check_counter)?;

    let run = workflow.run(State::new().with("count", 0).with("max_value", 3), None)?;

    let metadata = run.metadata();
    println!("Run {} took {:?}", metadata.run_id, run.duration());
    println!("Path: {:?}", run.path());
    println!("Final state: {:?}", run.get_final_state());
    Ok(())
}

fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    linear_workflow()?;
    looping_workflow()
}
