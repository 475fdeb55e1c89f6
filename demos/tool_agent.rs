//! A tool-calling agent loop with session memory.
//!
//! The model client is a scripted stand-in injected as a resource. It asks
//! for the `get_games` tool on the first call of a turn and answers once a
//! tool result is in the transcript. Each turn is seeded from the last run
//! of the session.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stepgraph::checkpoint::RunCheckpoint;
use stepgraph::core::{Router, Schema, State};
use stepgraph::engine::{ActionResult, EngineError, EntryPoint, StateMachine, Step, Termination};
use stepgraph::memory::{InMemorySessions, SessionMemory};
use stepgraph::resources::Resources;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct ScriptedModel {
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn invoke(&self, messages: &[Value]) -> Value {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = messages.last().filter(|m| m["role"] == "tool") {
            json!({
                "role": "assistant",
                "content": format!("Based on the data: {}", result["content"])
            })
        } else {
            json!({
                "role": "assistant",
                "tool_calls": [{ "name": "get_games", "args": { "num_games": 1, "top": true } }]
            })
        }
    }
}

fn get_games(num_games: usize, top: bool) -> Value {
    let mut games = vec![
        ("The Legend of Zelda: Breath of the Wild", 98),
        ("Super Mario Odyssey", 97),
        ("Metroid Prime", 97),
        ("Pikmin 3", 85),
    ];
    games.sort_by_key(|(_, score)| *score);
    if top {
        games.reverse();
    }
    games
        .into_iter()
        .take(num_games)
        .map(|(game, score)| json!({ "Game": game, "Score": score }))
        .collect()
}

fn prepare_messages(state: &State) -> ActionResult {
    let mut messages = state.get_array("messages").cloned().unwrap_or_default();
    if messages.is_empty() {
        messages.push(json!({ "role": "system", "content": state.get_str("instructions").unwrap_or_default() }));
    }
    messages.push(json!({ "role": "user", "content": state.get_str("user_query").unwrap_or_default() }));
    Ok(json!({ "messages": messages }))
}

fn call_model(state: &State, resources: &Resources) -> ActionResult {
    let model = resources.require::<ScriptedModel>("llm")?;
    let mut messages = state.get_array("messages").cloned().unwrap_or_default();
    let reply = model.invoke(&messages);
    let tool_calls = reply.get("tool_calls").cloned().unwrap_or(Value::Null);
    messages.push(reply);
    Ok(json!({ "messages": messages, "current_tool_calls": tool_calls }))
}

fn run_tools(state: &State) -> ActionResult {
    let mut messages = state.get_array("messages").cloned().unwrap_or_default();
    for call in state.get_array("current_tool_calls").cloned().unwrap_or_default() {
        // Tool failures become transcript entries instead of run errors.
        let content = match call["name"].as_str() {
            Some("get_games") => {
                let num = call["args"]["num_games"].as_u64().unwrap_or(1) as usize;
                let top = call["args"]["top"].as_bool().unwrap_or(true);
                get_games(num, top).to_string()
            }
            other => format!("Unknown tool: {other:?}"),
        };
        messages.push(json!({ "role": "tool", "content": content }));
    }
    Ok(json!({ "messages": messages, "current_tool_calls": null }))
}

fn build_agent() -> Result<StateMachine, EngineError> {
    let mut machine = StateMachine::new(Schema::new([
        "user_query",
        "instructions",
        "messages",
        "current_tool_calls",
        "session_id",
    ]));

    let entry = EntryPoint::new();
    let message_prep = Step::new("message_prep", prepare_messages);
    let llm_processor = Step::with_resources("llm_processor", call_model);
    let tool_executor = Step::new("tool_executor", run_tools);
    let termination = Termination::new();

    machine.add_steps(vec![
        entry.clone(),
        message_prep.clone(),
        llm_processor.clone(),
        tool_executor.clone(),
        termination.clone(),
    ])?;
    machine.connect(&entry, &message_prep)?;
    machine.connect(&message_prep, &llm_processor)?;
    machine.connect_when(
        &llm_processor,
        [&tool_executor, &termination],
        Router::on_present("current_tool_calls", &tool_executor, &termination),
    )?;
    machine.connect(&tool_executor, &llm_processor)?;
    Ok(machine)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let agent = build_agent()?;
    let model = Arc::new(ScriptedModel {
        calls: AtomicUsize::new(0),
    });
    let mut resources = Resources::new();
    resources.insert_arc("llm", Arc::clone(&model));
    let memory = InMemorySessions::new();

    for query in ["What's the best game in the dataset?", "And which one is second?"] {
        let mut initial = memory
            .get_last("games")
            .map(|run| run.get_final_state())
            .unwrap_or_else(|| {
                State::new().with("instructions", "You can bring insights about a game dataset")
            });
        initial.insert("user_query", query);
        initial.insert("session_id", "games");

        let run = agent.run(initial, Some(&resources))?;
        let messages = run.final_state().get_array("messages").cloned().unwrap_or_default();
        println!("User: {query}");
        if let Some(last) = messages.last() {
            println!("Assistant: {}", last["content"]);
        }
        println!("Message count: {}\n", messages.len());
        memory.append("games", run);
    }

    info!(model_calls = model.calls.load(Ordering::SeqCst), "Session finished");

    if let Some(last) = memory.get_last("games") {
        let saved = RunCheckpoint::capture(&last).to_json()?;
        println!("Checkpoint size: {} bytes", saved.len());
    }
    Ok(())
}
