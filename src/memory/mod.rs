//! Per-conversation run history.
//!
//! The engine itself is stateless between runs. Conversational agents keep
//! every run of a session and seed the next turn from the last one:
//!
//! ```rust
//! use stepgraph::memory::{InMemorySessions, SessionMemory};
//!
//! let memory = InMemorySessions::new();
//! memory.create_session("games");
//! assert!(memory.get_last("games").is_none());
//! ```

use crate::core::Run;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Session used when the caller does not name one.
pub const DEFAULT_SESSION: &str = "default";

/// Store of runs grouped by session.
///
/// Implementations must be safe to share between threads; agents commonly
/// serve several conversations from one store.
pub trait SessionMemory: Send + Sync {
    /// Make sure a session exists. Existing sessions are left untouched.
    fn create_session(&self, session_id: &str);

    /// Record a finished run, creating the session if needed.
    fn append(&self, session_id: &str, run: Run);

    /// The most recent run of a session.
    fn get_last(&self, session_id: &str) -> Option<Run>;

    /// All runs of a session, oldest first.
    fn get_all(&self, session_id: &str) -> Vec<Run>;

    /// Forget every run of a session.
    fn reset(&self, session_id: &str);

    fn session_ids(&self) -> Vec<String>;
}

/// Process-local [`SessionMemory`].
#[derive(Debug, Default)]
pub struct InMemorySessions {
    sessions: RwLock<HashMap<String, Vec<Run>>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionMemory for InMemorySessions {
    fn create_session(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.entry(session_id.to_string()).or_default();
    }

    fn append(&self, session_id: &str, run: Run) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let runs = sessions.entry(session_id.to_string()).or_default();
        debug!(session = session_id, run_id = %run.id(), position = runs.len(), "Stored run");
        runs.push(run);
    }

    fn get_last(&self, session_id: &str) -> Option<Run> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(session_id).and_then(|runs| runs.last().cloned())
    }

    fn get_all(&self, session_id: &str) -> Vec<Run> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(session_id).cloned().unwrap_or_default()
    }

    fn reset(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(runs) = sessions.get_mut(session_id) {
            debug!(session = session_id, dropped = runs.len(), "Reset session");
            runs.clear();
        }
    }

    fn session_ids(&self) -> Vec<String> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }
}
