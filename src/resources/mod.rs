//! Shared handles injected into steps.
//!
//! Resources carry long-lived, non-serializable objects (model clients,
//! database connections, vector indexes) from the caller into step
//! actions. They live beside the state, never inside it: the engine does
//! not snapshot, serialize, or mutate them. Handles that are used from
//! several runs at once must do their own locking.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised when a step looks up a resource.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResourceError {
    #[error("Resource '{name}' is not registered")]
    Missing { name: String },

    #[error("Resource '{name}' is not a {expected}")]
    WrongType { name: String, expected: &'static str },
}

type Handle = Arc<dyn Any + Send + Sync>;

/// Named bag of shared handles.
///
/// Cloning a `Resources` clones the `Arc`s, not the handles, so every
/// clone hands out the same instances.
///
/// # Example
///
/// ```rust
/// use stepgraph::resources::Resources;
/// use std::sync::Arc;
///
/// struct VectorIndex { dims: usize }
///
/// let resources = Resources::new().with("index", VectorIndex { dims: 384 });
/// let index: Arc<VectorIndex> = resources.get("index").unwrap();
/// assert_eq!(index.dims, 384);
/// ```
#[derive(Clone, Default)]
pub struct Resources {
    handles: BTreeMap<String, Handle>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of an owned handle.
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, handle: T) -> Self {
        self.insert_arc(name, Arc::new(handle));
        self
    }

    /// Register a handle the caller already shares.
    pub fn insert_arc<T: Any + Send + Sync>(&mut self, name: impl Into<String>, handle: Arc<T>) {
        self.handles.insert(name.into(), handle);
    }

    /// Look up a handle by name and type. The returned `Arc` points at
    /// the instance that was registered.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.handles
            .get(name)
            .and_then(|handle| Arc::clone(handle).downcast::<T>().ok())
    }

    /// Like [`Resources::get`], but reports why the lookup failed.
    pub fn require<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ResourceError> {
        let handle = self.handles.get(name).ok_or_else(|| ResourceError::Missing {
            name: name.to_string(),
        })?;
        Arc::clone(handle)
            .downcast::<T>()
            .map_err(|_| ResourceError::WrongType {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resources")
            .field("names", &self.handles.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ModelClient {
        model: String,
    }

    #[test]
    fn get_returns_registered_instance() {
        let client = Arc::new(ModelClient {
            model: "gpt-4o-mini".to_string(),
        });
        let mut resources = Resources::new();
        resources.insert_arc("llm", Arc::clone(&client));

        let fetched: Arc<ModelClient> = resources.get("llm").unwrap();
        assert!(Arc::ptr_eq(&fetched, &client));
        assert_eq!(fetched.model, "gpt-4o-mini");
    }

    #[test]
    fn get_with_wrong_type_is_none() {
        let resources = Resources::new().with("count", 3_u32);
        assert!(resources.get::<String>("count").is_none());
        assert!(resources.get::<u32>("missing").is_none());
    }

    #[test]
    fn require_explains_failures() {
        let resources = Resources::new().with("count", 3_u32);

        assert!(matches!(
            resources.require::<u32>("other"),
            Err(ResourceError::Missing { .. })
        ));
        assert!(matches!(
            resources.require::<String>("count"),
            Err(ResourceError::WrongType { .. })
        ));
        assert_eq!(*resources.require::<u32>("count").unwrap(), 3);
    }

    #[test]
    fn clones_share_handles() {
        let resources = Resources::new().with("log", Mutex::new(Vec::<String>::new()));
        let cloned = resources.clone();

        cloned
            .get::<Mutex<Vec<String>>>("log")
            .unwrap()
            .lock()
            .unwrap()
            .push("written through clone".to_string());

        let log = resources.get::<Mutex<Vec<String>>>("log").unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn names_are_listed() {
        let resources = Resources::new().with("llm", ()).with("db", ());
        let names: Vec<_> = resources.names().collect();

        assert_eq!(names, vec!["db", "llm"]);
        assert_eq!(resources.len(), 2);
        assert!(resources.contains("db"));
    }
}
