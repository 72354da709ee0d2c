//! State container boundary.
//!
//! The idle monitor does not own the application's state container; it only
//! needs to dispatch actions into it and read its own slice back. This module
//! defines that boundary:
//!
//! - [`Action`]: a flux standard action (`type`, `payload`, optional `meta`)
//! - [`Store`]: the `dispatch` / `get_state` pair
//! - [`StateTree`]: one read abstraction over plain-object and map-like trees,
//!   so the rest of the crate never branches on the tree representation
//! - [`ActionRegistry`]: typed action names and their creators
//! - [`MemoryStore`]: an in-process container with a merging reducer, used by
//!   the `watch` command and the test suite
//!
//! ## Usage
//!
//! ```rust
//! use idlewatch::libs::store::{ActionRegistry, MemoryStore, StateTree, Store, ROOT_STATE_KEY};
//! use idlewatch::libs::activity::{ActivityPatch, ActivityState, Point};
//!
//! let mut registry = ActionRegistry::new("idlewatch", "demo");
//! registry.register("activity").unwrap();
//! let mut store = MemoryStore::for_monitor(&registry, &ActivityState::initial(0, Point::default()));
//!
//! let action = registry.creator("activity").unwrap().create(&ActivityPatch::activity(42, Point::new(1.0, 2.0))).unwrap();
//! store.dispatch(action).unwrap();
//! assert_eq!(store.get_state().select(ROOT_STATE_KEY).unwrap().last_active, 42);
//! ```

use super::activity::{ActivityPatch, ActivityState};
use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Key of the monitor's slice inside the container's state tree.
pub const ROOT_STATE_KEY: &str = "idlemonitor";

/// Action dispatched once by a store when it is created.
pub const INIT_ACTION_TYPE: &str = "@@idlewatch/INIT";

/// Missing or conflicting action configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("action definition for actionName {0} must be configured")]
    UnknownAction(String),
    #[error("actionName {0} is defined more than once")]
    DuplicateAction(String),
    #[error("at least one named state must be configured")]
    EmptySequence,
}

/// Flux standard action.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Action {
    pub fn new(action_type: impl Into<String>, payload: Value) -> Self {
        Self {
            action_type: action_type.into(),
            payload,
            meta: None,
        }
    }
}

/// Read access to a container state tree.
pub trait StateTree {
    /// Returns the activity slice stored under `key`, if present and well formed.
    fn select(&self, key: &str) -> Option<ActivityState>;
}

/// Plain-object tree (`{ "idlemonitor": { ... }, ... }`).
impl StateTree for Value {
    fn select(&self, key: &str) -> Option<ActivityState> {
        self.get(key).and_then(|slice| serde_json::from_value(slice.clone()).ok())
    }
}

/// Map-like tree keyed by slice name.
impl StateTree for HashMap<String, ActivityState> {
    fn select(&self, key: &str) -> Option<ActivityState> {
        self.get(key).cloned()
    }
}

impl StateTree for BTreeMap<String, ActivityState> {
    fn select(&self, key: &str) -> Option<ActivityState> {
        self.get(key).cloned()
    }
}

/// The `dispatch` / `get_state` pair of a state container.
pub trait Store: Send {
    fn dispatch(&mut self, action: Action) -> Result<Action>;
    fn get_state(&self) -> &dyn StateTree;
}

/// Builds a typed action for one registered name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCreator {
    action_type: String,
}

impl ActionCreator {
    pub fn create(&self, payload: &ActivityPatch) -> Result<Action> {
        Ok(Action::new(self.action_type.clone(), serde_json::to_value(payload)?))
    }
}

/// Formats `LIB_APP_ACTION` action types.
pub fn format_action_type(lib_name: &str, app_name: &str, action_name: &str) -> String {
    [lib_name, app_name, action_name].iter().map(|part| clean_name(part)).collect::<Vec<_>>().join("_")
}

fn clean_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    let mut pending_separator = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !cleaned.is_empty() {
                cleaned.push('_');
            }
            pending_separator = false;
            cleaned.extend(ch.to_uppercase());
        } else {
            pending_separator = true;
        }
    }
    cleaned
}

/// Registered action names and their typed action creators.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    lib_name: String,
    app_name: String,
    names: Vec<String>,
    types: HashMap<String, String>,
}

impl ActionRegistry {
    pub fn new(lib_name: &str, app_name: &str) -> Self {
        Self {
            lib_name: lib_name.to_string(),
            app_name: app_name.to_string(),
            names: Vec::new(),
            types: HashMap::new(),
        }
    }

    pub fn register(&mut self, action_name: &str) -> Result<(), RegistryError> {
        if self.types.contains_key(action_name) {
            return Err(RegistryError::DuplicateAction(action_name.to_string()));
        }
        let action_type = format_action_type(&self.lib_name, &self.app_name, action_name);
        self.names.push(action_name.to_string());
        self.types.insert(action_name.to_string(), action_type);
        Ok(())
    }

    pub fn action_type(&self, action_name: &str) -> Result<&str, RegistryError> {
        self.types
            .get(action_name)
            .map(String::as_str)
            .ok_or_else(|| RegistryError::UnknownAction(action_name.to_string()))
    }

    pub fn creator(&self, action_name: &str) -> Result<ActionCreator, RegistryError> {
        Ok(ActionCreator {
            action_type: self.action_type(action_name)?.to_string(),
        })
    }

    /// Action types in registration order.
    pub fn action_types(&self) -> Vec<String> {
        self.names.iter().filter_map(|name| self.types.get(name).cloned()).collect()
    }
}

/// Reduces an action against the whole state tree.
pub type Reducer = Box<dyn Fn(&Value, &Action) -> Value + Send>;

/// Reducer that shallow-merges the payload of subscribed action types into the
/// slice under `root_key`. Other actions leave the tree untouched.
pub fn merging_reducer(root_key: &str, subscribe_types: Vec<String>) -> Reducer {
    let root_key = root_key.to_string();
    Box::new(move |state, action| {
        if !subscribe_types.iter().any(|t| t == &action.action_type) {
            return state.clone();
        }
        let mut next = state.clone();
        if !next.is_object() {
            next = Value::Object(Map::new());
        }
        if let (Some(tree), Value::Object(payload)) = (next.as_object_mut(), &action.payload) {
            let slice = tree.entry(root_key.clone()).or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(fields) = slice {
                for (key, value) in payload {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }
        next
    })
}

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Handle returned by [`MemoryStore::subscribe`].
pub struct Subscription {
    id: u64,
    listeners: Arc<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.listeners.lock().entries.retain(|(id, _)| *id != self.id);
    }
}

/// In-process state container holding a JSON state tree.
pub struct MemoryStore {
    state: Value,
    reducer: Reducer,
    listeners: Arc<Mutex<Listeners>>,
}

impl MemoryStore {
    pub fn new(reducer: Reducer, initial_state: Value) -> Self {
        let mut store = Self {
            state: initial_state,
            reducer,
            listeners: Arc::new(Mutex::new(Listeners::default())),
        };
        store.state = (store.reducer)(&store.state, &Action::new(INIT_ACTION_TYPE, Value::Null));
        store
    }

    /// A container holding only the monitor's slice, reducing every action
    /// type known to `registry`.
    pub fn for_monitor(registry: &ActionRegistry, initial: &ActivityState) -> Self {
        let mut tree = Map::new();
        tree.insert(ROOT_STATE_KEY.to_string(), serde_json::to_value(initial).unwrap_or(Value::Null));
        Self::new(merging_reducer(ROOT_STATE_KEY, registry.action_types()), Value::Object(tree))
    }

    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let mut listeners = self.listeners.lock();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.push((id, Arc::new(listener)));
        Subscription {
            id,
            listeners: self.listeners.clone(),
        }
    }

    pub fn replace_reducer(&mut self, reducer: Reducer) {
        self.reducer = reducer;
        self.state = (self.reducer)(&self.state, &Action::new(INIT_ACTION_TYPE, Value::Null));
    }
}

impl Store for MemoryStore {
    fn dispatch(&mut self, action: Action) -> Result<Action> {
        self.state = (self.reducer)(&self.state, &action);
        // snapshot, so a listener may unsubscribe itself or others
        let listeners: Vec<Listener> = self.listeners.lock().entries.iter().map(|(_, listener)| listener.clone()).collect();
        for listener in listeners {
            listener();
        }
        Ok(action)
    }

    fn get_state(&self) -> &dyn StateTree {
        &self.state
    }
}
