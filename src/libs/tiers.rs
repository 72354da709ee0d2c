//! State tier accessor.
//!
//! The activity state lives in up to three tiers:
//!
//! - **container**: the application's state container, authoritative for every
//!   field but comparatively expensive to write
//! - **fast**: an in-memory copy of the high-frequency fields, so pointer moves
//!   never reach the container
//! - **local**: a persisted key/value store keeping `lastActive` across restarts
//!
//! [`StateTiers::set_state`] is the only write path. Reads go through
//! [`StateTiers::redux`], [`StateTiers::fast`] and [`StateTiers::local`]; when
//! the fast tier is enabled its fields are always read from it, never from a
//! container that may not have seen the write.
//!
//! ## Write Routing
//!
//! ```text
//!   set_state(name, patch)
//!     │
//!     ├─ patch.last_active && local enabled ──▶ local  (IDLEMONITOR_ACTIVITY_lastActive)
//!     ├─ fast field in patch && fast enabled ──▶ fast   (stamps lastActive = now)
//!     │       └─ only fast fields? ──▶ done, container untouched
//!     └─ otherwise ──▶ registry.creator(name) ──▶ store.dispatch(action)
//! ```
//!
//! | Field                | container | fast | local |
//! |----------------------|-----------|------|-------|
//! | `actionName`         | ✓         |      |       |
//! | `isIdle`, `isPaused` | ✓         |      |       |
//! | `lastActive`         | ✓         | ✓    | ✓     |
//! | `lastEvent`          | ✓         | ✓    |       |
//! | `timeoutID`          | ✓         | ✓    |       |
//! | `isDetectionRunning` | ✓         | ✓    |       |
//!
//! ## Implementation Notes
//!
//! - Local writes are fire-and-forget: a failing [`KeyValueStore`] is logged
//!   at `debug` and otherwise ignored, and unreadable values read as `None`
//! - Writing to an unregistered action name fails with
//!   [`RegistryError::UnknownAction`](super::store::RegistryError::UnknownAction)

use super::activity::{ActivityPatch, ActivityState, Point, TimeoutId, WritePlan};
use super::clock::Clock;
use super::store::{ActionRegistry, Store, ROOT_STATE_KEY};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Storage key prefix for persisted activity fields.
pub const ACTIVITY_STORAGE_KEY: &str = "IDLEMONITOR_ACTIVITY";

/// Persisted key/value store with the `getItem` / `setItem` contract.
pub trait KeyValueStore: Send {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Non-persistent [`KeyValueStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage key of a persisted activity field, e.g. `IDLEMONITOR_ACTIVITY_lastActive`.
pub fn local_key(field: &str) -> String {
    format!("{}_{}", ACTIVITY_STORAGE_KEY, field)
}

/// High-frequency fields held in memory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FastState {
    pub last_active: i64,
    pub last_event: Point,
    pub timeout_id: Option<TimeoutId>,
    pub is_detection_running: bool,
}

impl FastState {
    fn new(now_ms: i64, last_event: Point) -> Self {
        Self {
            last_active: now_ms,
            last_event,
            timeout_id: None,
            is_detection_running: false,
        }
    }

    fn apply(&mut self, patch: &ActivityPatch, now_ms: i64) {
        if let Some(last_event) = patch.last_event {
            self.last_event = last_event;
        }
        if let Some(timeout_id) = patch.timeout_id {
            self.timeout_id = timeout_id;
        }
        if let Some(running) = patch.is_detection_running {
            self.is_detection_running = running;
        }
        self.last_active = now_ms;
    }
}

impl From<&ActivityState> for FastState {
    fn from(state: &ActivityState) -> Self {
        Self {
            last_active: state.last_active,
            last_event: state.last_event,
            timeout_id: state.timeout_id,
            is_detection_running: state.is_detection_running,
        }
    }
}

/// Fields read back from the persisted tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocalState {
    pub last_active: Option<i64>,
}

impl LocalState {
    /// Reads the persisted fields. Unreadable or absent values read as `None`.
    pub fn read(storage: &dyn KeyValueStore) -> Self {
        let last_active = storage
            .get_item(&local_key("lastActive"))
            .ok()
            .flatten()
            .and_then(|value| value.parse().ok());
        LocalState { last_active }
    }
}

/// Tier switches and the defaults the fast tier starts from.
#[derive(Debug, Clone, Copy)]
pub struct TierOptions {
    pub use_fast_store: bool,
    pub use_local_store: bool,
    pub initial_last_event: Point,
}

/// Unified read/write view over the container, fast and local tiers.
pub struct StateTiers {
    registry: Arc<ActionRegistry>,
    clock: Arc<dyn Clock>,
    store: Box<dyn Store>,
    fast: Option<FastState>,
    local: Option<Box<dyn KeyValueStore>>,
}

impl StateTiers {
    /// Creates the tiers, seeding the fast and local tiers with the current time.
    pub fn new(
        options: TierOptions,
        registry: Arc<ActionRegistry>,
        clock: Arc<dyn Clock>,
        store: Box<dyn Store>,
        local: Option<Box<dyn KeyValueStore>>,
    ) -> Self {
        let now = clock.now_ms();
        let fast = options.use_fast_store.then(|| FastState::new(now, options.initial_last_event));
        let mut local = if options.use_local_store { local } else { None };
        if let Some(storage) = local.as_mut() {
            persist(storage.as_mut(), "lastActive", &now.to_string());
        }
        Self {
            registry,
            clock,
            store,
            fast,
            local,
        }
    }

    /// Applies `patch` to every enabled tier that owns one of its fields.
    ///
    /// Returns `true` when the write was propagated to the container.
    pub fn set_state(&mut self, action_name: &str, patch: ActivityPatch) -> Result<bool> {
        let plan = WritePlan::for_patch(&patch, self.fast.is_some(), self.local.is_some());
        let now = self.clock.now_ms();

        if plan.local {
            if let (Some(storage), Some(last_active)) = (self.local.as_mut(), patch.last_active) {
                persist(storage.as_mut(), "lastActive", &last_active.to_string());
                tracing::trace!(last_active, "local state set");
            }
        }

        if plan.fast {
            if let Some(fast) = self.fast.as_mut() {
                fast.apply(&patch, now);
                tracing::debug!(fast_state = ?fast, "fast state set");
            }
            if plan.bypasses_container() {
                tracing::debug!(action_name, "bypassing container state update");
                return Ok(false);
            }
        }

        let action = self.registry.creator(action_name)?.create(&patch)?;
        tracing::debug!(action_name, action_type = %action.action_type, "updating container state");
        self.store.dispatch(action)?;
        Ok(true)
    }

    /// The container's view, with fast-tier fields taken from memory when enabled.
    pub fn redux(&self) -> ActivityState {
        let mut state = self.store.get_state().select(ROOT_STATE_KEY).unwrap_or_default();
        if let Some(fast) = &self.fast {
            state.last_active = fast.last_active;
            state.last_event = fast.last_event;
            state.timeout_id = fast.timeout_id;
            state.is_detection_running = fast.is_detection_running;
        }
        state
    }

    /// High-frequency fields: the in-memory tier, or the container when disabled.
    pub fn fast(&self) -> FastState {
        match &self.fast {
            Some(fast) => *fast,
            None => FastState::from(&self.redux()),
        }
    }

    /// Persisted fields, all `None` when the local tier is disabled.
    pub fn local(&self) -> LocalState {
        self.local
            .as_deref()
            .map_or_else(LocalState::default, |storage| LocalState::read(storage))
    }

    pub fn store_mut(&mut self) -> &mut dyn Store {
        self.store.as_mut()
    }
}

/// Persistence is fire-and-forget: failures are logged, never surfaced.
fn persist(storage: &mut dyn KeyValueStore, field: &str, value: &str) {
    if let Err(error) = storage.set_item(&local_key(field), value) {
        tracing::debug!(%error, field, "local state write skipped");
    }
}
