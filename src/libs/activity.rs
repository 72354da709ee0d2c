//! Activity state model shared by every state tier.
//!
//! The monitor keeps exactly one logical [`ActivityState`]. It is never mutated
//! in place: every change is expressed as an [`ActivityPatch`] and routed
//! through the state tier accessor, which decides from the patch's field set
//! which tiers receive the write.
//!
//! ## Tier Ownership
//!
//! | Field                | container | fast | local |
//! |----------------------|:---------:|:----:|:-----:|
//! | `actionName`         | ✓         |      |       |
//! | `isIdle`             | ✓         |      |       |
//! | `isPaused`           | ✓         |      |       |
//! | `lastActive`         | ✓         | ✓    | ✓     |
//! | `lastEvent`          | ✓         | ✓    |       |
//! | `timeoutID`          | ✓         | ✓    |       |
//! | `isDetectionRunning` | ✓         | ✓    |       |
//!
//! The routing decision lives in [`WritePlan::for_patch`], a pure function of
//! the patch and the enabled tiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a scheduled transition.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeoutId(pub u64);

impl fmt::Display for TimeoutId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pointer position captured with the last recorded activity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Point {
    /// Off-screen position, so the first real pointer move always registers.
    fn default() -> Self {
        Self { x: -1.0, y: -1.0 }
    }
}

/// The monitor's complete activity state as seen by the container.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityState {
    /// Current entry of the named state sequence, `None` before the first start.
    pub action_name: Option<String>,
    /// No further state follows the current one.
    pub is_idle: bool,
    pub is_paused: bool,
    /// Epoch milliseconds of the last qualifying activity.
    pub last_active: i64,
    pub last_event: Point,
    #[serde(rename = "timeoutID")]
    pub timeout_id: Option<TimeoutId>,
    pub is_detection_running: bool,
}

impl Default for ActivityState {
    fn default() -> Self {
        Self {
            action_name: None,
            is_idle: false,
            is_paused: false,
            last_active: 0,
            last_event: Point::default(),
            timeout_id: None,
            is_detection_running: false,
        }
    }
}

impl ActivityState {
    /// Builds the state a freshly configured monitor starts from.
    pub fn initial(now_ms: i64, last_event: Point) -> Self {
        Self {
            last_active: now_ms,
            last_event,
            ..Default::default()
        }
    }

    /// Returns a copy with `patch` merged over this state.
    pub fn merged(&self, patch: &ActivityPatch) -> Self {
        let mut next = self.clone();
        if let Some(action_name) = &patch.action_name {
            next.action_name = Some(action_name.clone());
        }
        if let Some(is_idle) = patch.is_idle {
            next.is_idle = is_idle;
        }
        if let Some(is_paused) = patch.is_paused {
            next.is_paused = is_paused;
        }
        if let Some(last_active) = patch.last_active {
            next.last_active = last_active;
        }
        if let Some(last_event) = patch.last_event {
            next.last_event = last_event;
        }
        if let Some(timeout_id) = patch.timeout_id {
            next.timeout_id = timeout_id;
        }
        if let Some(running) = patch.is_detection_running {
            next.is_detection_running = running;
        }
        next
    }
}

/// A partial update of [`ActivityState`].
///
/// `None` means "field not touched". `timeout_id` is doubly optional because
/// clearing the handle (`Some(None)`) is itself a write.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_idle: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event: Option<Point>,
    #[serde(rename = "timeoutID", skip_serializing_if = "Option::is_none")]
    pub timeout_id: Option<Option<TimeoutId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_detection_running: Option<bool>,
}

impl ActivityPatch {
    pub fn activity(last_active: i64, last_event: Point) -> Self {
        Self {
            last_active: Some(last_active),
            last_event: Some(last_event),
            ..Default::default()
        }
    }

    pub fn detection(running: bool) -> Self {
        Self {
            is_detection_running: Some(running),
            ..Default::default()
        }
    }

    /// Fields carrying a value in this patch.
    pub fn fields(&self) -> FieldSet {
        let mut set = FieldSet::EMPTY;
        if self.action_name.is_some() {
            set = set.with(Field::ActionName);
        }
        if self.is_idle.is_some() {
            set = set.with(Field::IsIdle);
        }
        if self.is_paused.is_some() {
            set = set.with(Field::IsPaused);
        }
        if self.last_active.is_some() {
            set = set.with(Field::LastActive);
        }
        if self.last_event.is_some() {
            set = set.with(Field::LastEvent);
        }
        if self.timeout_id.is_some() {
            set = set.with(Field::TimeoutId);
        }
        if self.is_detection_running.is_some() {
            set = set.with(Field::IsDetectionRunning);
        }
        set
    }
}

/// Individual fields of [`ActivityState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ActionName,
    IsIdle,
    IsPaused,
    LastActive,
    LastEvent,
    TimeoutId,
    IsDetectionRunning,
}

impl Field {
    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Compact set of [`Field`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldSet(u8);

impl FieldSet {
    pub const EMPTY: FieldSet = FieldSet(0);

    pub fn of(fields: &[Field]) -> Self {
        fields.iter().fold(Self::EMPTY, |set, field| set.with(*field))
    }

    pub fn with(self, field: Field) -> Self {
        Self(self.0 | field.bit())
    }

    pub fn contains(self, field: Field) -> bool {
        self.0 & field.bit() != 0
    }

    pub fn intersects(self, other: FieldSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Fields the in-memory tier is authoritative for.
pub const FAST_FIELDS: [Field; 4] = [Field::LastActive, Field::LastEvent, Field::TimeoutId, Field::IsDetectionRunning];

/// Fields persisted across restarts.
pub const LOCAL_FIELDS: [Field; 1] = [Field::LastActive];

/// Fields only the container holds.
pub const CONTAINER_ONLY_FIELDS: [Field; 3] = [Field::ActionName, Field::IsIdle, Field::IsPaused];

/// Which tiers a single `set_state` call writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePlan {
    pub local: bool,
    pub fast: bool,
    pub container: bool,
}

impl WritePlan {
    /// Decides the tiers touched by `patch`.
    ///
    /// The container is skipped only when the fast tier absorbs the whole
    /// write, which keeps pointer-move storms away from the container.
    pub fn for_patch(patch: &ActivityPatch, use_fast_store: bool, use_local_store: bool) -> Self {
        let fields = patch.fields();
        let local = use_local_store && fields.intersects(FieldSet::of(&LOCAL_FIELDS));
        let fast = use_fast_store && fields.intersects(FieldSet::of(&FAST_FIELDS));
        let container = !fast || fields.intersects(FieldSet::of(&CONTAINER_ONLY_FIELDS));
        Self { local, fast, container }
    }

    pub fn bypasses_container(&self) -> bool {
        self.fast && !self.container
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_only_patch_skips_container() {
        let patch = ActivityPatch {
            last_event: Some(Point::new(1.0, 1.0)),
            ..Default::default()
        };
        let plan = WritePlan::for_patch(&patch, true, true);
        assert!(plan.fast);
        assert!(!plan.local);
        assert!(!plan.container);
        assert!(plan.bypasses_container());
    }

    #[test]
    fn test_container_fields_always_propagate() {
        let patch = ActivityPatch {
            action_name: Some("active".into()),
            timeout_id: Some(None),
            ..Default::default()
        };
        let plan = WritePlan::for_patch(&patch, true, false);
        assert!(plan.fast);
        assert!(plan.container);
    }

    #[test]
    fn test_disabled_fast_tier_sends_everything_to_container() {
        let patch = ActivityPatch::activity(10, Point::new(2.0, 3.0));
        let plan = WritePlan::for_patch(&patch, false, true);
        assert!(!plan.fast);
        assert!(plan.local);
        assert!(plan.container);
    }

    #[test]
    fn test_cleared_timeout_counts_as_a_write() {
        let patch = ActivityPatch {
            timeout_id: Some(None),
            ..Default::default()
        };
        assert!(patch.fields().contains(Field::TimeoutId));
        assert!(ActivityPatch::default().fields().is_empty());
    }

    #[test]
    fn test_merge_keeps_untouched_fields() {
        let state = ActivityState::initial(100, Point::default());
        let merged = state.merged(&ActivityPatch {
            is_paused: Some(true),
            timeout_id: Some(Some(TimeoutId(7))),
            ..Default::default()
        });
        assert!(merged.is_paused);
        assert_eq!(merged.timeout_id, Some(TimeoutId(7)));
        assert_eq!(merged.last_active, 100);
        assert_eq!(merged.action_name, None);
    }

    #[test]
    fn test_patch_serializes_only_touched_fields() {
        let patch = ActivityPatch {
            is_idle: Some(false),
            timeout_id: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "isIdle": false, "timeoutID": null }));
    }
}
