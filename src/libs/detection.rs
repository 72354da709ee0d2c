//! Activity detection: listener lifecycle and the input filter.
//!
//! Raw input arrives as [`ActivityEvent`]s. The detector only lets through
//! events of the configured kinds while it is running, and throttles pointer
//! moves with a combined spatial and temporal threshold so a moving mouse
//! cannot flood the state machine.
//!
//! ## Features
//!
//! - **Shared Listener**: one listener attached to every configured
//!   [`EventKind`]; `isDetectionRunning` lives on the fast tier
//! - **Symmetric Lifecycle**: starting a running detector or stopping a
//!   stopped one is a usage error and panics in debug builds
//! - **Pointer Throttle**: a `mousemove` needs coordinates, a displacement of
//!   at least [`Thresholds::mouse`] on either axis and at least
//!   [`Thresholds::elapsed_ms`] since `lastActive`
//!
//! ## Filter
//!
//! ```text
//!   ActivityEvent ──listens_to(kind)?──no──▶ dropped
//!                        │yes
//!                        ▼
//!                 kind == mousemove? ──no──▶ counts
//!                        │yes
//!                        ▼
//!        position known, moved >= mouse, elapsed >= elapsed_ms? ──no──▶ dropped
//!                        │yes
//!                        ▼
//!                      counts
//! ```

use super::activity::{ActivityPatch, Point};
use super::context::ACTIVITY_ACTION;
use super::tiers::{FastState, StateTiers};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of input that can signal activity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    MouseMove,
    MouseDown,
    KeyDown,
    Wheel,
    TouchStart,
    TouchMove,
}

impl EventKind {
    /// Every kind, which is also the default subscription.
    pub fn defaults() -> Vec<EventKind> {
        vec![
            EventKind::MouseMove,
            EventKind::KeyDown,
            EventKind::Wheel,
            EventKind::MouseDown,
            EventKind::TouchStart,
            EventKind::TouchMove,
        ]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            EventKind::MouseMove => "mousemove",
            EventKind::MouseDown => "mousedown",
            EventKind::KeyDown => "keydown",
            EventKind::Wheel => "wheel",
            EventKind::TouchStart => "touchstart",
            EventKind::TouchMove => "touchmove",
        };
        write!(f, "{}", name)
    }
}

/// One raw input event. Pointer events carry page coordinates when known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivityEvent {
    pub kind: EventKind,
    pub position: Option<Point>,
}

impl ActivityEvent {
    pub fn new(kind: EventKind) -> Self {
        Self { kind, position: None }
    }

    pub fn mouse_move(x: f64, y: f64) -> Self {
        Self {
            kind: EventKind::MouseMove,
            position: Some(Point::new(x, y)),
        }
    }
}

/// Minimum pointer displacement (pixels) and elapsed time (ms) for a pointer
/// move to count as activity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub mouse: f64,
    pub elapsed_ms: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            mouse: 25.0,
            elapsed_ms: 1_000,
        }
    }
}

/// Starts and stops listening, and decides which events count.
#[derive(Debug, Clone)]
pub struct ActivityDetector {
    active_events: Vec<EventKind>,
    thresholds: Thresholds,
    attached: Vec<EventKind>,
}

impl ActivityDetector {
    pub fn new(active_events: Vec<EventKind>, thresholds: Thresholds) -> Self {
        Self {
            active_events,
            thresholds,
            attached: Vec::new(),
        }
    }

    /// Reads `isDetectionRunning` from the fast tier.
    pub fn is_running(&self, tiers: &StateTiers) -> bool {
        tiers.fast().is_detection_running
    }

    /// Attaches the shared listener to every configured event kind.
    ///
    /// Starting twice is a usage error and panics in debug builds.
    pub fn start(&mut self, tiers: &mut StateTiers) -> Result<()> {
        debug_assert!(!self.is_running(tiers), "activity detection is already running");
        self.attached = self.active_events.clone();
        tracing::debug!(events = ?self.attached, "activity detection started");
        tiers.set_state(ACTIVITY_ACTION, ActivityPatch::detection(true))?;
        Ok(())
    }

    /// Detaches the listener. Stopping twice panics in debug builds.
    pub fn stop(&mut self, tiers: &mut StateTiers) -> Result<()> {
        debug_assert!(self.is_running(tiers), "activity detection is not running");
        self.attached.clear();
        tracing::debug!("activity detection stopped");
        tiers.set_state(ACTIVITY_ACTION, ActivityPatch::detection(false))?;
        Ok(())
    }

    /// Whether an event of `kind` currently reaches the listener.
    pub fn listens_to(&self, kind: EventKind) -> bool {
        self.attached.contains(&kind)
    }

    /// Whether `event` should be recorded as activity.
    ///
    /// Anything but a pointer move counts. A pointer move counts only with
    /// both coordinates, a displacement of at least `thresholds.mouse` on
    /// either axis and at least `thresholds.elapsed_ms` since `lastActive`.
    pub fn should_activity_update(&self, event: &ActivityEvent, fast: &FastState, now_ms: i64) -> bool {
        if event.kind != EventKind::MouseMove {
            return true;
        }
        let Some(position) = event.position else {
            return false;
        };
        let last = fast.last_event;
        if (position.x - last.x).abs() < self.thresholds.mouse && (position.y - last.y).abs() < self.thresholds.mouse {
            return false;
        }
        let elapsed_ms = now_ms - fast.last_active;
        if elapsed_ms < self.thresholds.elapsed_ms {
            return false;
        }
        tracing::trace!(elapsed_ms, threshold_ms = self.thresholds.elapsed_ms, last_active = fast.last_active, "pointer move counts as activity");
        true
    }
}
