//! Timeout scheduler: the single pending transition of a monitor.
//!
//! There is one slot. Setting a new deadline replaces whatever was pending,
//! so a stale transition can never fire after a newer one was scheduled.
//!
//! ## Features
//!
//! - **Single Slot**: [`TimeoutScheduler::set`] always displaces the previous
//!   deadline and hands out a fresh [`TimeoutId`]
//! - **Lazy Delays**: [`TimeoutSpec::Dynamic`] delays are resolved against the
//!   container every time a state is scheduled, not once at build time
//! - **Saturating Deadlines**: a deadline is `scheduled_at + delay_ms` clamped
//!   to `i64::MAX`, so a huge configured delay means "practically never"
//!   instead of wrapping into the past
//! - **No Timers**: the scheduler only answers "what is due at `now`?"; the
//!   caller owns sleeping
//!
//! ## Lifecycle
//!
//! ```text
//!   set(at, delay, transition) ──▶ [ pending ] ──take_due(now >= due)──▶ Transition
//!                                      │
//!                                      └──clear()──▶ [ empty ]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use idlewatch::libs::context::Delay;
//! use idlewatch::libs::timeout::{TimeoutScheduler, Transition};
//!
//! let mut scheduler = TimeoutScheduler::new();
//! scheduler.set(1_000, 500, Transition::new("inactive", Delay::After(500)));
//! assert_eq!(scheduler.next_due(), Some(1_500));
//! assert!(scheduler.take_due(1_499).is_none());
//! assert_eq!(scheduler.take_due(1_500).map(|t| t.action_name), Some("inactive".to_string()));
//! ```

use super::activity::TimeoutId;
use super::context::{Context, Control, Delay, TimeoutSpec};
use super::store::Store;
use anyhow::Result;

/// A transition into a named state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub action_name: String,
    pub is_paused: bool,
}

impl Transition {
    pub fn new(action_name: &str, delay: Delay) -> Self {
        Self {
            action_name: action_name.to_string(),
            is_paused: delay.is_pause(),
        }
    }
}

#[derive(Debug, Clone)]
struct Pending {
    id: TimeoutId,
    scheduled_at: i64,
    delay_ms: i64,
    transition: Transition,
}

impl Pending {
    fn due_ms(&self) -> i64 {
        self.scheduled_at.saturating_add(self.delay_ms)
    }
}

#[derive(Debug, Default)]
pub struct TimeoutScheduler {
    last_id: u64,
    pending: Option<Pending>,
}

impl TimeoutScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the pending transition, if any.
    pub fn clear(&mut self) -> Option<TimeoutId> {
        let cleared = self.pending.take().map(|pending| pending.id);
        if let Some(id) = cleared {
            tracing::trace!(%id, "timeout cleared");
        }
        cleared
    }

    /// Resolves the delay for `action_name`, evaluating dynamic timeouts now.
    ///
    /// Also returns the controls a dynamic timeout function requested through
    /// its child context; applying them is up to the caller.
    pub fn timeout_ms(&self, context: &Context, store: &mut dyn Store, action_name: &str) -> Result<(Delay, Vec<Control>)> {
        let resolved = match context.timeout_spec(action_name)? {
            TimeoutSpec::After(ms) => (Delay::After(*ms), Vec::new()),
            TimeoutSpec::Pause => (Delay::Pause, Vec::new()),
            TimeoutSpec::Dynamic(resolve) => {
                let mut child = context.child_context();
                let delay = Delay::from(resolve(store, &mut child));
                (delay, child.actions.take())
            }
        };
        Ok(resolved)
    }

    /// Replaces the pending slot with `transition`, due `delay_ms` after `scheduled_at`.
    pub fn set(&mut self, scheduled_at: i64, delay_ms: i64, transition: Transition) -> TimeoutId {
        self.last_id += 1;
        let id = TimeoutId(self.last_id);
        self.pending = Some(Pending {
            id,
            scheduled_at,
            delay_ms,
            transition,
        });
        id
    }

    /// Deadline of the pending transition.
    pub fn next_due(&self) -> Option<i64> {
        self.pending.as_ref().map(Pending::due_ms)
    }

    pub fn pending_transition(&self) -> Option<&Transition> {
        self.pending.as_ref().map(|pending| &pending.transition)
    }

    /// Removes and returns the pending transition if it is due at `now_ms`.
    pub fn take_due(&mut self, now_ms: i64) -> Option<Transition> {
        match &self.pending {
            Some(pending) if pending.due_ms() <= now_ms => self.pending.take().map(|pending| pending.transition),
            _ => None,
        }
    }
}
