//! Idle state machine driver.
//!
//! The dispatcher walks the context's named state sequence. Entering a state
//! (a *transition*) schedules the following one, toggles activity detection on
//! the pause edge, records the new state through the tier accessor and runs
//! the user's handler for that state.
//!
//! ## Transitions
//!
//! ```text
//!   schedule(name) ──clear──▶ resolve delay ──┬── delay > 0 ──▶ pending slot ──tick──┐
//!                                             └── delay <= 0 or pause ───────────────┤
//!                                                                                    ▼
//!   ┌──────────────────────────────────── advance(transition) ◀──────────────────────┘
//!   │  next = following name
//!   │  not paused and next exists ─▶ plan(next): pending slot, or run next in this loop
//!   │  pause edge ─▶ stop detection, unpause edge ─▶ start detection
//!   │  set_state(name, {actionName, isIdle, isPaused, timeoutID})
//!   └─ handler(store, child context) ─▶ requested controls (start/stop/reset)
//! ```
//!
//! Zero-delay chains are walked iteratively inside [`Dispatcher::advance`],
//! never by recursion, and every path to a new deadline clears the previous
//! one first, so at most one transition is ever pending.
//!
//! The dispatcher is synchronous and owns no timers. Whoever drives it (the
//! async [`monitor`](super::monitor) loop, or a test with a manual clock)
//! sleeps until [`Dispatcher::next_due`] and then calls [`Dispatcher::tick`].

use super::activity::{ActivityPatch, ActivityState, TimeoutId};
use super::clock::Clock;
use super::context::{Context, Control, Delay, StateHandler, ACTIVITY_ACTION, RESET_ACTION, STOP_ACTION};
use super::detection::{ActivityDetector, ActivityEvent};
use super::store::{MemoryStore, Store};
use super::tiers::{KeyValueStore, StateTiers};
use super::timeout::{TimeoutScheduler, Transition};
use anyhow::Result;
use std::sync::Arc;

/// Outcome of scheduling a state.
enum Step {
    /// A deadline was set.
    Scheduled(TimeoutId),
    /// The state must be entered right away.
    Now(Transition),
}

pub struct Dispatcher {
    context: Arc<Context>,
    clock: Arc<dyn Clock>,
    stores: StateTiers,
    timeout: TimeoutScheduler,
    detection: ActivityDetector,
    /// Controls requested by dynamic timeout functions, applied with the
    /// entered state's handler controls.
    deferred: Vec<Control>,
}

impl Dispatcher {
    pub fn new(context: Context, clock: Arc<dyn Clock>, store: Box<dyn Store>, local: Option<Box<dyn KeyValueStore>>) -> Self {
        let stores = StateTiers::new(context.tier_options(), context.registry(), clock.clone(), store, local);
        let detection = ActivityDetector::new(context.active_events().to_vec(), context.thresholds());
        Self {
            context: Arc::new(context),
            clock,
            stores,
            timeout: TimeoutScheduler::new(),
            detection,
            deferred: Vec::new(),
        }
    }

    /// A dispatcher backed by an in-process container seeded with the
    /// context's initial state.
    pub fn with_memory_store(context: Context, clock: Arc<dyn Clock>, local: Option<Box<dyn KeyValueStore>>) -> Self {
        let store = MemoryStore::for_monitor(&context.registry(), &context.initial_state(clock.now_ms()));
        Self::new(context, clock, Box::new(store), local)
    }

    pub fn stores(&self) -> &StateTiers {
        &self.stores
    }

    pub fn is_detection_running(&self) -> bool {
        self.detection.is_running(&self.stores)
    }

    /// The authoritative activity state.
    pub fn state(&self) -> ActivityState {
        self.stores.redux()
    }

    /// Deadline of the pending transition, in clock milliseconds.
    pub fn next_due(&self) -> Option<i64> {
        self.timeout.next_due()
    }

    pub fn pending_transition(&self) -> Option<&Transition> {
        self.timeout.pending_transition()
    }

    /// The state following the current one.
    pub fn next_action_name(&self) -> Option<String> {
        let current = self.stores.redux().action_name?;
        self.context.next_action_name(&current).map(str::to_string)
    }

    /// Milliseconds until the pending transition fires, 0 when nothing is pending.
    pub fn remaining_ms(&self) -> i64 {
        self.timeout
            .next_due()
            .map_or(0, |due| due.saturating_sub(self.clock.now_ms()).max(0))
    }

    /// Resolves the delay configured for `action_name`.
    ///
    /// Controls requested by a dynamic timeout function are applied before
    /// returning.
    pub fn timeout_ms(&mut self, action_name: &str) -> Result<Delay> {
        let delay = self.resolve_delay(action_name)?;
        self.apply_deferred()?;
        Ok(delay)
    }

    fn resolve_delay(&mut self, action_name: &str) -> Result<Delay> {
        let (delay, controls) = self.timeout.timeout_ms(&self.context, self.stores.store_mut(), action_name)?;
        self.deferred.extend(controls);
        Ok(delay)
    }

    fn apply_deferred(&mut self) -> Result<()> {
        let controls = std::mem::take(&mut self.deferred);
        if controls.is_empty() {
            return Ok(());
        }
        self.timeout.clear();
        for control in controls {
            self.apply(control)?;
        }
        Ok(())
    }

    /// Cancels the pending transition.
    pub fn clear(&mut self) -> Option<TimeoutId> {
        self.timeout.clear()
    }

    /// Schedules entry into `action_name`, replacing any pending transition.
    ///
    /// Returns the new timeout handle, or `None` when the state was entered
    /// immediately (zero or negative delay, or a pause).
    pub fn schedule(&mut self, action_name: &str) -> Result<Option<TimeoutId>> {
        match self.plan(action_name)? {
            Step::Scheduled(id) => {
                self.apply_deferred()?;
                Ok(Some(id))
            }
            Step::Now(transition) => {
                self.advance(transition)?;
                Ok(None)
            }
        }
    }

    /// Enters the state described by `transition` right away.
    pub fn execute(&mut self, transition: Transition) -> Result<()> {
        self.advance(transition)
    }

    /// Fires the pending transition if its deadline has passed.
    pub fn tick(&mut self) -> Result<bool> {
        match self.timeout.take_due(self.clock.now_ms()) {
            Some(transition) => {
                self.advance(transition)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Feeds one raw input event through the filter.
    ///
    /// Returns `true` when the event counted as activity. Activity outside the
    /// initial state restarts the sequence instead of refreshing `lastActive`.
    pub fn on_activity(&mut self, event: &ActivityEvent) -> Result<bool> {
        if !self.detection.listens_to(event.kind) {
            return Ok(false);
        }
        let now = self.clock.now_ms();
        let fast = self.stores.fast();
        if !self.detection.should_activity_update(event, &fast, now) {
            return Ok(false);
        }
        if self.should_restart() {
            self.start()?;
            return Ok(true);
        }
        let last_event = event.position.unwrap_or(fast.last_event);
        self.stores.set_state(ACTIVITY_ACTION, ActivityPatch::activity(now, last_event))?;
        Ok(true)
    }

    fn should_restart(&self) -> bool {
        self.stores.redux().action_name.as_deref() != Some(self.context.initial_action_name())
    }

    /// Enters the first state, un-pausing and starting detection as needed.
    pub fn start(&mut self) -> Result<()> {
        self.timeout.clear();
        let was_paused = self.stores.redux().is_paused;
        if !was_paused && !self.is_detection_running() {
            self.detection.start(&mut self.stores)?;
        }
        let initial = self.context.initial_action_name().to_string();
        tracing::info!(action_name = %initial, "starting idle sequence");
        self.advance(Transition {
            action_name: initial,
            is_paused: false,
        })
    }

    /// Cancels the pending transition, stops detection and marks the machine paused.
    pub fn stop(&mut self) -> Result<()> {
        self.timeout.clear();
        if self.is_detection_running() {
            self.detection.stop(&mut self.stores)?;
        }
        tracing::info!("idle sequence stopped");
        self.stores.set_state(
            STOP_ACTION,
            ActivityPatch {
                is_paused: Some(true),
                timeout_id: Some(None),
                ..Default::default()
            },
        )?;
        Ok(())
    }

    /// Stops, restores the initial activity fields, then starts again.
    pub fn reset(&mut self) -> Result<()> {
        self.timeout.clear();
        if self.is_detection_running() {
            self.detection.stop(&mut self.stores)?;
        }
        self.stores.set_state(
            RESET_ACTION,
            ActivityPatch {
                is_idle: Some(false),
                is_paused: Some(false),
                last_active: Some(self.clock.now_ms()),
                last_event: Some(self.context.initial_last_event()),
                timeout_id: Some(None),
                ..Default::default()
            },
        )?;
        self.start()
    }

    /// Applies a control requested by a state handler.
    pub fn apply(&mut self, control: Control) -> Result<()> {
        match control {
            Control::Start => self.start(),
            Control::Stop => self.stop(),
            Control::Reset => self.reset(),
        }
    }

    fn plan(&mut self, action_name: &str) -> Result<Step> {
        self.timeout.clear();
        let delay = self.resolve_delay(action_name)?;
        tracing::debug!(action_name, ?delay, "schedule");
        let transition = Transition::new(action_name, delay);
        match delay {
            Delay::After(ms) if ms > 0 => Ok(Step::Scheduled(self.timeout.set(self.clock.now_ms(), ms, transition))),
            _ => Ok(Step::Now(transition)),
        }
    }

    fn advance(&mut self, transition: Transition) -> Result<()> {
        let mut current = transition;
        loop {
            // entering a state supersedes whatever was pending
            self.timeout.clear();
            let handler = self.context.action(&current.action_name)?;
            let next_action_name = self.context.next_action_name(&current.action_name).map(str::to_string);
            let was_paused = self.stores.redux().is_paused;

            let mut timeout_id = None;
            let mut follow_up = None;
            if let (false, Some(next)) = (current.is_paused, next_action_name.as_deref()) {
                match self.plan(next)? {
                    Step::Scheduled(id) => timeout_id = Some(id),
                    Step::Now(transition) => follow_up = Some(transition),
                }
            }

            if current.is_paused && !was_paused && self.is_detection_running() {
                tracing::info!(action_name = %current.action_name, "pausing activity detection");
                self.detection.stop(&mut self.stores)?;
            }
            if !current.is_paused && was_paused && !self.is_detection_running() {
                tracing::info!(action_name = %current.action_name, "unpausing activity detection");
                self.detection.start(&mut self.stores)?;
            }

            self.stores.set_state(
                &current.action_name,
                ActivityPatch {
                    action_name: Some(current.action_name.clone()),
                    is_idle: Some(next_action_name.is_none()),
                    is_paused: Some(current.is_paused),
                    timeout_id: Some(timeout_id),
                    ..Default::default()
                },
            )?;

            let controls = self.invoke(handler)?;
            if !controls.is_empty() || !self.deferred.is_empty() {
                self.deferred.extend(controls);
                return self.apply_deferred();
            }

            match follow_up {
                Some(transition) => current = transition,
                None => return Ok(()),
            }
        }
    }

    fn invoke(&mut self, handler: StateHandler) -> Result<Vec<Control>> {
        let mut child = self.context.child_context();
        handler(self.stores.store_mut(), &mut child)?;
        Ok(child.actions.take())
    }
}
