//! Monitor context and the restricted child context handed to state handlers.
//!
//! A [`Context`] is the immutable configuration of one monitor: its names, the
//! ordered sequence of named states with their timeouts and handlers, the
//! activity filter settings and the tier switches. It is assembled through
//! [`ContextBuilder`], which also registers every action name so that
//! container writes can be typed.
//!
//! ## Usage
//!
//! ```rust
//! use idlewatch::libs::context::{Context, TimeoutSpec};
//!
//! let context = Context::builder("demo")
//!     .state("active", TimeoutSpec::After(0), |_store, _ctx| Ok(()))
//!     .state("inactive", TimeoutSpec::After(10_000), |_store, ctx| {
//!         let _log = ctx.log.enter();
//!         tracing::info!("user went quiet");
//!         Ok(())
//!     })
//!     .state("expired", TimeoutSpec::Pause, |_store, ctx| {
//!         ctx.actions.stop();
//!         Ok(())
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(context.initial_action_name(), "active");
//! assert_eq!(context.next_action_name("inactive"), Some("expired"));
//! ```

use super::activity::{ActivityState, Point};
use super::detection::{EventKind, Thresholds};
use super::store::{ActionRegistry, RegistryError, Store};
use super::tiers::TierOptions;
use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::Span;

/// Library name used in action types and log spans.
pub const LIB_NAME: &str = "idlewatch";

/// Action name for activity and detection bookkeeping writes.
pub const ACTIVITY_ACTION: &str = "activity";
pub const START_ACTION: &str = "start";
pub const STOP_ACTION: &str = "stop";
pub const RESET_ACTION: &str = "reset";

const LIB_ACTIONS: [&str; 4] = [ACTIVITY_ACTION, START_ACTION, STOP_ACTION, RESET_ACTION];

/// User logic run when a named state is entered.
pub type StateHandler = Arc<dyn Fn(&mut dyn Store, &mut ChildContext) -> Result<()> + Send + Sync>;

/// Lazily computed delay. `None` pauses the sequence.
///
/// Controls requested through the child context are applied once the state
/// being entered has run its handler.
pub type TimeoutFn = Arc<dyn Fn(&mut dyn Store, &mut ChildContext) -> Option<i64> + Send + Sync>;

/// Delay before a named state is entered.
#[derive(Clone)]
pub enum TimeoutSpec {
    /// Fixed delay in milliseconds; zero or negative enters immediately.
    After(i64),
    /// Enter the state paused and schedule nothing after it.
    Pause,
    /// Evaluated every time the state is scheduled.
    Dynamic(TimeoutFn),
}

impl TimeoutSpec {
    pub fn dynamic(f: impl Fn(&mut dyn Store, &mut ChildContext) -> Option<i64> + Send + Sync + 'static) -> Self {
        TimeoutSpec::Dynamic(Arc::new(f))
    }

    /// Maps a configured millisecond value, where `null` means pause.
    pub fn from_millis(timeout_ms: Option<i64>) -> Self {
        timeout_ms.map_or(TimeoutSpec::Pause, TimeoutSpec::After)
    }
}

impl fmt::Debug for TimeoutSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TimeoutSpec::After(ms) => write!(f, "After({}ms)", ms),
            TimeoutSpec::Pause => write!(f, "Pause"),
            TimeoutSpec::Dynamic(_) => write!(f, "Dynamic"),
        }
    }
}

/// A resolved [`TimeoutSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    After(i64),
    Pause,
}

impl Delay {
    pub fn is_pause(&self) -> bool {
        matches!(self, Delay::Pause)
    }
}

impl From<Option<i64>> for Delay {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Delay::Pause, Delay::After)
    }
}

/// Controls a state handler may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Re-enter the sequence at its first state.
    Start,
    /// Cancel the pending transition and stop detection.
    Stop,
    /// Stop, restore the initial activity fields, then start.
    Reset,
}

/// The whitelisted controls of a child context. Requests are applied by the
/// dispatcher once the handler returns.
#[derive(Debug, Default)]
pub struct ChildActions {
    requested: Vec<Control>,
}

impl ChildActions {
    pub fn start(&mut self) {
        self.requested.push(Control::Start);
    }

    pub fn stop(&mut self) {
        self.requested.push(Control::Stop);
    }

    pub fn reset(&mut self) {
        self.requested.push(Control::Reset);
    }

    pub fn requested(&self) -> &[Control] {
        &self.requested
    }

    pub(crate) fn take(&mut self) -> Vec<Control> {
        std::mem::take(&mut self.requested)
    }
}

/// Restricted context passed to state handlers and timeout functions.
#[derive(Debug)]
pub struct ChildContext {
    pub log: Span,
    pub lib_name: String,
    pub app_name: String,
    pub actions: ChildActions,
}

struct StateDefinition {
    timeout: TimeoutSpec,
    action: StateHandler,
}

/// Immutable configuration of one monitor.
pub struct Context {
    lib_name: String,
    app_name: String,
    action_names: Vec<String>,
    states: HashMap<String, StateDefinition>,
    active_events: Vec<EventKind>,
    thresholds: Thresholds,
    use_fast_store: bool,
    use_local_store: bool,
    initial_last_event: Point,
    registry: Arc<ActionRegistry>,
    log: Span,
}

impl Context {
    pub fn builder(app_name: &str) -> ContextBuilder {
        ContextBuilder::new(app_name)
    }

    pub fn lib_name(&self) -> &str {
        &self.lib_name
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// The named state sequence, in order.
    pub fn action_names(&self) -> &[String] {
        &self.action_names
    }

    pub fn initial_action_name(&self) -> &str {
        // The builder rejects empty sequences.
        &self.action_names[0]
    }

    /// The state following `action_name`, `None` when it is the last one.
    /// An unknown name yields the first state.
    pub fn next_action_name(&self, action_name: &str) -> Option<&str> {
        let next = self.action_names.iter().position(|name| name == action_name).map_or(0, |index| index + 1);
        self.action_names.get(next).map(String::as_str)
    }

    pub fn timeout_spec(&self, action_name: &str) -> Result<&TimeoutSpec, RegistryError> {
        self.definition(action_name).map(|definition| &definition.timeout)
    }

    pub fn action(&self, action_name: &str) -> Result<StateHandler, RegistryError> {
        self.definition(action_name).map(|definition| definition.action.clone())
    }

    fn definition(&self, action_name: &str) -> Result<&StateDefinition, RegistryError> {
        self.states
            .get(action_name)
            .ok_or_else(|| RegistryError::UnknownAction(action_name.to_string()))
    }

    pub fn active_events(&self) -> &[EventKind] {
        &self.active_events
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn registry(&self) -> Arc<ActionRegistry> {
        self.registry.clone()
    }

    pub fn tier_options(&self) -> TierOptions {
        TierOptions {
            use_fast_store: self.use_fast_store,
            use_local_store: self.use_local_store,
            initial_last_event: self.initial_last_event,
        }
    }

    /// The container slice a new monitor starts from.
    pub fn initial_state(&self, now_ms: i64) -> ActivityState {
        ActivityState::initial(now_ms, self.initial_last_event)
    }

    pub fn initial_last_event(&self) -> Point {
        self.initial_last_event
    }

    /// Builds the restricted context for handlers: same names and log, but
    /// only the whitelisted controls.
    pub fn child_context(&self) -> ChildContext {
        ChildContext {
            log: self.log.clone(),
            lib_name: self.lib_name.clone(),
            app_name: self.app_name.clone(),
            actions: ChildActions::default(),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Context")
            .field("lib_name", &self.lib_name)
            .field("app_name", &self.app_name)
            .field("action_names", &self.action_names)
            .field("active_events", &self.active_events)
            .field("thresholds", &self.thresholds)
            .field("use_fast_store", &self.use_fast_store)
            .field("use_local_store", &self.use_local_store)
            .finish()
    }
}

/// Assembles a [`Context`].
pub struct ContextBuilder {
    app_name: String,
    states: Vec<(String, StateDefinition)>,
    active_events: Vec<EventKind>,
    thresholds: Thresholds,
    use_fast_store: bool,
    use_local_store: bool,
    initial_last_event: Point,
}

impl ContextBuilder {
    fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            states: Vec::new(),
            active_events: EventKind::defaults(),
            thresholds: Thresholds::default(),
            use_fast_store: true,
            use_local_store: false,
            initial_last_event: Point::default(),
        }
    }

    /// Appends a named state to the sequence.
    pub fn state(
        mut self,
        name: &str,
        timeout: TimeoutSpec,
        action: impl Fn(&mut dyn Store, &mut ChildContext) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.states.push((
            name.to_string(),
            StateDefinition {
                timeout,
                action: Arc::new(action),
            },
        ));
        self
    }

    /// Appends a named state with an already shared handler.
    pub fn state_with_handler(mut self, name: &str, timeout: TimeoutSpec, action: StateHandler) -> Self {
        self.states.push((name.to_string(), StateDefinition { timeout, action }));
        self
    }

    pub fn active_events(mut self, active_events: Vec<EventKind>) -> Self {
        self.active_events = active_events;
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn use_fast_store(mut self, enabled: bool) -> Self {
        self.use_fast_store = enabled;
        self
    }

    pub fn use_local_store(mut self, enabled: bool) -> Self {
        self.use_local_store = enabled;
        self
    }

    pub fn initial_last_event(mut self, point: Point) -> Self {
        self.initial_last_event = point;
        self
    }

    pub fn build(self) -> Result<Context, RegistryError> {
        if self.states.is_empty() {
            return Err(RegistryError::EmptySequence);
        }

        let mut registry = ActionRegistry::new(LIB_NAME, &self.app_name);
        for name in LIB_ACTIONS {
            registry.register(name)?;
        }

        let mut action_names = Vec::with_capacity(self.states.len());
        let mut states = HashMap::with_capacity(self.states.len());
        for (name, definition) in self.states {
            registry.register(&name)?;
            action_names.push(name.clone());
            states.insert(name, definition);
        }

        let log = tracing::info_span!("idlewatch", lib = LIB_NAME, app = %self.app_name);
        Ok(Context {
            lib_name: LIB_NAME.to_string(),
            app_name: self.app_name,
            action_names,
            states,
            active_events: self.active_events,
            thresholds: self.thresholds,
            use_fast_store: self.use_fast_store,
            use_local_store: self.use_local_store,
            initial_last_event: self.initial_last_event,
            registry: Arc::new(registry),
            log,
        })
    }
}
