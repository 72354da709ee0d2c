#[cfg(test)]
mod tests {
    use anyhow::Result;
    use idlewatch::libs::activity::Point;
    use idlewatch::libs::clock::ManualClock;
    use idlewatch::libs::context::{ChildContext, Context, ContextBuilder, Control, Delay, TimeoutSpec};
    use idlewatch::libs::detection::{ActivityEvent, EventKind, Thresholds};
    use idlewatch::libs::dispatcher::Dispatcher;
    use idlewatch::libs::store::{RegistryError, Store};
    use idlewatch::libs::tiers::MemoryStorage;
    use idlewatch::libs::timeout::Transition;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use test_context::{test_context, TestContext};

    /// Manual clock at t=0 and a log of entered states.
    struct DispatcherTestContext {
        clock: Arc<ManualClock>,
        entered: Arc<Mutex<Vec<String>>>,
    }

    impl TestContext for DispatcherTestContext {
        fn setup() -> Self {
            DispatcherTestContext {
                clock: Arc::new(ManualClock::new(0)),
                entered: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl DispatcherTestContext {
        fn record(&self, name: &str) -> impl Fn(&mut dyn Store, &mut ChildContext) -> Result<()> + Send + Sync + 'static {
            let entered = self.entered.clone();
            let name = name.to_string();
            move |_store: &mut dyn Store, _ctx: &mut ChildContext| -> Result<()> {
                entered.lock().push(name.clone());
                Ok(())
            }
        }

        /// Builder with one recording state per `(name, timeout)` pair.
        fn builder(&self, states: &[(&str, TimeoutSpec)]) -> ContextBuilder {
            states
                .iter()
                .fold(Context::builder("test"), |builder, (name, timeout)| builder.state(name, timeout.clone(), self.record(name)))
        }

        fn dispatcher(&self, builder: ContextBuilder) -> Dispatcher {
            Dispatcher::with_memory_store(builder.build().unwrap(), self.clock.clone(), None)
        }

        fn entered(&self) -> Vec<String> {
            self.entered.lock().clone()
        }

        fn advance(&self, dispatcher: &mut Dispatcher, ms: i64) -> bool {
            self.clock.advance(ms);
            dispatcher.tick().unwrap()
        }
    }

    fn three_states() -> Vec<(&'static str, TimeoutSpec)> {
        vec![
            ("s0", TimeoutSpec::After(0)),
            ("s1", TimeoutSpec::After(100)),
            ("s2", TimeoutSpec::After(200)),
        ]
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_sequence_reaches_idle(ctx: &mut DispatcherTestContext) {
        let mut dispatcher = ctx.dispatcher(ctx.builder(&three_states()));
        dispatcher.start().unwrap();
        assert_eq!(ctx.entered(), ["s0"]);
        assert_eq!(dispatcher.next_due(), Some(100));

        assert!(!ctx.advance(&mut dispatcher, 99));
        assert!(ctx.advance(&mut dispatcher, 1));
        assert_eq!(dispatcher.next_due(), Some(300));
        assert!(ctx.advance(&mut dispatcher, 200));

        let state = dispatcher.state();
        assert_eq!(ctx.entered(), ["s0", "s1", "s2"]);
        assert_eq!(state.action_name.as_deref(), Some("s2"));
        assert!(state.is_idle);
        assert!(!state.is_paused);
        assert_eq!(state.timeout_id, None);
        assert_eq!(dispatcher.next_due(), None);
        assert_eq!(dispatcher.remaining_ms(), 0);
        assert_eq!(dispatcher.next_action_name(), None);
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_newer_schedule_replaces_pending(ctx: &mut DispatcherTestContext) {
        let mut dispatcher = ctx.dispatcher(ctx.builder(&[
            ("s0", TimeoutSpec::After(100)),
            ("s1", TimeoutSpec::After(100)),
            ("s2", TimeoutSpec::After(1_000)),
        ]));
        let first = dispatcher.schedule("s0").unwrap();
        ctx.clock.advance(50);
        let second = dispatcher.schedule("s1").unwrap();
        assert!(first.is_some());
        assert_ne!(first, second);

        assert!(!ctx.advance(&mut dispatcher, 50));
        assert!(ctx.entered().is_empty());
        assert!(ctx.advance(&mut dispatcher, 50));
        assert_eq!(ctx.entered(), ["s1"]);
        assert_eq!(dispatcher.state().action_name.as_deref(), Some("s1"));
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_zero_delay_chain_runs_in_order(ctx: &mut DispatcherTestContext) {
        let mut dispatcher = ctx.dispatcher(ctx.builder(&[
            ("s0", TimeoutSpec::After(0)),
            ("s1", TimeoutSpec::After(0)),
            ("s2", TimeoutSpec::After(-5)),
            ("s3", TimeoutSpec::After(500)),
        ]));
        dispatcher.start().unwrap();
        assert_eq!(ctx.entered(), ["s0", "s1", "s2"]);
        assert_eq!(dispatcher.state().action_name.as_deref(), Some("s2"));
        assert_eq!(dispatcher.next_due(), Some(500));
        assert_eq!(dispatcher.pending_transition().map(|t| t.action_name.as_str()), Some("s3"));
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_pointer_moves_are_throttled(ctx: &mut DispatcherTestContext) {
        let builder = ctx
            .builder(&[("s0", TimeoutSpec::After(0)), ("s1", TimeoutSpec::After(10_000))])
            .thresholds(Thresholds {
                mouse: 5.0,
                elapsed_ms: 200,
            })
            .initial_last_event(Point::new(0.0, 0.0));
        let mut dispatcher = ctx.dispatcher(builder);
        dispatcher.start().unwrap();

        assert!(!dispatcher.on_activity(&ActivityEvent::mouse_move(0.0, 0.0)).unwrap());
        ctx.clock.advance(50);
        assert!(!dispatcher.on_activity(&ActivityEvent::mouse_move(3.0, 3.0)).unwrap());
        ctx.clock.advance(200);
        assert!(dispatcher.on_activity(&ActivityEvent::mouse_move(10.0, 10.0)).unwrap());

        let fast = dispatcher.stores().fast();
        assert_eq!(fast.last_active, 250);
        assert_eq!(fast.last_event, Point::new(10.0, 10.0));
        assert_eq!(dispatcher.state().last_event, Point::new(10.0, 10.0));
        assert_eq!(ctx.entered(), ["s0"]);
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_unsubscribed_events_are_ignored(ctx: &mut DispatcherTestContext) {
        let builder = ctx.builder(&three_states()).active_events(vec![EventKind::KeyDown]);
        let mut dispatcher = ctx.dispatcher(builder);
        dispatcher.start().unwrap();
        ctx.clock.advance(50);
        assert!(!dispatcher.on_activity(&ActivityEvent::new(EventKind::Wheel)).unwrap());
        assert!(dispatcher.on_activity(&ActivityEvent::new(EventKind::KeyDown)).unwrap());
        assert_eq!(dispatcher.stores().fast().last_active, 50);
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_activity_outside_first_state_restarts(ctx: &mut DispatcherTestContext) {
        let mut dispatcher = ctx.dispatcher(ctx.builder(&three_states()));
        dispatcher.start().unwrap();
        assert!(ctx.advance(&mut dispatcher, 100));
        assert_eq!(dispatcher.state().action_name.as_deref(), Some("s1"));

        ctx.clock.advance(50);
        assert!(dispatcher.on_activity(&ActivityEvent::new(EventKind::KeyDown)).unwrap());
        assert_eq!(ctx.entered(), ["s0", "s1", "s0"]);
        assert_eq!(dispatcher.state().action_name.as_deref(), Some("s0"));
        assert_eq!(dispatcher.next_due(), Some(250));
        assert!(dispatcher.is_detection_running());
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_pause_state_stops_detection_until_start(ctx: &mut DispatcherTestContext) {
        let mut dispatcher = ctx.dispatcher(ctx.builder(&[
            ("s0", TimeoutSpec::After(0)),
            ("s1", TimeoutSpec::After(100)),
            ("s2", TimeoutSpec::Pause),
        ]));
        dispatcher.start().unwrap();
        assert!(dispatcher.is_detection_running());

        assert!(ctx.advance(&mut dispatcher, 100));
        let state = dispatcher.state();
        assert_eq!(ctx.entered(), ["s0", "s1", "s2"]);
        assert_eq!(state.action_name.as_deref(), Some("s2"));
        assert!(state.is_paused);
        assert!(!dispatcher.is_detection_running());
        assert_eq!(dispatcher.next_due(), None);
        assert!(!dispatcher.on_activity(&ActivityEvent::new(EventKind::KeyDown)).unwrap());

        dispatcher.start().unwrap();
        let state = dispatcher.state();
        assert_eq!(state.action_name.as_deref(), Some("s0"));
        assert!(!state.is_paused);
        assert!(dispatcher.is_detection_running());
        assert_eq!(dispatcher.next_due(), Some(200));
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_executing_a_paused_state_halts_the_machine(ctx: &mut DispatcherTestContext) {
        let mut dispatcher = ctx.dispatcher(ctx.builder(&three_states()));
        dispatcher.start().unwrap();
        assert_eq!(dispatcher.next_due(), Some(100));

        dispatcher.execute(Transition::new("s2", Delay::Pause)).unwrap();
        let state = dispatcher.state();
        assert_eq!(ctx.entered(), ["s0", "s2"]);
        assert_eq!(state.action_name.as_deref(), Some("s2"));
        assert!(state.is_paused);
        assert!(state.is_idle);
        assert_eq!(state.timeout_id, None);
        assert_eq!(dispatcher.next_due(), None);
        assert!(!dispatcher.is_detection_running());
        assert!(!ctx.advance(&mut dispatcher, 1_000));
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_huge_delay_never_fires_early(ctx: &mut DispatcherTestContext) {
        ctx.clock.set(1_700_000_000_000);
        let mut dispatcher = ctx.dispatcher(ctx.builder(&[("s0", TimeoutSpec::After(0)), ("s1", TimeoutSpec::After(i64::MAX))]));
        dispatcher.start().unwrap();
        assert_eq!(dispatcher.next_due(), Some(i64::MAX));
        assert!(dispatcher.remaining_ms() > 0);
        assert!(!ctx.advance(&mut dispatcher, 1));
        assert_eq!(dispatcher.state().action_name.as_deref(), Some("s0"));
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_dynamic_timeout_can_stop_the_sequence(ctx: &mut DispatcherTestContext) {
        let builder = ctx.builder(&[
            ("s0", TimeoutSpec::After(0)),
            (
                "s1",
                TimeoutSpec::dynamic(|_store, child| {
                    child.actions.stop();
                    Some(100)
                }),
            ),
        ]);
        let mut dispatcher = ctx.dispatcher(builder);
        dispatcher.start().unwrap();

        let state = dispatcher.state();
        assert_eq!(ctx.entered(), ["s0"]);
        assert!(state.is_paused);
        assert_eq!(dispatcher.next_due(), None);
        assert!(!dispatcher.is_detection_running());
        assert!(!ctx.advance(&mut dispatcher, 1_000));
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_handler_can_stop_the_sequence(ctx: &mut DispatcherTestContext) {
        let entered = ctx.entered.clone();
        let builder = Context::builder("test")
            .state("s0", TimeoutSpec::After(0), ctx.record("s0"))
            .state("s1", TimeoutSpec::After(100), move |_store, child| {
                entered.lock().push("s1".to_string());
                child.actions.stop();
                Ok(())
            })
            .state("s2", TimeoutSpec::After(100), ctx.record("s2"));
        let mut dispatcher = ctx.dispatcher(builder);
        dispatcher.start().unwrap();
        assert!(ctx.advance(&mut dispatcher, 100));

        let state = dispatcher.state();
        assert!(state.is_paused);
        assert_eq!(state.timeout_id, None);
        assert_eq!(dispatcher.next_due(), None);
        assert!(!dispatcher.is_detection_running());
        assert!(!ctx.advance(&mut dispatcher, 1_000));
        assert_eq!(ctx.entered(), ["s0", "s1"]);
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_reset_restores_initial_activity(ctx: &mut DispatcherTestContext) {
        let mut dispatcher = ctx.dispatcher(ctx.builder(&three_states()));
        dispatcher.start().unwrap();
        ctx.clock.advance(2_000);
        dispatcher.on_activity(&ActivityEvent::mouse_move(400.0, 300.0)).unwrap();
        assert!(ctx.advance(&mut dispatcher, 100));

        dispatcher.apply(Control::Reset).unwrap();
        let state = dispatcher.state();
        assert_eq!(state.action_name.as_deref(), Some("s0"));
        assert_eq!(state.last_event, Point::default());
        assert_eq!(state.last_active, 2_100);
        assert!(!state.is_paused);
        assert!(dispatcher.is_detection_running());
        assert_eq!(dispatcher.next_due(), Some(2_200));
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_dynamic_timeout_is_resolved_when_scheduled(ctx: &mut DispatcherTestContext) {
        let builder = ctx.builder(&[
            ("s0", TimeoutSpec::After(0)),
            ("s1", TimeoutSpec::dynamic(|_store, child| (child.app_name == "test").then_some(42))),
        ]);
        let mut dispatcher = ctx.dispatcher(builder);
        assert_eq!(dispatcher.timeout_ms("s1").unwrap(), Delay::After(42));
        dispatcher.start().unwrap();
        assert_eq!(dispatcher.next_due(), Some(42));
        ctx.clock.advance(30);
        assert_eq!(dispatcher.remaining_ms(), 12);
        assert_eq!(dispatcher.next_action_name().as_deref(), Some("s1"));
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_unknown_state_is_a_configuration_error(ctx: &mut DispatcherTestContext) {
        let mut dispatcher = ctx.dispatcher(ctx.builder(&three_states()));
        let err = dispatcher.schedule("nope").unwrap_err();
        assert!(matches!(err.downcast_ref::<RegistryError>(), Some(RegistryError::UnknownAction(name)) if name == "nope"));
        assert_eq!(err.to_string(), "action definition for actionName nope must be configured");
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_local_tier_keeps_last_active(ctx: &mut DispatcherTestContext) {
        let context = ctx.builder(&three_states()).use_local_store(true).build().unwrap();
        let mut dispatcher = Dispatcher::with_memory_store(context, ctx.clock.clone(), Some(Box::new(MemoryStorage::new())));
        assert_eq!(dispatcher.stores().local().last_active, Some(0));
        dispatcher.start().unwrap();
        ctx.clock.advance(75);
        dispatcher.on_activity(&ActivityEvent::new(EventKind::MouseDown)).unwrap();
        assert_eq!(dispatcher.stores().local().last_active, Some(75));
    }

    #[test_context(DispatcherTestContext)]
    #[test]
    fn test_stop_twice_is_harmless(ctx: &mut DispatcherTestContext) {
        let mut dispatcher = ctx.dispatcher(ctx.builder(&three_states()));
        dispatcher.start().unwrap();
        dispatcher.stop().unwrap();
        dispatcher.stop().unwrap();
        assert!(dispatcher.state().is_paused);
        assert_eq!(dispatcher.clear(), None);
    }
}
