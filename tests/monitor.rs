#[cfg(test)]
mod tests {
    use anyhow::Result;
    use idlewatch::libs::clock::SystemClock;
    use idlewatch::libs::context::{ChildContext, Context, Control, TimeoutSpec};
    use idlewatch::libs::detection::{ActivityEvent, EventKind};
    use idlewatch::libs::dispatcher::Dispatcher;
    use idlewatch::libs::monitor::{Monitor, MonitorHandle};
    use idlewatch::libs::store::Store;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use test_context::{test_context, AsyncTestContext};
    use tokio::task::JoinHandle;
    use tokio::time::{sleep, Duration};

    /// A monitor running on the system clock with short delays: `a` at once,
    /// `b` after 30 ms, `c` 30 ms later.
    struct MonitorTestContext {
        entered: Arc<Mutex<Vec<String>>>,
        handle: MonitorHandle,
        task: Option<JoinHandle<Result<Dispatcher>>>,
    }

    impl AsyncTestContext for MonitorTestContext {
        async fn setup() -> Self {
            let entered = Arc::new(Mutex::new(Vec::new()));
            let mut builder = Context::builder("monitor-test");
            for (name, delay) in [("a", 0), ("b", 30), ("c", 30)] {
                let entered = entered.clone();
                builder = builder.state(name, TimeoutSpec::After(delay), move |_store: &mut dyn Store, _ctx: &mut ChildContext| {
                    entered.lock().push(name.to_string());
                    Ok(())
                });
            }
            let dispatcher = Dispatcher::with_memory_store(builder.build().unwrap(), Arc::new(SystemClock), None);
            let monitor = Monitor::new(dispatcher);
            let handle = monitor.handle();
            let task = Some(tokio::spawn(monitor.run()));
            MonitorTestContext { entered, handle, task }
        }
    }

    impl MonitorTestContext {
        async fn finish(&mut self) -> Dispatcher {
            assert!(self.handle.shutdown());
            self.task.take().unwrap().await.unwrap().unwrap()
        }

        fn entered(&self) -> Vec<String> {
            self.entered.lock().clone()
        }
    }

    #[test_context(MonitorTestContext)]
    #[tokio::test]
    async fn test_sequence_advances_on_its_own(ctx: &mut MonitorTestContext) {
        sleep(Duration::from_millis(250)).await;
        assert_eq!(ctx.entered(), ["a", "b", "c"]);

        let dispatcher = ctx.finish().await;
        let state = dispatcher.state();
        assert!(state.is_idle);
        assert!(state.is_paused);
        assert!(!dispatcher.is_detection_running());
    }

    #[test_context(MonitorTestContext)]
    #[tokio::test]
    async fn test_activity_restarts_an_idle_sequence(ctx: &mut MonitorTestContext) {
        sleep(Duration::from_millis(250)).await;
        assert!(ctx.handle.activity(ActivityEvent::new(EventKind::KeyDown)));
        sleep(Duration::from_millis(10)).await;

        let entered = ctx.entered();
        assert_eq!(entered[..4], ["a", "b", "c", "a"]);
        ctx.finish().await;
    }

    #[test_context(MonitorTestContext)]
    #[tokio::test]
    async fn test_stop_control_cancels_pending_transition(ctx: &mut MonitorTestContext) {
        assert!(ctx.handle.control(Control::Stop));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(ctx.entered(), ["a"]);

        let dispatcher = ctx.finish().await;
        assert!(dispatcher.state().is_paused);
        assert_eq!(dispatcher.next_due(), None);
    }
}
