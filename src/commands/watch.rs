//! Foreground idle watcher.
//!
//! Builds the monitor from the configuration, captures OS input and announces
//! every state it enters until Ctrl+C.

use crate::db::local_storage::LocalStorage;
use crate::libs::clock::SystemClock;
use crate::libs::config::{Config, StateConfig};
use crate::libs::context::{ChildContext, StateHandler};
use crate::libs::dispatcher::Dispatcher;
use crate::libs::messages::Message;
use crate::libs::monitor::{spawn_input_listener, Monitor};
use crate::libs::store::Store;
use crate::libs::tiers::{KeyValueStore, MemoryStorage};
use crate::{msg_error, msg_info};
use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tokio::task::JoinError;

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Keep the last activity time in memory instead of the database
    #[arg(long)]
    memory: bool,
}

pub async fn cmd(args: WatchArgs) -> Result<()> {
    let monitor_config = Config::read()?.monitor.unwrap_or_default();
    let idle_state = monitor_config.states.last().map(|state| state.name.clone());
    let context = monitor_config.context(|state| announce(state, idle_state.as_deref()))?;

    let local: Box<dyn KeyValueStore> = if args.memory {
        Box::new(MemoryStorage::new())
    } else {
        Box::new(LocalStorage::new()?)
    };
    let dispatcher = Dispatcher::with_memory_store(context, Arc::new(SystemClock), Some(local));
    let monitor = Monitor::new(dispatcher);
    let handle = monitor.handle();

    msg_info!(Message::MonitorStarted {
        app_name: monitor_config.app_name.clone(),
        states: monitor_config.states.len(),
    });
    spawn_input_listener(handle.clone());
    let mut task = tokio::spawn(monitor.run());

    tokio::select! {
        result = &mut task => {
            report(result);
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => msg_info!(Message::WatcherReceivedCtrlC),
            Err(e) => msg_error!(Message::WatcherCtrlCListenFailed(e.to_string())),
        },
    }

    msg_info!(Message::MonitorShuttingDown);
    handle.shutdown();
    report(task.await);
    Ok(())
}

fn report(result: Result<Result<Dispatcher>, JoinError>) {
    match result {
        Ok(Ok(dispatcher)) => {
            tracing::debug!(state = ?dispatcher.state(), "final activity state");
            msg_info!(Message::MonitorExitedNormally);
        }
        Ok(Err(e)) => msg_error!(Message::MonitorError(e.to_string())),
        Err(e) => msg_error!(Message::MonitorTaskPanicked(e.to_string())),
    }
}

/// Handler printing the state that was entered.
fn announce(state: &StateConfig, idle_state: Option<&str>) -> StateHandler {
    let message = if idle_state == Some(state.name.as_str()) {
        Message::UserIdle(state.name.clone())
    } else if state.timeout_ms.is_none() {
        Message::StatePaused(state.name.clone())
    } else {
        Message::StateEntered(state.name.clone())
    };
    Arc::new(move |_store: &mut dyn Store, ctx: &mut ChildContext| -> Result<()> {
        let _entered = ctx.log.enter();
        msg_info!(&message);
        Ok(())
    })
}
