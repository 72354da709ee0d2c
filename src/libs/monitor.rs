//! Async runtime loop around the [`Dispatcher`].
//!
//! The dispatcher never sleeps on its own. [`Monitor::run`] waits on whichever
//! comes first: the next command (an input event, a control or shutdown) or
//! the deadline of the pending transition, and feeds it to the dispatcher.
//!
//! ```text
//!  rdev thread ──ActivityEvent──┐
//!  CLI / handlers ──Control─────┼──▶ mpsc ──▶ Monitor::run ──▶ Dispatcher
//!  Ctrl+C ──Shutdown────────────┘                 ▲
//!                                  sleep(next_due)┘
//! ```

use super::context::Control;
use super::detection::{ActivityEvent, EventKind};
use super::dispatcher::Dispatcher;
use crate::libs::messages::Message;
use crate::msg_error;
use anyhow::Result;
use rdev::{listen, Event, EventType};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Everything the run loop reacts to besides its own timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorCommand {
    Activity(ActivityEvent),
    Control(Control),
    Shutdown,
}

/// Cloneable sender side of a running [`Monitor`].
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    sender: UnboundedSender<MonitorCommand>,
}

impl MonitorHandle {
    /// Returns `false` once the monitor has stopped.
    pub fn activity(&self, event: ActivityEvent) -> bool {
        self.sender.send(MonitorCommand::Activity(event)).is_ok()
    }

    pub fn control(&self, control: Control) -> bool {
        self.sender.send(MonitorCommand::Control(control)).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.sender.send(MonitorCommand::Shutdown).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

pub struct Monitor {
    dispatcher: Dispatcher,
    sender: UnboundedSender<MonitorCommand>,
    receiver: UnboundedReceiver<MonitorCommand>,
}

impl Monitor {
    pub fn new(dispatcher: Dispatcher) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            dispatcher,
            sender,
            receiver,
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Starts the sequence and drives it until shutdown, then stops it and
    /// hands the dispatcher back.
    pub async fn run(mut self) -> Result<Dispatcher> {
        drop(self.sender);
        self.dispatcher.start()?;

        loop {
            let pending = self.dispatcher.next_due().is_some();
            let wait = Duration::from_millis(self.dispatcher.remaining_ms() as u64);

            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(MonitorCommand::Activity(event)) => {
                        self.dispatcher.on_activity(&event)?;
                    }
                    Some(MonitorCommand::Control(control)) => {
                        tracing::debug!(?control, "control requested");
                        self.dispatcher.apply(control)?;
                    }
                    Some(MonitorCommand::Shutdown) | None => break,
                },
                _ = tokio::time::sleep(wait), if pending => {
                    self.dispatcher.tick()?;
                }
            }
        }

        if !self.dispatcher.state().is_paused {
            self.dispatcher.stop()?;
        }
        Ok(self.dispatcher)
    }
}

/// Maps a raw OS input event onto an activity event.
pub fn activity_event(event_type: &EventType) -> Option<ActivityEvent> {
    match event_type {
        EventType::MouseMove { x, y } => Some(ActivityEvent::mouse_move(*x, *y)),
        EventType::KeyPress(_) => Some(ActivityEvent::new(EventKind::KeyDown)),
        EventType::ButtonPress(_) => Some(ActivityEvent::new(EventKind::MouseDown)),
        EventType::Wheel { .. } => Some(ActivityEvent::new(EventKind::Wheel)),
        _ => None,
    }
}

/// Spawns the global input listener thread.
///
/// `rdev::listen` blocks for the life of the process; on error the listener
/// is restarted after one second.
pub fn spawn_input_listener(handle: MonitorHandle) {
    std::thread::spawn(move || loop {
        let sender = handle.clone();
        let result = listen(move |event: Event| {
            if let Some(activity) = activity_event(&event.event_type) {
                sender.activity(activity);
            }
        });
        match result {
            Ok(()) => break,
            Err(e) => {
                msg_error!(Message::ErrorInRdevListener(format!("{:?}", e)));
                if handle.is_closed() {
                    break;
                }
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    });
}
