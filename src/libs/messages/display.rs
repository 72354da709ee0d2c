//! Display text for [`Message`].

use super::types::Message;
use std::fmt;

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            // === CONFIG MESSAGES ===
            Message::ConfigSaved => "Configuration saved successfully".to_string(),
            Message::ConfigModuleMonitor => "Monitor settings".to_string(),
            Message::ConfigModuleStates => "Idle states, in the order they are entered".to_string(),
            Message::ConfigStateAdded(name) => format!("State '{}' added", name),

            // === PROMPTS ===
            Message::PromptAppName => "Application name".to_string(),
            Message::PromptStateName => "State name".to_string(),
            Message::PromptStateTimeout(name) => format!("Delay before '{}' in ms (empty pauses the sequence)", name),
            Message::PromptAddAnotherState => "Add another state?".to_string(),
            Message::PromptMouseThreshold => "Minimum pointer movement in pixels".to_string(),
            Message::PromptElapsedThreshold => "Minimum time between pointer updates in ms".to_string(),
            Message::PromptUseFastStore => "Keep high-frequency fields in memory?".to_string(),
            Message::PromptUseLocalStore => "Persist last activity time?".to_string(),

            // === MONITOR MESSAGES ===
            Message::MonitorStarted { app_name, states } => {
                format!("Watching activity for '{}' across {} states", app_name, states)
            }
            Message::MonitorShuttingDown => "Shutting down monitor...".to_string(),
            Message::MonitorExitedNormally => "Monitor exited normally".to_string(),
            Message::MonitorError(e) => format!("Monitor error: {}", e),
            Message::MonitorTaskPanicked(e) => format!("Monitor task panicked: {}", e),
            Message::WatcherReceivedCtrlC => "Received Ctrl+C, shutting down...".to_string(),
            Message::WatcherCtrlCListenFailed(e) => format!("Failed to listen for Ctrl+C: {}", e),

            // === STATE MESSAGES ===
            Message::StateEntered(name) => format!("Entered state '{}'", name),
            Message::StatePaused(name) => format!("Sequence paused in state '{}'", name),
            Message::UserIdle(name) => format!("User is idle ('{}')", name),

            // === STATUS MESSAGES ===
            Message::StatusStatesHeader => "Configured states".to_string(),
            Message::StatusActivityHeader => "Persisted activity".to_string(),
            Message::LastActive(at) => format!("Last active at {}", at),
            Message::NoActivityRecorded => "No activity recorded yet".to_string(),

            // === ERROR MESSAGES ===
            Message::ErrorInRdevListener(e) => format!("Error in rdev listener: {}. Retrying in 1 second...", e),
            Message::EmptyStateSequence => "At least one idle state must be configured".to_string(),
        };
        write!(f, "{}", s)
    }
}
