/// Every message the application shows to the user.
#[derive(Debug, Clone)]
pub enum Message {
    // === CONFIG MESSAGES ===
    ConfigSaved,
    ConfigModuleMonitor,
    ConfigModuleStates,
    ConfigStateAdded(String),

    // === PROMPTS ===
    PromptAppName,
    PromptStateName,
    PromptStateTimeout(String),
    PromptAddAnotherState,
    PromptMouseThreshold,
    PromptElapsedThreshold,
    PromptUseFastStore,
    PromptUseLocalStore,

    // === MONITOR MESSAGES ===
    MonitorStarted { app_name: String, states: usize },
    MonitorShuttingDown,
    MonitorExitedNormally,
    MonitorError(String),
    MonitorTaskPanicked(String),
    WatcherReceivedCtrlC,
    WatcherCtrlCListenFailed(String),

    // === STATE MESSAGES ===
    StateEntered(String),
    StatePaused(String),
    UserIdle(String),

    // === STATUS MESSAGES ===
    StatusStatesHeader,
    StatusActivityHeader,
    LastActive(String),
    NoActivityRecorded,

    // === ERROR MESSAGES ===
    ErrorInRdevListener(String),
    EmptyStateSequence,
}
