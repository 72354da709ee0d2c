//! Configuration file and setup wizard.
//!
//! The configuration is a JSON document (`config.json`) in the platform data
//! directory. A missing file reads as the defaults, so `idlewatch watch` works
//! without running `idlewatch init` first.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use idlewatch::libs::config::Config;
//!
//! let config = Config::read()?;
//! let monitor = config.monitor.unwrap_or_default();
//! println!("{} states configured", monitor.states.len());
//! # Ok::<(), anyhow::Error>(())
//! ```

use super::activity::Point;
use super::context::{Context, StateHandler, TimeoutSpec};
use super::data_storage::DataStorage;
use super::detection::{EventKind, Thresholds};
use crate::libs::messages::Message;
use crate::{msg_bail_anyhow, msg_print, msg_success};
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// One named state of the idle sequence.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StateConfig {
    pub name: String,
    /// Delay before the state is entered. `null` pauses the sequence there.
    pub timeout_ms: Option<i64>,
}

impl StateConfig {
    pub fn new(name: &str, timeout_ms: Option<i64>) -> Self {
        Self {
            name: name.to_string(),
            timeout_ms,
        }
    }
}

/// Idle monitor settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Application name, part of every action type.
    pub app_name: String,
    /// Input kinds that count as activity.
    pub active_events: Vec<EventKind>,
    /// The idle sequence. The first state is where activity returns to.
    pub states: Vec<StateConfig>,
    pub thresholds: Thresholds,
    pub use_fast_store: bool,
    pub use_local_store: bool,
    pub initial_last_event: Point,
}

impl Default for MonitorConfig {
    /// `active` right away, `inactive` after 10 s, `expired` 30 s later.
    fn default() -> Self {
        MonitorConfig {
            app_name: "desktop".to_string(),
            active_events: EventKind::defaults(),
            states: vec![
                StateConfig::new("active", Some(0)),
                StateConfig::new("inactive", Some(10_000)),
                StateConfig::new("expired", Some(30_000)),
            ],
            thresholds: Thresholds::default(),
            use_fast_store: true,
            use_local_store: true,
            initial_last_event: Point::default(),
        }
    }
}

impl MonitorConfig {
    /// Builds a monitor context, asking `handler_for` for each state's handler.
    pub fn context<F>(&self, mut handler_for: F) -> Result<Context>
    where
        F: FnMut(&StateConfig) -> StateHandler,
    {
        if self.states.is_empty() {
            msg_bail_anyhow!(Message::EmptyStateSequence);
        }
        let builder = self.states.iter().fold(Context::builder(&self.app_name), |builder, state| {
            builder.state_with_handler(&state.name, TimeoutSpec::from_millis(state.timeout_ms), handler_for(state))
        });
        let context = builder
            .active_events(self.active_events.clone())
            .thresholds(self.thresholds)
            .use_fast_store(self.use_fast_store)
            .use_local_store(self.use_local_store)
            .initial_last_event(self.initial_last_event)
            .build()?;
        Ok(context)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<MonitorConfig>,
}

impl Config {
    /// Reads the configuration file, or the defaults when there is none.
    pub fn read() -> Result<Config> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        if !config_file_path.exists() {
            return Ok(Config::default());
        }
        let config_str = fs::read_to_string(config_file_path)?;
        let config: Config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        let config_file = File::create(config_file_path)?;
        serde_json::to_writer_pretty(&config_file, &self)?;
        Ok(())
    }

    /// Interactive wizard prefilled from the current file.
    pub fn init() -> Result<Self> {
        let mut config = Self::read().unwrap_or_default();
        let default = config.monitor.clone().unwrap_or_default();
        let theme = ColorfulTheme::default();

        msg_print!(Message::ConfigModuleMonitor);
        let app_name: String = Input::with_theme(&theme)
            .with_prompt(Message::PromptAppName.to_string())
            .default(default.app_name.clone())
            .interact_text()?;
        let mouse: f64 = Input::with_theme(&theme)
            .with_prompt(Message::PromptMouseThreshold.to_string())
            .default(default.thresholds.mouse)
            .interact_text()?;
        let elapsed_ms: i64 = Input::with_theme(&theme)
            .with_prompt(Message::PromptElapsedThreshold.to_string())
            .default(default.thresholds.elapsed_ms)
            .interact_text()?;
        let use_fast_store = Confirm::with_theme(&theme)
            .with_prompt(Message::PromptUseFastStore.to_string())
            .default(default.use_fast_store)
            .interact()?;
        let use_local_store = Confirm::with_theme(&theme)
            .with_prompt(Message::PromptUseLocalStore.to_string())
            .default(default.use_local_store)
            .interact()?;

        msg_print!(Message::ConfigModuleStates, true);
        let mut states = Vec::with_capacity(default.states.len());
        for state in &default.states {
            let timeout_ms = prompt_timeout(&theme, &state.name, state.timeout_ms)?;
            states.push(StateConfig::new(&state.name, timeout_ms));
        }
        while Confirm::with_theme(&theme)
            .with_prompt(Message::PromptAddAnotherState.to_string())
            .default(false)
            .interact()?
        {
            let name: String = Input::with_theme(&theme)
                .with_prompt(Message::PromptStateName.to_string())
                .interact_text()?;
            let timeout_ms = prompt_timeout(&theme, &name, None)?;
            msg_success!(Message::ConfigStateAdded(name.clone()));
            states.push(StateConfig::new(&name, timeout_ms));
        }

        config.monitor = Some(MonitorConfig {
            app_name,
            states,
            thresholds: Thresholds { mouse, elapsed_ms },
            use_fast_store,
            use_local_store,
            ..default
        });
        Ok(config)
    }
}

fn prompt_timeout(theme: &ColorfulTheme, name: &str, current: Option<i64>) -> Result<Option<i64>> {
    let input: String = Input::with_theme(theme)
        .with_prompt(Message::PromptStateTimeout(name.to_string()).to_string())
        .default(current.map(|ms| ms.to_string()).unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    parse_timeout(&input)
}

/// Empty input means "pause here".
pub fn parse_timeout(input: &str) -> Result<Option<i64>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    Ok(Some(input.parse()?))
}
