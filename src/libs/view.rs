use super::config::StateConfig;
use super::tiers::LocalState;
use chrono::{Local, TimeZone};
use prettytable::{row, Table};

pub struct View {}

impl View {
    /// The configured idle sequence, with the delay before each state.
    pub fn states(states: &[StateConfig]) {
        let mut table = Table::new();

        table.add_row(row!["#", "STATE", "DELAY", "NEXT"]);
        for (index, state) in states.iter().enumerate() {
            let delay = state.timeout_ms.map_or("pause".to_string(), |ms| format!("{} ms", ms));
            let next = states.get(index + 1).map_or("(idle)", |next| next.name.as_str());
            table.add_row(row![index + 1, state.name, delay, next]);
        }
        table.printstd();
    }

    /// Persisted activity fields.
    pub fn activity(local: &LocalState) {
        let mut table = Table::new();

        table.add_row(row!["FIELD", "VALUE"]);
        table.add_row(row!["lastActive", format_millis(local.last_active)]);
        table.printstd();
    }
}

/// Renders epoch milliseconds as local time.
pub fn format_millis(millis: Option<i64>) -> String {
    millis
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .map_or("-".to_string(), |at| at.format("%Y-%m-%d %H:%M:%S").to_string())
}
