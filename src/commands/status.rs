use crate::db::local_storage::LocalStorage;
use crate::libs::config::Config;
use crate::libs::messages::Message;
use crate::libs::tiers::LocalState;
use crate::libs::view::{format_millis, View};
use crate::{msg_info, msg_print};
use anyhow::Result;

pub fn cmd() -> Result<()> {
    let monitor = Config::read()?.monitor.unwrap_or_default();

    msg_print!(Message::StatusStatesHeader, true);
    View::states(&monitor.states);

    let local = LocalState::read(&LocalStorage::new()?);
    match local.last_active {
        Some(_) => {
            msg_print!(Message::StatusActivityHeader, true);
            View::activity(&local);
            msg_info!(Message::LastActive(format_millis(local.last_active)));
        }
        None => msg_info!(Message::NoActivityRecorded),
    }
    Ok(())
}
