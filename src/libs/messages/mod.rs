//! User-facing message catalogue.
//!
//! Every string the CLI prints lives in [`Message`], rendered through its
//! `Display` impl in [`display`]. The `msg_*` macros in [`macros`] decide
//! whether a message goes to the terminal or to `tracing`.

pub mod display;
pub mod macros;
pub mod types;

pub use types::Message;
