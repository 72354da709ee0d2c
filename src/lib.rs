//! # Idlewatch - idle detection through a sequence of named states
//!
//! Watches user input and walks a configurable sequence of states
//! (`active`, `inactive`, `expired` by default). Activity resets the sequence;
//! silence advances it until the last, idle, state is reached.
//!
//! ## Features
//!
//! - **State machine**: single pending transition, zero-delay chains, pause states
//! - **Tiered state**: container, in-memory fast tier and a persisted local tier
//! - **Activity filter**: pointer moves throttled by distance and elapsed time
//! - **CLI**: `init`, `watch` and `status` commands
//!
//! ## Usage
//!
//! ```rust,no_run
//! use idlewatch::commands::Cli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Cli::menu().await
//! }
//! ```

pub mod commands;
pub mod db;
pub mod libs;
