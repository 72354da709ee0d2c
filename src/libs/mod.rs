//! Core library modules.
//!
//! - **State machine**: [`activity`], [`context`], [`timeout`], [`detection`], [`dispatcher`]
//! - **State storage**: [`store`], [`tiers`], [`clock`]
//! - **Runtime**: [`monitor`]
//! - **Application**: [`config`], [`data_storage`], [`messages`], [`view`]
//!
//! ## Usage
//!
//! ```rust
//! use idlewatch::libs::clock::ManualClock;
//! use idlewatch::libs::context::{Context, TimeoutSpec};
//! use idlewatch::libs::dispatcher::Dispatcher;
//! use std::sync::Arc;
//!
//! let context = Context::builder("demo")
//!     .state("active", TimeoutSpec::After(0), |_, _| Ok(()))
//!     .state("idle", TimeoutSpec::After(1_000), |_, _| Ok(()))
//!     .build()?;
//! let clock = Arc::new(ManualClock::new(0));
//! let mut dispatcher = Dispatcher::with_memory_store(context, clock.clone(), None);
//! dispatcher.start()?;
//! clock.advance(1_000);
//! dispatcher.tick()?;
//! assert!(dispatcher.state().is_idle);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod activity;
pub mod clock;
pub mod config;
pub mod context;
pub mod data_storage;
pub mod detection;
pub mod dispatcher;
pub mod messages;
pub mod monitor;
pub mod store;
pub mod tiers;
pub mod timeout;
pub mod view;
