//! SQLite persistence.
//!
//! [`db::Db`] opens the application database; [`local_storage::LocalStorage`]
//! is the persisted tier of the activity state.

pub mod db;
pub mod local_storage;
