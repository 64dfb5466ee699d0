//! Dock Storage Layer
//!
//! SQLite persistence sink for app visit history. The shell only ever writes
//! here fire-and-forget; reads back are for history listings.

mod database;
mod error;
mod history;
mod migrations;

pub use database::Database;
pub use error::StorageError;
pub use history::{HistoryEntry, HistoryRepository};

pub type Result<T> = std::result::Result<T, StorageError>;
