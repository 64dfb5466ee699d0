//! Dock Session Management
//!
//! The app switcher:
//! - At most `capacity` resident sessions, fixed by device class
//! - At most one active session, rendered in the single surface
//! - Least-recently-used background session evicted to admit a new one
//! - Owns intent only; rendering goes through the surface controller

mod app;
mod error;
mod history;
mod manager;
mod session;

pub use app::{AppDescriptor, DeviceClass};
pub use error::SessionError;
pub use history::{HistorySink, NoHistory};
pub use manager::SessionManager;
pub use session::Session;

pub type Result<T> = std::result::Result<T, SessionError>;
