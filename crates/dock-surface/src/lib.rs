//! Dock Surface Lifecycle
//!
//! Owns the single native browsing surface:
//! - Open/close with cleanup-then-reopen when a new app takes over
//! - Listeners detached before every open and close, never duplicated
//! - Ordered, delay-gated injection after each page load
//! - Download messages from the page forwarded to the download engine

mod capability;
mod controller;
mod error;
mod headless;
mod listeners;
mod message;
mod native;
mod state;

pub use capability::{ChromeOptions, Listener, ListenerId, Surface, SurfaceEvent, SurfaceEventKind};
pub use controller::{DownloadSink, OpenResult, SurfaceController};
pub use error::SurfaceError;
pub use headless::HeadlessSurface;
pub use listeners::ListenerSet;
pub use message::PageMessage;
pub use native::{open_native_app, NativeAppLink, NativeLaunch, UnsupportedLauncher, UriLauncher};
pub use state::SurfaceState;

pub type Result<T> = std::result::Result<T, SurfaceError>;
