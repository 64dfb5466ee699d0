//! Surface State Machine
//!
//! ```text
//! Idle -> Opening -> Injecting -> Rendered -> Closing -> Idle
//!                        ^            |
//!                        +------------+  (in-surface navigation)
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceState {
    /// No surface is open
    #[default]
    Idle,
    /// Native open requested, waiting for the first page load
    Opening,
    /// Running the injection sequence for a page load
    Injecting,
    /// Page loaded and patched
    Rendered,
    /// Native close in progress
    Closing,
}

impl SurfaceState {
    pub fn can_transition_to(&self, target: SurfaceState) -> bool {
        use SurfaceState::*;

        match (self, target) {
            (Idle, Opening) => true,
            // Native open failed
            (Opening, Idle) => true,
            (Opening, Injecting) => true,
            (Injecting, Rendered) => true,
            // Page navigated again before the previous sequence finished
            (Injecting, Injecting) => true,
            (Rendered, Injecting) => true,
            (Opening | Injecting | Rendered, Closing) => true,
            (Closing, Idle) => true,
            (a, b) if *a == b => true,
            _ => false,
        }
    }

    /// A native surface exists that has to be released
    pub fn holds_surface(&self) -> bool {
        !matches!(self, SurfaceState::Idle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceState::Idle => "idle",
            SurfaceState::Opening => "opening",
            SurfaceState::Injecting => "injecting",
            SurfaceState::Rendered => "rendered",
            SurfaceState::Closing => "closing",
        }
    }
}

impl std::fmt::Display for SurfaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
