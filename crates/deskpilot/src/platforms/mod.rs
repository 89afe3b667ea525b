//! Platform seam for input injection.
//!
//! The agent targets Windows desktops; other hosts get stubs that return
//! [`crate::AgentError::PlatformUnsupported`] so the rest of the crate
//! (tools, agent loop, server) stays buildable and testable anywhere.

use serde::{Deserialize, Serialize};

#[cfg(target_os = "windows")]
pub mod windows;
#[cfg(target_os = "windows")]
pub use windows as native;

#[cfg(not(target_os = "windows"))]
pub mod unsupported;
#[cfg(not(target_os = "windows"))]
pub use unsupported as native;

/// Mouse button for click / press / release operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Scroll direction for the scroll action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}
