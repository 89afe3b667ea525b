//! Input injection stubs for non-Windows hosts.
//!
//! Every operation returns [`AgentError::PlatformUnsupported`]. The
//! screenshot path is platform-neutral and does not live here.

use super::{MouseButton, ScrollDirection};
use crate::keys::KeyCombo;
use crate::AgentError;

pub fn cursor_position() -> Result<(i32, i32), AgentError> {
    Err(AgentError::PlatformUnsupported)
}

pub fn mouse_move(_x: u32, _y: u32) -> Result<(), AgentError> {
    Err(AgentError::PlatformUnsupported)
}

pub fn click(
    _button: MouseButton,
    _at: Option<(u32, u32)>,
    _count: u32,
) -> Result<(), AgentError> {
    Err(AgentError::PlatformUnsupported)
}

pub fn mouse_down(_button: MouseButton) -> Result<(), AgentError> {
    Err(AgentError::PlatformUnsupported)
}

pub fn mouse_up(_button: MouseButton) -> Result<(), AgentError> {
    Err(AgentError::PlatformUnsupported)
}

pub fn drag_to(_x: u32, _y: u32) -> Result<(), AgentError> {
    Err(AgentError::PlatformUnsupported)
}

pub fn scroll(_direction: ScrollDirection, _clicks: u32) -> Result<(), AgentError> {
    Err(AgentError::PlatformUnsupported)
}

pub fn press_combo(_combo: &KeyCombo) -> Result<(), AgentError> {
    Err(AgentError::PlatformUnsupported)
}

pub fn combo_down(_combo: &KeyCombo) -> Result<(), AgentError> {
    Err(AgentError::PlatformUnsupported)
}

pub fn combo_up(_combo: &KeyCombo) -> Result<(), AgentError> {
    Err(AgentError::PlatformUnsupported)
}

pub fn type_text(_text: &str) -> Result<(), AgentError> {
    Err(AgentError::PlatformUnsupported)
}
