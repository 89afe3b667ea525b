//! Windows input injection via `SendInput`.
//!
//! Single source of truth for all mouse and keyboard operations the
//! computer tool performs. Mouse positions are absolute screen pixels;
//! conversion to the 0-65535 normalized range `SendInput` expects
//! happens here.

use super::{MouseButton, ScrollDirection};
use crate::keys::{Key, KeyCombo, Modifier};
use crate::AgentError;
use std::thread;
use std::time::Duration;
use tracing::debug;
use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, VkKeyScanW, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT,
    KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_HWHEEL,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL, MOUSEINPUT,
    VIRTUAL_KEY, VK_BACK, VK_CAPITAL, VK_CONTROL, VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE, VK_F1,
    VK_HOME, VK_INSERT, VK_LEFT, VK_LWIN, VK_MENU, VK_NEXT, VK_NUMLOCK, VK_PAUSE, VK_PRIOR,
    VK_RETURN, VK_RIGHT, VK_SHIFT, VK_SNAPSHOT, VK_SPACE, VK_TAB, VK_UP,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN,
};

const WHEEL_DELTA: i32 = 120;
/// Upper bound on wheel detents per scroll call; keeps the mouseData
/// multiply well inside i32 range.
const MAX_SCROLL_CLICKS: u32 = 100;
/// Delay between the two clicks of a double click.
const MULTI_CLICK_DELAY: Duration = Duration::from_millis(50);

fn mouse_input(dx: i32, dy: i32, mouse_data: i32, flags: u32) -> INPUT {
    use windows::Win32::UI::Input::KeyboardAndMouse::MOUSE_EVENT_FLAGS;
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: mouse_data,
                dwFlags: MOUSE_EVENT_FLAGS(flags),
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn key_input(vk: VIRTUAL_KEY, scan: u16, flags: u32) -> INPUT {
    use windows::Win32::UI::Input::KeyboardAndMouse::KEYBD_EVENT_FLAGS;
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: KEYBD_EVENT_FLAGS(flags),
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(inputs: &[INPUT]) -> Result<(), AgentError> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(AgentError::Input(format!(
            "SendInput injected {sent} of {} events",
            inputs.len()
        )));
    }
    Ok(())
}

/// Convert absolute pixels to the normalized 0-65535 space.
fn normalize(x: u32, y: u32) -> (i32, i32) {
    unsafe {
        let screen_width = GetSystemMetrics(SM_CXSCREEN) as f64;
        let screen_height = GetSystemMetrics(SM_CYSCREEN) as f64;
        (
            ((x as f64 * 65535.0) / screen_width.max(1.0)) as i32,
            ((y as f64 * 65535.0) / screen_height.max(1.0)) as i32,
        )
    }
}

/// Current cursor position in absolute screen pixels.
pub fn cursor_position() -> Result<(i32, i32), AgentError> {
    let mut pos = POINT { x: 0, y: 0 };
    unsafe {
        GetCursorPos(&mut pos).map_err(|e| AgentError::Input(format!("GetCursorPos: {e}")))?;
    }
    Ok((pos.x, pos.y))
}

/// Move the cursor to absolute screen coordinates.
pub fn mouse_move(x: u32, y: u32) -> Result<(), AgentError> {
    let (nx, ny) = normalize(x, y);
    send(&[mouse_input(
        nx,
        ny,
        0,
        (MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE).0,
    )])
}

fn button_flags(button: MouseButton) -> (u32, u32) {
    match button {
        MouseButton::Left => (MOUSEEVENTF_LEFTDOWN.0, MOUSEEVENTF_LEFTUP.0),
        MouseButton::Right => (MOUSEEVENTF_RIGHTDOWN.0, MOUSEEVENTF_RIGHTUP.0),
        MouseButton::Middle => (MOUSEEVENTF_MIDDLEDOWN.0, MOUSEEVENTF_MIDDLEUP.0),
    }
}

/// Click `count` times with the given button, optionally moving to
/// absolute screen coordinates first.
pub fn click(button: MouseButton, at: Option<(u32, u32)>, count: u32) -> Result<(), AgentError> {
    if let Some((x, y)) = at {
        mouse_move(x, y)?;
    }
    let (down, up) = button_flags(button);
    debug!("click button={button:?} at={at:?} count={count}");
    for i in 0..count {
        if i > 0 {
            thread::sleep(MULTI_CLICK_DELAY);
        }
        send(&[mouse_input(0, 0, 0, down), mouse_input(0, 0, 0, up)])?;
    }
    Ok(())
}

/// Press a mouse button down without releasing it.
pub fn mouse_down(button: MouseButton) -> Result<(), AgentError> {
    let (down, _) = button_flags(button);
    send(&[mouse_input(0, 0, 0, down)])
}

/// Release a previously pressed mouse button.
pub fn mouse_up(button: MouseButton) -> Result<(), AgentError> {
    let (_, up) = button_flags(button);
    send(&[mouse_input(0, 0, 0, up)])
}

/// Drag with the left button held from the current position to `(x, y)`.
pub fn drag_to(x: u32, y: u32) -> Result<(), AgentError> {
    mouse_down(MouseButton::Left)?;
    thread::sleep(MULTI_CLICK_DELAY);
    mouse_move(x, y)?;
    thread::sleep(MULTI_CLICK_DELAY);
    mouse_up(MouseButton::Left)
}

/// Scroll by `clicks` wheel detents in the given direction, capped at
/// [`MAX_SCROLL_CLICKS`].
pub fn scroll(direction: ScrollDirection, clicks: u32) -> Result<(), AgentError> {
    let delta = clicks.min(MAX_SCROLL_CLICKS) as i32 * WHEEL_DELTA;
    let (flags, data) = match direction {
        ScrollDirection::Up => (MOUSEEVENTF_WHEEL.0, delta),
        ScrollDirection::Down => (MOUSEEVENTF_WHEEL.0, -delta),
        ScrollDirection::Left => (MOUSEEVENTF_HWHEEL.0, -delta),
        ScrollDirection::Right => (MOUSEEVENTF_HWHEEL.0, delta),
    };
    send(&[mouse_input(0, 0, data, flags)])
}

fn modifier_vk(modifier: Modifier) -> VIRTUAL_KEY {
    match modifier {
        Modifier::Ctrl => VK_CONTROL,
        Modifier::Alt => VK_MENU,
        Modifier::Shift => VK_SHIFT,
        Modifier::Meta => VK_LWIN,
    }
}

/// Resolve a parsed key to a virtual-key code. Character keys go through
/// the current keyboard layout; an extra Shift press is added when the
/// layout requires it (e.g. uppercase or punctuation).
fn key_vk(key: Key) -> Result<(VIRTUAL_KEY, bool), AgentError> {
    let vk = match key {
        Key::Enter => VK_RETURN,
        Key::Tab => VK_TAB,
        Key::Escape => VK_ESCAPE,
        Key::Backspace => VK_BACK,
        Key::Delete => VK_DELETE,
        Key::Space => VK_SPACE,
        Key::Insert => VK_INSERT,
        Key::Home => VK_HOME,
        Key::End => VK_END,
        Key::PageUp => VK_PRIOR,
        Key::PageDown => VK_NEXT,
        Key::PrintScreen => VK_SNAPSHOT,
        Key::CapsLock => VK_CAPITAL,
        Key::NumLock => VK_NUMLOCK,
        Key::Pause => VK_PAUSE,
        Key::Up => VK_UP,
        Key::Down => VK_DOWN,
        Key::Left => VK_LEFT,
        Key::Right => VK_RIGHT,
        Key::Function(n) => VIRTUAL_KEY(VK_F1.0 + (n as u16) - 1),
        Key::Char(c) => {
            let mut buf = [0u16; 2];
            let unit = *c.encode_utf16(&mut buf).first().ok_or_else(|| {
                AgentError::Input(format!("cannot encode key character '{c}'"))
            })?;
            let scan = unsafe { VkKeyScanW(unit) };
            if scan == -1 {
                return Err(AgentError::Input(format!(
                    "character '{c}' has no key on the current layout"
                )));
            }
            let needs_shift = (scan >> 8) & 0x01 != 0;
            return Ok((VIRTUAL_KEY((scan & 0xFF) as u16), needs_shift));
        }
    };
    Ok((vk, false))
}

fn combo_vks(combo: &KeyCombo) -> Result<Vec<VIRTUAL_KEY>, AgentError> {
    let mut vks: Vec<VIRTUAL_KEY> = combo.modifiers.iter().map(|m| modifier_vk(*m)).collect();
    if let Some(key) = combo.key {
        let (vk, needs_shift) = key_vk(key)?;
        if needs_shift && !combo.modifiers.contains(&Modifier::Shift) {
            vks.push(VK_SHIFT);
        }
        vks.push(vk);
    }
    Ok(vks)
}

/// Press and release a key combination (modifiers down, key tap,
/// modifiers up in reverse order).
pub fn press_combo(combo: &KeyCombo) -> Result<(), AgentError> {
    let vks = combo_vks(combo)?;
    let mut inputs = Vec::with_capacity(vks.len() * 2);
    for vk in &vks {
        inputs.push(key_input(*vk, 0, 0));
    }
    for vk in vks.iter().rev() {
        inputs.push(key_input(*vk, 0, KEYEVENTF_KEYUP.0));
    }
    send(&inputs)
}

/// Hold a key combination down. Pair with [`combo_up`].
pub fn combo_down(combo: &KeyCombo) -> Result<(), AgentError> {
    let inputs: Vec<INPUT> = combo_vks(combo)?
        .into_iter()
        .map(|vk| key_input(vk, 0, 0))
        .collect();
    send(&inputs)
}

/// Release a previously held key combination.
pub fn combo_up(combo: &KeyCombo) -> Result<(), AgentError> {
    let inputs: Vec<INPUT> = combo_vks(combo)?
        .into_iter()
        .rev()
        .map(|vk| key_input(vk, 0, KEYEVENTF_KEYUP.0))
        .collect();
    send(&inputs)
}

/// Type literal text using unicode key events, independent of layout.
pub fn type_text(text: &str) -> Result<(), AgentError> {
    for unit in text.encode_utf16() {
        send(&[
            key_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE.0),
            key_input(VIRTUAL_KEY(0), unit, (KEYEVENTF_UNICODE | KEYEVENTF_KEYUP).0),
        ])?;
        // Pacing delay so slow message pumps keep up.
        thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}
