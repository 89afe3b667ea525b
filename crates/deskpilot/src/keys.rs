//! Key combination parsing.
//!
//! The remote model sends keys in a loose textual format ("enter",
//! "ctrl+a", "Meta+Shift+T", "Return"). This module normalizes them into
//! a [`KeyCombo`] that the platform backends can inject.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Escape,
    Backspace,
    Delete,
    Space,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    PrintScreen,
    CapsLock,
    NumLock,
    Pause,
    Up,
    Down,
    Left,
    Right,
    /// F1..F24
    Function(u8),
    /// A printable character (letters are lowercased during parsing).
    Char(char),
}

/// A normalized key press: zero or more modifiers plus an optional main
/// key. `key == None` means the combination is modifiers only (used by
/// `hold_key` with e.g. "alt").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifiers: Vec<Modifier>,
    pub key: Option<Key>,
}

/// Parse a key combination like "enter", "ctrl+a" or "Meta+Shift+T".
///
/// Only the last part may be a non-modifier key; a single printable
/// character is accepted there as well.
pub fn parse_key_combo(spec: &str) -> Result<KeyCombo, String> {
    let parts: Vec<&str> = spec.split('+').collect();
    let mut modifiers = Vec::new();
    let mut key = None;

    for (i, part) in parts.iter().enumerate() {
        let lower = part.trim().to_lowercase();
        let is_last = i == parts.len() - 1;

        if let Some(modifier) = parse_modifier(&lower) {
            modifiers.push(modifier);
            continue;
        }

        if !is_last {
            return Err(format!(
                "Key '{part}' in '{spec}' must be the last part of the combination"
            ));
        }

        key = Some(parse_key(&lower, spec)?);
    }

    if modifiers.is_empty() && key.is_none() {
        return Err(format!("Empty key combination: '{spec}'"));
    }
    Ok(KeyCombo { modifiers, key })
}

fn parse_modifier(lower: &str) -> Option<Modifier> {
    match lower {
        "control" | "ctrl" => Some(Modifier::Ctrl),
        "alt" | "option" => Some(Modifier::Alt),
        "shift" => Some(Modifier::Shift),
        "meta" | "cmd" | "command" | "win" | "windows" | "super" => Some(Modifier::Meta),
        _ => None,
    }
}

fn parse_key(lower: &str, spec: &str) -> Result<Key, String> {
    let key = match lower {
        "enter" | "return" => Key::Enter,
        "tab" => Key::Tab,
        "escape" | "esc" => Key::Escape,
        "backspace" | "back" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "space" => Key::Space,
        "insert" | "ins" => Key::Insert,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "page_up" | "pgup" => Key::PageUp,
        "pagedown" | "page_down" | "pgdn" => Key::PageDown,
        "printscreen" | "prtsc" => Key::PrintScreen,
        "capslock" | "caps" => Key::CapsLock,
        "numlock" => Key::NumLock,
        "pause" => Key::Pause,
        "up" | "arrowup" => Key::Up,
        "down" | "arrowdown" => Key::Down,
        "left" | "arrowleft" => Key::Left,
        "right" | "arrowright" => Key::Right,

        // Function keys f1-f24
        s if s.starts_with('f') && s.len() >= 2 && s.len() <= 3 => {
            match s[1..].parse::<u8>() {
                Ok(n) if (1..=24).contains(&n) => Key::Function(n),
                _ => {
                    return Err(format!(
                        "Invalid function key '{s}' in '{spec}'. Use f1-f24."
                    ))
                }
            }
        }

        s if s.chars().count() == 1 => Key::Char(s.chars().next().unwrap()),

        unknown => {
            return Err(format!(
                "Unknown key '{unknown}' in combination '{spec}'. Valid: enter, tab, escape, \
                 backspace, delete, space, up/down/left/right, home, end, pageup, pagedown, \
                 f1-f24, or modifiers (ctrl, alt, shift, meta) with letters."
            ));
        }
    };
    Ok(key)
}
