//! Global capture hotkey, backed by `rdev`.
//!
//! A hotkey is written `Mod+Mod+Key`, e.g. `Ctrl+Shift+O`.  Matching is
//! exact on modifiers: `Ctrl+O` does not fire while Shift is also held.
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use screen_to_text::hotkey::{Hotkey, HotkeyListener};
//!
//! let (tx, mut rx) = mpsc::channel(16);
//! let hotkey: Hotkey = "Ctrl+Shift+O".parse().unwrap();
//! let _listener = HotkeyListener::start(hotkey, tx).unwrap();
//! // while let Some(ev) = rx.recv().await { ... }
//! ```

pub mod listener;

pub use listener::{HotkeyListener, HotkeyMatcher};

use std::fmt;
use std::str::FromStr;

use rdev::Key;
use thiserror::Error;

/// Events emitted by the listener thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The capture combination was pressed.
    Capture,
}

#[derive(Debug, Error)]
pub enum HotkeyError {
    #[error("hotkey is empty")]
    Empty,

    #[error("unknown key {0:?}")]
    UnknownKey(String),

    #[error("hotkey {0:?} has no non-modifier key")]
    MissingKey(String),

    #[error("cannot start hotkey listener thread: {0}")]
    Spawn(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Modifiers
// ---------------------------------------------------------------------------

/// A set of held modifier keys.  Left and right variants are not told apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Which modifier flag `key` controls, if it is a modifier.
    fn slot(&mut self, key: Key) -> Option<&mut bool> {
        match key {
            Key::ControlLeft | Key::ControlRight => Some(&mut self.ctrl),
            Key::ShiftLeft | Key::ShiftRight => Some(&mut self.shift),
            Key::Alt | Key::AltGr => Some(&mut self.alt),
            Key::MetaLeft | Key::MetaRight => Some(&mut self.meta),
            _ => None,
        }
    }

    /// Record a press or release.  Returns `false` for non-modifier keys.
    pub fn update(&mut self, key: Key, pressed: bool) -> bool {
        match self.slot(key) {
            Some(flag) => {
                *flag = pressed;
                true
            }
            None => false,
        }
    }

    fn set_by_name(&mut self, name: &str) -> bool {
        let flag = match name {
            "ctrl" | "control" => &mut self.ctrl,
            "shift" => &mut self.shift,
            "alt" | "option" => &mut self.alt,
            "meta" | "super" | "cmd" | "win" => &mut self.meta,
            _ => return false,
        };
        *flag = true;
        true
    }
}

// ---------------------------------------------------------------------------
// Hotkey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hotkey {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl FromStr for Hotkey {
    type Err = HotkeyError;

    /// ```
    /// use screen_to_text::hotkey::Hotkey;
    ///
    /// let hk: Hotkey = "ctrl+shift+o".parse().unwrap();
    /// assert_eq!(hk.key, rdev::Key::KeyO);
    /// assert!(hk.modifiers.ctrl && hk.modifiers.shift && !hk.modifiers.alt);
    ///
    /// assert!("Ctrl+Shift".parse::<Hotkey>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(HotkeyError::Empty);
        }

        let mut modifiers = Modifiers::default();
        let mut key = None;
        for part in s.split('+').map(str::trim) {
            let lower = part.to_ascii_lowercase();
            if modifiers.set_by_name(&lower) {
                continue;
            }
            match (key, parse_key(&lower)) {
                (None, Some(k)) => key = Some(k),
                _ => return Err(HotkeyError::UnknownKey(part.to_string())),
            }
        }

        let key = key.ok_or_else(|| HotkeyError::MissingKey(s.to_string()))?;
        Ok(Self { key, modifiers })
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        for (held, name) in [(m.ctrl, "Ctrl"), (m.shift, "Shift"), (m.alt, "Alt"), (m.meta, "Meta")] {
            if held {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{:?}", self.key)
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Map a key name (case-insensitive) to an [`rdev::Key`].
///
/// Accepts F1–F12, letters, digits and the usual named keys.
pub fn parse_key(name: &str) -> Option<Key> {
    let name = name.to_ascii_lowercase();

    if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        return function_key(n);
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return single_char_key(c);
    }

    match name.as_str() {
        "escape" | "esc" => Some(Key::Escape),
        "space" => Some(Key::Space),
        "return" | "enter" => Some(Key::Return),
        "tab" => Some(Key::Tab),
        "backspace" => Some(Key::Backspace),
        "delete" | "del" => Some(Key::Delete),
        "insert" | "ins" => Some(Key::Insert),
        "home" => Some(Key::Home),
        "end" => Some(Key::End),
        "pageup" => Some(Key::PageUp),
        "pagedown" => Some(Key::PageDown),
        "up" | "uparrow" => Some(Key::UpArrow),
        "down" | "downarrow" => Some(Key::DownArrow),
        "left" | "leftarrow" => Some(Key::LeftArrow),
        "right" | "rightarrow" => Some(Key::RightArrow),
        "printscreen" | "print" => Some(Key::PrintScreen),
        "pause" => Some(Key::Pause),
        "scrolllock" => Some(Key::ScrollLock),
        _ => None,
    }
}

fn function_key(n: u8) -> Option<Key> {
    const KEYS: [Key; 12] = [
        Key::F1,
        Key::F2,
        Key::F3,
        Key::F4,
        Key::F5,
        Key::F6,
        Key::F7,
        Key::F8,
        Key::F9,
        Key::F10,
        Key::F11,
        Key::F12,
    ];
    usize::from(n).checked_sub(1).and_then(|i| KEYS.get(i).copied())
}

fn single_char_key(c: char) -> Option<Key> {
    const LETTERS: [Key; 26] = [
        Key::KeyA,
        Key::KeyB,
        Key::KeyC,
        Key::KeyD,
        Key::KeyE,
        Key::KeyF,
        Key::KeyG,
        Key::KeyH,
        Key::KeyI,
        Key::KeyJ,
        Key::KeyK,
        Key::KeyL,
        Key::KeyM,
        Key::KeyN,
        Key::KeyO,
        Key::KeyP,
        Key::KeyQ,
        Key::KeyR,
        Key::KeyS,
        Key::KeyT,
        Key::KeyU,
        Key::KeyV,
        Key::KeyW,
        Key::KeyX,
        Key::KeyY,
        Key::KeyZ,
    ];
    const DIGITS: [Key; 10] = [
        Key::Num0,
        Key::Num1,
        Key::Num2,
        Key::Num3,
        Key::Num4,
        Key::Num5,
        Key::Num6,
        Key::Num7,
        Key::Num8,
        Key::Num9,
    ];

    match c {
        'a'..='z' => LETTERS.get(usize::from(c as u8 - b'a')).copied(),
        '0'..='9' => DIGITS.get(usize::from(c as u8 - b'0')).copied(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_function_keys() {
        assert_eq!(parse_key("F9"), Some(Key::F9));
        assert_eq!(parse_key("f1"), Some(Key::F1));
        assert_eq!(parse_key("F12"), Some(Key::F12));
        assert_eq!(parse_key("F0"), None);
        assert_eq!(parse_key("F13"), None);
    }

    #[test]
    fn parse_letters_and_digits() {
        assert_eq!(parse_key("o"), Some(Key::KeyO));
        assert_eq!(parse_key("Z"), Some(Key::KeyZ));
        assert_eq!(parse_key("7"), Some(Key::Num7));
        assert_eq!(parse_key("#"), None);
    }

    #[test]
    fn parse_named_keys() {
        assert_eq!(parse_key("Esc"), Some(Key::Escape));
        assert_eq!(parse_key("PRINTSCREEN"), Some(Key::PrintScreen));
        assert_eq!(parse_key("PageDown"), Some(Key::PageDown));
        assert_eq!(parse_key("nope"), None);
    }

    #[test]
    fn default_combo() {
        let hk: Hotkey = "Ctrl+Shift+O".parse().unwrap();
        assert_eq!(hk.key, Key::KeyO);
        assert_eq!(
            hk.modifiers,
            Modifiers {
                ctrl: true,
                shift: true,
                ..Modifiers::default()
            }
        );
        assert_eq!(hk.to_string(), "Ctrl+Shift+KeyO");
    }

    #[test]
    fn modifier_aliases_and_spacing() {
        let hk: Hotkey = " control + option + cmd + F5 ".parse().unwrap();
        assert_eq!(hk.key, Key::F5);
        assert!(hk.modifiers.ctrl && hk.modifiers.alt && hk.modifiers.meta);
        assert!(!hk.modifiers.shift);
    }

    #[test]
    fn bare_key_has_no_modifiers() {
        let hk: Hotkey = "PrintScreen".parse().unwrap();
        assert_eq!(hk.modifiers, Modifiers::default());
    }

    #[test]
    fn rejects_bad_combos() {
        assert!(matches!("".parse::<Hotkey>(), Err(HotkeyError::Empty)));
        assert!(matches!("Ctrl+Alt".parse::<Hotkey>(), Err(HotkeyError::MissingKey(_))));
        assert!(matches!("Ctrl+A+B".parse::<Hotkey>(), Err(HotkeyError::UnknownKey(_))));
        assert!(matches!("Hyper+A".parse::<Hotkey>(), Err(HotkeyError::UnknownKey(_))));
    }

    #[test]
    fn modifier_tracking() {
        let mut m = Modifiers::default();
        assert!(m.update(Key::ControlRight, true));
        assert!(m.update(Key::ShiftLeft, true));
        assert!(!m.update(Key::KeyA, true));
        assert!(m.ctrl && m.shift);
        m.update(Key::ControlRight, false);
        assert!(!m.ctrl && m.shift);
    }
}
