//! Undo Escape: the one way out of a lock that does not involve the mentor.
//!
//! While locked, every key is suppressed except the undo chord. The undo is
//! passed to the editor's own undo machinery (a read-only flag would block
//! that too), then the resulting version id is compared with the id captured
//! before the paste.

use crate::version::EditorVersionId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

/// Key identity, independent of any terminal or GUI toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    Tab,
    Esc,
    Up,
    Down,
    Left,
    Right,
}

/// A key press with its modifiers. `meta` is Cmd on macOS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStroke {
    pub key: Key,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyStroke {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            meta: false,
            shift: false,
            alt: false,
        }
    }

    pub fn ctrl(c: char) -> Self {
        Self {
            ctrl: true,
            ..Self::plain(Key::Char(c))
        }
    }

    fn command_with(&self, c: char) -> bool {
        (self.ctrl || self.meta)
            && matches!(self.key, Key::Char(k) if k.to_ascii_lowercase() == c)
    }

    /// Ctrl+Z or Cmd+Z without Shift.
    pub fn is_undo_chord(&self) -> bool {
        self.command_with('z') && !self.shift
    }

    /// Ctrl+Shift+Z, Cmd+Shift+Z or Ctrl+Y.
    pub fn is_redo_chord(&self) -> bool {
        (self.command_with('z') && self.shift) || self.command_with('y')
    }

    /// Ctrl+M or Cmd+M: ask the mentor about the current code.
    pub fn is_mentor_chord(&self) -> bool {
        self.command_with('m')
    }
}

impl std::fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ctrl {
            write!(f, "ctrl+")?;
        }
        if self.meta {
            write!(f, "cmd+")?;
        }
        if self.alt {
            write!(f, "alt+")?;
        }
        if self.shift {
            write!(f, "shift+")?;
        }
        match &self.key {
            Key::Char(c) => write!(f, "{}", c),
            Key::Enter => write!(f, "enter"),
            Key::Backspace => write!(f, "backspace"),
            Key::Delete => write!(f, "delete"),
            Key::Tab => write!(f, "tab"),
            Key::Esc => write!(f, "esc"),
            Key::Up => write!(f, "up"),
            Key::Down => write!(f, "down"),
            Key::Left => write!(f, "left"),
            Key::Right => write!(f, "right"),
        }
    }
}

impl FromStr for KeyStroke {
    type Err = String;

    /// Parses chords like `ctrl+z`, `cmd+shift+z`, `a`, `enter`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty key chord".to_string());
        }
        // A lone "+" is the plus key, not a separator
        if s == "+" {
            return Ok(Self::plain(Key::Char('+')));
        }

        let mut stroke = Self::plain(Key::Esc);
        let parts: Vec<&str> = s.split('+').collect();
        let (key_part, modifiers) = parts.split_last().ok_or_else(|| format!("bad chord '{}'", s))?;

        for m in modifiers {
            match m.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => stroke.ctrl = true,
                "cmd" | "meta" | "super" => stroke.meta = true,
                "shift" => stroke.shift = true,
                "alt" | "option" => stroke.alt = true,
                other => return Err(format!("unknown modifier '{}'", other)),
            }
        }

        stroke.key = match key_part.to_ascii_lowercase().as_str() {
            "enter" | "return" => Key::Enter,
            "backspace" => Key::Backspace,
            "delete" | "del" => Key::Delete,
            "tab" => Key::Tab,
            "esc" | "escape" => Key::Esc,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "space" => Key::Char(' '),
            _ => {
                let mut chars = key_part.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => return Err(format!("unknown key '{}'", key_part)),
                }
            }
        };

        Ok(stroke)
    }
}

/// What to do with a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Session not locked: deliver normally
    PassThrough,
    /// Locked and this is the undo chord: let the editor's undo run
    AllowUndo,
    /// Locked: prevent default and stop propagation
    Suppress,
}

/// Result of checking the editor version after an allowed undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The paste is gone; unlock
    Reverted,
    /// Still past the pre-paste version; keep blocking
    StillLocked,
    /// Undo escape was not armed
    NotLocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndoEscape {
    #[default]
    Unlocked,
    LockedBlocking { target: EditorVersionId },
}

impl UndoEscape {
    /// Start blocking; `target` is the pre-paste version id.
    pub fn arm(&mut self, target: EditorVersionId) {
        debug!("Undo escape armed, target {}", target);
        *self = Self::LockedBlocking { target };
    }

    pub fn disarm(&mut self) {
        *self = Self::Unlocked;
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Self::LockedBlocking { .. })
    }

    pub fn target(&self) -> Option<EditorVersionId> {
        match self {
            Self::LockedBlocking { target } => Some(*target),
            Self::Unlocked => None,
        }
    }

    pub fn intercept(&self, key: &KeyStroke) -> KeyDisposition {
        match self {
            Self::Unlocked => KeyDisposition::PassThrough,
            Self::LockedBlocking { .. } if key.is_undo_chord() => KeyDisposition::AllowUndo,
            Self::LockedBlocking { .. } => KeyDisposition::Suppress,
        }
    }

    /// Compare the editor's version after an undo with the target.
    ///
    /// Any id at or before the target counts, so an undo step that
    /// coalesced earlier typing and overshoots still unlocks.
    pub fn after_undo(&mut self, current: EditorVersionId) -> UndoOutcome {
        let Self::LockedBlocking { target } = *self else {
            return UndoOutcome::NotLocked;
        };
        if current <= target {
            info!("Paste fully undone ({} <= {})", current, target);
            *self = Self::Unlocked;
            UndoOutcome::Reverted
        } else {
            debug!("Undo step taken, {} still past {}", current, target);
            UndoOutcome::StillLocked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> KeyStroke {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_chords() {
        assert!(key("ctrl+z").is_undo_chord());
        assert!(key("cmd+Z").is_undo_chord());
        assert!(!key("ctrl+shift+z").is_undo_chord());
        assert!(key("ctrl+shift+z").is_redo_chord());
        assert!(key("ctrl+y").is_redo_chord());
        assert!(key("cmd+m").is_mentor_chord());
        assert_eq!(key("a"), KeyStroke::plain(Key::Char('a')));
        assert_eq!(key("+"), KeyStroke::plain(Key::Char('+')));
        assert_eq!(key("enter").key, Key::Enter);
        assert!("hyper+z".parse::<KeyStroke>().is_err());
        assert!("abc".parse::<KeyStroke>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let k = key("ctrl+shift+z");
        assert_eq!(k.to_string(), "ctrl+shift+z");
    }

    #[test]
    fn test_unlocked_passes_everything() {
        let escape = UndoEscape::default();
        assert_eq!(escape.intercept(&key("a")), KeyDisposition::PassThrough);
        assert_eq!(escape.intercept(&key("ctrl+z")), KeyDisposition::PassThrough);
    }

    #[test]
    fn test_locked_blocks_all_but_undo() {
        let mut escape = UndoEscape::default();
        escape.arm(EditorVersionId(4));
        assert_eq!(escape.intercept(&key("a")), KeyDisposition::Suppress);
        assert_eq!(escape.intercept(&key("enter")), KeyDisposition::Suppress);
        assert_eq!(escape.intercept(&key("ctrl+v")), KeyDisposition::Suppress);
        assert_eq!(escape.intercept(&key("ctrl+shift+z")), KeyDisposition::Suppress);
        assert_eq!(escape.intercept(&key("ctrl+y")), KeyDisposition::Suppress);
        assert_eq!(escape.intercept(&key("ctrl+z")), KeyDisposition::AllowUndo);
    }

    #[test]
    fn test_after_undo_exact_and_overshoot() {
        let mut escape = UndoEscape::default();
        escape.arm(EditorVersionId(4));
        assert_eq!(escape.after_undo(EditorVersionId(6)), UndoOutcome::StillLocked);
        assert!(escape.is_locked());
        assert_eq!(escape.after_undo(EditorVersionId(4)), UndoOutcome::Reverted);
        assert!(!escape.is_locked());

        escape.arm(EditorVersionId(4));
        assert_eq!(escape.after_undo(EditorVersionId(2)), UndoOutcome::Reverted);
        assert_eq!(escape.after_undo(EditorVersionId(2)), UndoOutcome::NotLocked);
    }
}
