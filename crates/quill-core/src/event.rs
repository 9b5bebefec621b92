#![forbid(unsafe_code)]

//! Canonical input events.
//!
//! The [`crate::input::InputReader`] classifies raw VT tokens into these
//! types. Text arrives as raw bytes: the terminal hands us whatever the user
//! typed or pasted, and UTF-8 validation is deferred to the text store's
//! Unicode measurement (invalid sequences measure as U+FFFD).
//!
//! Mouse events carry a five-state [`MouseAction`] rather than separate
//! press/release kinds: the terminal never reports a release with a button
//! payload under SGR encoding, so `Release` is synthesised by the UI frame
//! reset when a press is followed by a buttonless report.

use bitflags::bitflags;

use crate::geometry::{Point, Size};

/// A key identity, decoupled from modifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A character key. Only produced together with Ctrl or Alt; plain
    /// printable input arrives as [`InputEvent::Text`].
    Char(char),
    /// NUL (Ctrl+Space / Ctrl+@).
    Null,
    /// Backspace (DEL, 0x7F).
    Backspace,
    /// Tab (Ctrl+I).
    Tab,
    /// Enter (Ctrl+M).
    Enter,
    /// Escape key.
    Escape,
    /// Insert key.
    Insert,
    /// Delete key.
    Delete,
    /// Home key.
    Home,
    /// End key.
    End,
    /// Page Up key.
    PageUp,
    /// Page Down key.
    PageDown,
    /// Up arrow.
    Up,
    /// Down arrow.
    Down,
    /// Left arrow.
    Left,
    /// Right arrow.
    Right,
    /// Function key (F1-F20).
    F(u8),
}

bitflags! {
    /// Modifier keys held during a key or mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const NONE  = 0b000;
        const SHIFT = 0b001;
        const ALT   = 0b010;
        const CTRL  = 0b100;
    }
}

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    /// The key that was pressed.
    pub code: KeyCode,
    /// Modifiers held during the press.
    pub modifiers: Modifiers,
}

impl KeyInput {
    /// Create a key event without modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
        }
    }

    /// Attach modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Check if Ctrl is held.
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }
}

/// A key + modifier combination used for menu accelerators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl Shortcut {
    /// Create a shortcut from an explicit key and modifier set.
    #[must_use]
    pub const fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }

    /// `Ctrl+<letter>`. The letter is uppercased to match how the classifier
    /// reports C0 control bytes.
    #[must_use]
    pub const fn ctrl(letter: char) -> Self {
        Self {
            code: KeyCode::Char(letter.to_ascii_uppercase()),
            modifiers: Modifiers::CTRL,
        }
    }

    /// `Ctrl+Shift+<letter>`.
    #[must_use]
    pub const fn ctrl_shift(letter: char) -> Self {
        Self {
            code: KeyCode::Char(letter.to_ascii_uppercase()),
            modifiers: Modifiers::CTRL.union(Modifiers::SHIFT),
        }
    }

    /// Check whether a keyboard event matches this shortcut exactly.
    #[must_use]
    pub fn matches(&self, key: KeyInput) -> bool {
        key.code == self.code && key.modifiers == self.modifiers
    }
}

/// What the mouse did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseAction {
    /// Pointer motion or a buttonless report.
    #[default]
    None,
    /// Synthesised when a press is followed by a buttonless report.
    Release,
    /// Left button press (or drag while held).
    Left,
    /// Middle button press.
    Middle,
    /// Right button press.
    Right,
    /// Wheel scroll; see [`MouseInput::scroll`].
    Scroll,
}

impl MouseAction {
    /// Check whether this action is a button press.
    #[must_use]
    pub const fn is_press(&self) -> bool {
        matches!(self, Self::Left | Self::Middle | Self::Right)
    }
}

/// A mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseInput {
    pub action: MouseAction,
    pub modifiers: Modifiers,
    /// Pointer position, 0-based.
    pub position: Point,
    /// Scroll delta in cells; wheel steps report `y = ±3`.
    pub scroll: Point,
}

/// A classified input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// The terminal reported a new size.
    Resize(Size),
    /// Raw typed/pasted bytes.
    Text(Vec<u8>),
    /// A keyboard event.
    Key(KeyInput),
    /// A mouse event.
    Mouse(MouseInput),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcut_ctrl_uppercases() {
        let s = Shortcut::ctrl('s');
        assert_eq!(s.code, KeyCode::Char('S'));
        assert!(s.matches(KeyInput::new(KeyCode::Char('S')).with_modifiers(Modifiers::CTRL)));
        assert!(!s.matches(KeyInput::new(KeyCode::Char('S'))));
    }

    #[test]
    fn shortcut_requires_exact_modifiers() {
        let s = Shortcut::ctrl('q');
        let extra = KeyInput::new(KeyCode::Char('Q'))
            .with_modifiers(Modifiers::CTRL | Modifiers::SHIFT);
        assert!(!s.matches(extra));
        assert!(Shortcut::ctrl_shift('q').matches(extra));
    }

    #[test]
    fn mouse_action_press_classification() {
        assert!(MouseAction::Left.is_press());
        assert!(MouseAction::Middle.is_press());
        assert!(MouseAction::Right.is_press());
        assert!(!MouseAction::None.is_press());
        assert!(!MouseAction::Release.is_press());
        assert!(!MouseAction::Scroll.is_press());
    }

    #[test]
    fn key_input_builder() {
        let key = KeyInput::new(KeyCode::Up).with_modifiers(Modifiers::CTRL);
        assert!(key.ctrl());
        assert_eq!(key.code, KeyCode::Up);
    }
}
