#![forbid(unsafe_code)]

//! Input classifier.
//!
//! Pulls tokens from a [`VtParser`] and turns them into [`InputEvent`]s:
//!
//! | Token | Event |
//! |-------|-------|
//! | TEXT | [`InputEvent::Text`] |
//! | CTRL NUL/TAB/CR/DEL | key without modifiers |
//! | CTRL `0x01..=0x1A` | `Ctrl+<letter>` |
//! | ESC + printable | `Alt+<char>` |
//! | SS3 `P`..`S` | F1-F4 |
//! | CSI cursor/tilde keys | navigation/function keys with xterm modifiers |
//! | CSI `<...M/m` | SGR mouse report |
//! | CSI `8;h;w t` | window resize report |
//!
//! Unrecognised sequences are dropped; the stream keeps flowing.

use tracing::trace;

use crate::event::{InputEvent, KeyCode, KeyInput, Modifiers, MouseAction, MouseInput};
use crate::geometry::{Point, Size};
use crate::vt::{CsiParams, VtParser, VtToken};

/// Largest terminal dimension accepted from a resize report.
const MAX_DIMENSION: i32 = 32767;

/// Classifies terminal input bytes into [`InputEvent`]s.
///
/// Owns the VT parser state, so sequences split across reads resume
/// transparently.
#[derive(Debug, Default)]
pub struct InputReader {
    parser: VtParser,
}

impl InputReader {
    /// Create a reader in the ground state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull the next event out of `input[*pos..]`.
    ///
    /// Returns `None` when the buffer is exhausted (possibly mid-sequence;
    /// the next call resumes). Tokens that do not map to an event are
    /// skipped.
    pub fn next_event(&mut self, input: &[u8], pos: &mut usize) -> Option<InputEvent> {
        while *pos < input.len() {
            let event = match self.parser.next_token(input, pos) {
                VtToken::Pending => return None,
                VtToken::Text(text) => Some(InputEvent::Text(text.to_vec())),
                VtToken::Ctrl(byte) => classify_ctrl(byte),
                VtToken::Esc(byte) => classify_esc(byte),
                VtToken::Ss3(byte) => classify_ss3(byte),
                VtToken::Csi(csi) => {
                    let event = classify_csi(csi);
                    if event.is_none() {
                        trace!(final_byte = csi.final_byte, "dropped CSI sequence");
                    }
                    event
                }
                VtToken::Osc(_) | VtToken::Dcs(_) => None,
            };
            if event.is_some() {
                return event;
            }
        }
        None
    }

    /// Classify an entire read in one go.
    pub fn drain(&mut self, input: &[u8]) -> Vec<InputEvent> {
        let mut events = Vec::new();
        let mut pos = 0;
        while let Some(event) = self.next_event(input, &mut pos) {
            events.push(event);
        }
        events
    }
}

fn classify_ctrl(byte: u8) -> Option<InputEvent> {
    let key = match byte {
        0x00 => KeyInput::new(KeyCode::Null),
        0x09 => KeyInput::new(KeyCode::Tab),
        0x0d => KeyInput::new(KeyCode::Enter),
        0x7f => KeyInput::new(KeyCode::Backspace),
        // Ctrl+A..Ctrl+Z, minus the bytes that are keys of their own above.
        0x01..=0x1a => KeyInput::new(KeyCode::Char((byte | 0x40) as char))
            .with_modifiers(Modifiers::CTRL),
        _ => return None,
    };
    Some(InputEvent::Key(key))
}

fn classify_esc(byte: u8) -> Option<InputEvent> {
    if (b' '..=b'~').contains(&byte) {
        Some(InputEvent::Key(
            KeyInput::new(KeyCode::Char(byte as char)).with_modifiers(Modifiers::ALT),
        ))
    } else {
        None
    }
}

fn classify_ss3(byte: u8) -> Option<InputEvent> {
    if (b'P'..=b'S').contains(&byte) {
        Some(InputEvent::Key(KeyInput::new(KeyCode::F(byte - b'P' + 1))))
    } else {
        None
    }
}

fn classify_csi(csi: &CsiParams) -> Option<InputEvent> {
    match csi.final_byte {
        b'A' => cursor_key(KeyCode::Up, csi),
        b'B' => cursor_key(KeyCode::Down, csi),
        b'C' => cursor_key(KeyCode::Right, csi),
        b'D' => cursor_key(KeyCode::Left, csi),
        b'F' => cursor_key(KeyCode::End, csi),
        b'H' => cursor_key(KeyCode::Home, csi),
        b'~' => tilde_key(csi),
        b'M' | b'm' if csi.private_byte == b'<' => Some(sgr_mouse(csi)),
        b't' if csi.get(0) == 8 => Some(resize_report(csi)),
        _ => None,
    }
}

fn cursor_key(code: KeyCode, csi: &CsiParams) -> Option<InputEvent> {
    Some(InputEvent::Key(
        KeyInput::new(code).with_modifiers(xterm_modifiers(csi.get(1))),
    ))
}

fn tilde_key(csi: &CsiParams) -> Option<InputEvent> {
    let code = match csi.get(0) {
        1 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        15 => KeyCode::F(5),
        17 => KeyCode::F(6),
        18 => KeyCode::F(7),
        19 => KeyCode::F(8),
        20 => KeyCode::F(9),
        21 => KeyCode::F(10),
        23 => KeyCode::F(11),
        24 => KeyCode::F(12),
        25 => KeyCode::F(13),
        26 => KeyCode::F(14),
        28 => KeyCode::F(15),
        29 => KeyCode::F(16),
        31 => KeyCode::F(17),
        32 => KeyCode::F(18),
        33 => KeyCode::F(19),
        34 => KeyCode::F(20),
        _ => return None,
    };
    Some(InputEvent::Key(
        KeyInput::new(code).with_modifiers(xterm_modifiers(csi.get(1))),
    ))
}

/// xterm encodes modifiers as `1 + bits`: Shift=1, Alt=2, Ctrl=4.
fn xterm_modifiers(param: u16) -> Modifiers {
    let bits = param.saturating_sub(1);
    let mut mods = Modifiers::NONE;
    if bits & 0x01 != 0 {
        mods |= Modifiers::SHIFT;
    }
    if bits & 0x02 != 0 {
        mods |= Modifiers::ALT;
    }
    if bits & 0x04 != 0 {
        mods |= Modifiers::CTRL;
    }
    mods
}

/// Decode an SGR mouse report: `CSI < button ; x ; y M|m`.
///
/// Coordinates are 1-based on the wire; bit 6 of the button code marks a
/// scroll step of three rows. Releases (`m`) decode to [`MouseAction::None`];
/// the UI synthesises [`MouseAction::Release`] from press/none transitions.
fn sgr_mouse(csi: &CsiParams) -> InputEvent {
    let button = csi.get(0);

    let mut action = MouseAction::None;
    let mut scroll = Point::default();
    if button & 0x40 != 0 {
        action = MouseAction::Scroll;
        scroll.y += if button & 0x01 != 0 { 3 } else { -3 };
    } else if csi.final_byte == b'M' {
        action = match button & 0x03 {
            0 => MouseAction::Left,
            1 => MouseAction::Middle,
            2 => MouseAction::Right,
            _ => MouseAction::None,
        };
    }

    let mut modifiers = Modifiers::NONE;
    if button & 0x04 != 0 {
        modifiers |= Modifiers::SHIFT;
    }
    if button & 0x08 != 0 {
        modifiers |= Modifiers::ALT;
    }
    if button & 0x10 != 0 {
        modifiers |= Modifiers::CTRL;
    }

    InputEvent::Mouse(MouseInput {
        action,
        modifiers,
        position: Point::new(
            i32::from(csi.get(1)).saturating_sub(1),
            i32::from(csi.get(2)).saturating_sub(1),
        ),
        scroll,
    })
}

/// Decode `CSI 8 ; height ; width t`, clamping both axes to `[1, 32768)`.
fn resize_report(csi: &CsiParams) -> InputEvent {
    InputEvent::Resize(Size::new(
        i32::from(csi.get(2)).clamp(1, MAX_DIMENSION),
        i32::from(csi.get(1)).clamp(1, MAX_DIMENSION),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(input: &[u8]) -> Vec<InputEvent> {
        InputReader::new().drain(input)
    }

    fn single(input: &[u8]) -> InputEvent {
        let evs = events(input);
        assert_eq!(evs.len(), 1, "expected one event from {input:?}: {evs:?}");
        evs.into_iter().next().unwrap()
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(single(b"abc"), InputEvent::Text(b"abc".to_vec()));
    }

    #[test]
    fn special_ctrl_bytes_keep_identity() {
        assert_eq!(
            single(b"\x00"),
            InputEvent::Key(KeyInput::new(KeyCode::Null))
        );
        assert_eq!(single(b"\t"), InputEvent::Key(KeyInput::new(KeyCode::Tab)));
        assert_eq!(
            single(b"\r"),
            InputEvent::Key(KeyInput::new(KeyCode::Enter))
        );
        assert_eq!(
            single(b"\x7f"),
            InputEvent::Key(KeyInput::new(KeyCode::Backspace))
        );
    }

    #[test]
    fn ctrl_letters_fold_to_uppercase() {
        assert_eq!(
            single(b"\x13"),
            InputEvent::Key(KeyInput::new(KeyCode::Char('S')).with_modifiers(Modifiers::CTRL))
        );
        assert_eq!(
            single(b"\x1a"),
            InputEvent::Key(KeyInput::new(KeyCode::Char('Z')).with_modifiers(Modifiers::CTRL))
        );
    }

    #[test]
    fn alt_letter() {
        assert_eq!(
            single(b"\x1bf"),
            InputEvent::Key(KeyInput::new(KeyCode::Char('f')).with_modifiers(Modifiers::ALT))
        );
    }

    #[test]
    fn ss3_function_keys() {
        assert_eq!(
            single(b"\x1bOP"),
            InputEvent::Key(KeyInput::new(KeyCode::F(1)))
        );
        assert_eq!(
            single(b"\x1bOS"),
            InputEvent::Key(KeyInput::new(KeyCode::F(4)))
        );
    }

    #[test]
    fn csi_cursor_keys() {
        assert_eq!(
            single(b"\x1b[A"),
            InputEvent::Key(KeyInput::new(KeyCode::Up))
        );
        assert_eq!(
            single(b"\x1b[H"),
            InputEvent::Key(KeyInput::new(KeyCode::Home))
        );
        assert_eq!(
            single(b"\x1b[F"),
            InputEvent::Key(KeyInput::new(KeyCode::End))
        );
    }

    #[test]
    fn csi_cursor_key_with_modifiers() {
        // 1;5 => modifier bits 4 => Ctrl.
        assert_eq!(
            single(b"\x1b[1;5C"),
            InputEvent::Key(KeyInput::new(KeyCode::Right).with_modifiers(Modifiers::CTRL))
        );
        // 1;4 => Shift+Alt.
        assert_eq!(
            single(b"\x1b[1;4A"),
            InputEvent::Key(
                KeyInput::new(KeyCode::Up).with_modifiers(Modifiers::SHIFT | Modifiers::ALT)
            )
        );
    }

    #[test]
    fn csi_tilde_keys() {
        assert_eq!(
            single(b"\x1b[3~"),
            InputEvent::Key(KeyInput::new(KeyCode::Delete))
        );
        assert_eq!(
            single(b"\x1b[5~"),
            InputEvent::Key(KeyInput::new(KeyCode::PageUp))
        );
        assert_eq!(
            single(b"\x1b[24~"),
            InputEvent::Key(KeyInput::new(KeyCode::F(12)))
        );
        assert_eq!(
            single(b"\x1b[34~"),
            InputEvent::Key(KeyInput::new(KeyCode::F(20)))
        );
    }

    #[test]
    fn unknown_tilde_param_is_dropped() {
        assert!(events(b"\x1b[99~").is_empty());
    }

    #[test]
    fn mouse_left_press() {
        let InputEvent::Mouse(mouse) = single(b"\x1b[<0;10;5M") else {
            panic!("expected mouse");
        };
        assert_eq!(mouse.action, MouseAction::Left);
        assert_eq!(mouse.position, Point::new(9, 4));
        assert_eq!(mouse.scroll, Point::default());
    }

    #[test]
    fn mouse_release_reports_none_action() {
        let InputEvent::Mouse(mouse) = single(b"\x1b[<0;10;5m") else {
            panic!("expected mouse");
        };
        assert_eq!(mouse.action, MouseAction::None);
    }

    #[test]
    fn mouse_scroll_directions() {
        let InputEvent::Mouse(up) = single(b"\x1b[<64;1;1M") else {
            panic!("expected mouse");
        };
        assert_eq!(up.action, MouseAction::Scroll);
        assert_eq!(up.scroll.y, -3);

        let InputEvent::Mouse(down) = single(b"\x1b[<65;1;1M") else {
            panic!("expected mouse");
        };
        assert_eq!(down.scroll.y, 3);
    }

    #[test]
    fn mouse_modifier_bits() {
        let InputEvent::Mouse(mouse) = single(b"\x1b[<28;1;1M") else {
            panic!("expected mouse");
        };
        // 28 = 0b11100: shift(4) + alt(8) + ctrl(16), button bits 00.
        assert_eq!(
            mouse.modifiers,
            Modifiers::SHIFT | Modifiers::ALT | Modifiers::CTRL
        );
    }

    #[test]
    fn resize_report_orders_width_height() {
        assert_eq!(
            single(b"\x1b[8;24;80t"),
            InputEvent::Resize(Size::new(80, 24))
        );
    }

    #[test]
    fn resize_report_clamps_to_one() {
        assert_eq!(
            single(b"\x1b[8;0;0t"),
            InputEvent::Resize(Size::new(1, 1))
        );
    }

    #[test]
    fn split_sequence_resumes_across_reads() {
        let mut reader = InputReader::new();
        assert!(reader.drain(b"\x1b[1;5").is_empty());
        assert_eq!(
            reader.drain(b"D"),
            vec![InputEvent::Key(
                KeyInput::new(KeyCode::Left).with_modifiers(Modifiers::CTRL)
            )]
        );
    }

    #[test]
    fn mixed_stream_preserves_order() {
        let evs = events(b"hi\x1b[A\x1b[<0;2;2M");
        assert_eq!(evs.len(), 3);
        assert!(matches!(evs[0], InputEvent::Text(_)));
        assert!(matches!(evs[1], InputEvent::Key(_)));
        assert!(matches!(evs[2], InputEvent::Mouse(_)));
    }

    #[test]
    fn osc_responses_are_dropped() {
        assert!(events(b"\x1b]0;title\x07").is_empty());
    }
}
