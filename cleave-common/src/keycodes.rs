pub mod scancode {
    pub const A: u8 = 0x04;
    pub const B: u8 = 0x05;
    pub const C: u8 = 0x06;
    pub const D: u8 = 0x07;
    pub const E: u8 = 0x08;
    pub const Z: u8 = 0x1d;

    pub const N1: u8 = 0x1e;
    pub const N9: u8 = 0x26;
    pub const N0: u8 = 0x27;

    pub const ENTER: u8 = 0x28;
    pub const ESCAPE: u8 = 0x29;
    pub const BACKSPACE: u8 = 0x2a;
    pub const TAB: u8 = 0x2b;
    pub const SPACE: u8 = 0x2c;
    pub const MINUS: u8 = 0x2d;
    pub const EQUAL: u8 = 0x2e;
    pub const OPENING_BRACKET: u8 = 0x2f;
    pub const CLOSING_BRACKET: u8 = 0x30;
    pub const BACKSLASH: u8 = 0x31;
    pub const SEMICOLON: u8 = 0x33;
    pub const APOSTROPHE: u8 = 0x34;
    pub const GRAVE: u8 = 0x35;
    pub const COMMA: u8 = 0x36;
    pub const DOT: u8 = 0x37;
    pub const SLASH: u8 = 0x38;
}

pub mod modifier {
    pub const LEFT_CTRL: u8 = 0x01;
    pub const LEFT_SHIFT: u8 = 0x02;
    pub const LEFT_ALT: u8 = 0x04;
    pub const LEFT_GUI: u8 = 0x08;
    pub const RIGHT_CTRL: u8 = 0x10;
    pub const RIGHT_SHIFT: u8 = 0x20;
    pub const RIGHT_ALT: u8 = 0x40;
    pub const RIGHT_GUI: u8 = 0x80;

    pub const CTRL_MASK: u8 = LEFT_CTRL | RIGHT_CTRL;
    pub const SHIFT_MASK: u8 = LEFT_SHIFT | RIGHT_SHIFT;
    pub const ALT_MASK: u8 = LEFT_ALT | RIGHT_ALT;
    pub const GUI_MASK: u8 = LEFT_GUI | RIGHT_GUI;
}

/// Scancode for a printable ASCII byte, `0` when the byte has no key.
///
/// ```
/// assert_eq!(cleave_common::keycodes::char_to_scancode(b'a'), 0x04);
/// assert_eq!(cleave_common::keycodes::char_to_scancode(b'A'), 0x04);
/// assert_eq!(cleave_common::keycodes::char_to_scancode(7), 0);
/// ```
pub fn char_to_scancode(c: u8) -> u8 {
    match c {
        b'A'..=b'Z' | b'a'..=b'z' => scancode::A - 1 + (c & 0x1f),
        b'1'..=b'9' => scancode::N1 - 1 + (c & 0x0f),
        b')' | b'0' => scancode::N0,
        b'!' => scancode::N1,
        b'@' => scancode::N1 + 1,
        b'#' => scancode::N1 + 2,
        b'$' => scancode::N1 + 3,
        b'%' => scancode::N1 + 4,
        b'^' => scancode::N1 + 5,
        b'&' => scancode::N1 + 6,
        b'*' => scancode::N1 + 7,
        b'(' => scancode::N9,
        b'`' | b'~' => scancode::GRAVE,
        b'[' | b'{' => scancode::OPENING_BRACKET,
        b']' | b'}' => scancode::CLOSING_BRACKET,
        b';' | b':' => scancode::SEMICOLON,
        b'\'' | b'"' => scancode::APOSTROPHE,
        b'+' | b'=' => scancode::EQUAL,
        b'\\' | b'|' => scancode::BACKSLASH,
        b'.' | b'>' => scancode::DOT,
        b',' | b'<' => scancode::COMMA,
        b'/' | b'?' => scancode::SLASH,
        b'-' | b'_' => scancode::MINUS,
        b'\n' => scancode::ENTER,
        b' ' => scancode::SPACE,
        _ => 0,
    }
}

/// Does typing this byte require the shift modifier?
pub fn char_needs_shift(c: u8) -> bool {
    matches!(
        c,
        b'A'..=b'Z'
            | b')'
            | b'!'
            | b'@'
            | b'#'
            | b'$'
            | b'%'
            | b'^'
            | b'&'
            | b'*'
            | b'('
            | b'~'
            | b'{'
            | b'}'
            | b':'
            | b'"'
            | b'+'
            | b'|'
            | b'>'
            | b'<'
            | b'?'
            | b'_'
    )
}
