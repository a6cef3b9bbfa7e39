use anyhow::{ensure, Result};
use cleave_common::{
    macro_wire::{action_type, keystroke_type, sub_action, KEYMAP_ABBREV_LEN},
    PROGRAM_VERSION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sub {
    Tap,
    Press,
    Release,
    Hold,
}

impl Sub {
    fn wire(self) -> u8 {
        match self {
            Self::Tap => sub_action::TAP,
            Self::Press => sub_action::PRESS,
            Self::Release => sub_action::RELEASE,
            Self::Hold => sub_action::HOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Basic,
    Media,
    System,
}

impl Kind {
    fn wire(self) -> u8 {
        match self {
            Self::Basic => keystroke_type::BASIC,
            Self::Media => keystroke_type::MEDIA,
            Self::System => keystroke_type::SYSTEM,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action<'a> {
    Key {
        sub: Sub,
        kind: Kind,
        scancode: u16,
        modifiers: u8,
    },
    MouseButton {
        sub: Sub,
        buttons: u8,
    },
    MoveMouse(i16, i16),
    ScrollMouse(i16, i16),
    Delay(u16),
    Text(&'a str),
}

impl<'a> Action<'a> {
    pub fn tap(scancode: u16) -> Self {
        Self::key(Sub::Tap, scancode, 0)
    }

    pub fn key(sub: Sub, scancode: u16, modifiers: u8) -> Self {
        Self::Key {
            sub,
            kind: Kind::Basic,
            scancode,
            modifiers,
        }
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Key {
                sub,
                kind,
                scancode,
                modifiers,
            } => {
                out.push(action_type::KEY);
                out.push(sub.wire());
                out.push(kind.wire());
                out.extend_from_slice(&scancode.to_le_bytes());
                out.push(*modifiers);
            }
            Self::MouseButton { sub, buttons } => {
                out.extend_from_slice(&[action_type::MOUSE_BUTTON, sub.wire(), *buttons]);
            }
            Self::MoveMouse(x, y) | Self::ScrollMouse(x, y) => {
                out.push(if matches!(self, Self::MoveMouse(..)) {
                    action_type::MOVE_MOUSE
                } else {
                    action_type::SCROLL_MOUSE
                });
                out.extend_from_slice(&x.to_le_bytes());
                out.extend_from_slice(&y.to_le_bytes());
            }
            Self::Delay(ms) => {
                out.push(action_type::DELAY);
                out.extend_from_slice(&ms.to_le_bytes());
            }
            Self::Text(text) => {
                ensure!(text.len() <= u16::MAX as usize, "text too long");
                out.push(action_type::TEXT);
                out.extend_from_slice(&(text.len() as u16).to_le_bytes());
                out.extend_from_slice(text.as_bytes());
            }
        }
        Ok(())
    }
}

/// Assembles a program image in the layout `cleave_common::macro_wire`
/// documents; the firmware re-validates on load.
#[derive(Default)]
pub struct ProgramBuilder {
    keymaps: Vec<[u8; KEYMAP_ABBREV_LEN]>,
    macros: Vec<(u16, Vec<u8>)>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a keymap abbreviation (up to three bytes); returns its
    /// index.
    pub fn add_keymap(&mut self, abbrev: &str) -> Result<u8> {
        ensure!(
            !abbrev.is_empty() && abbrev.len() <= KEYMAP_ABBREV_LEN,
            "keymap abbreviation must be 1..={} bytes",
            KEYMAP_ABBREV_LEN
        );
        ensure!(self.keymaps.len() < u8::MAX as usize, "too many keymaps");
        let mut padded = [0u8; KEYMAP_ABBREV_LEN];
        padded[..abbrev.len()].copy_from_slice(abbrev.as_bytes());
        self.keymaps.push(padded);
        Ok(self.keymaps.len() as u8 - 1)
    }

    /// Appends a macro; returns its index.
    pub fn add_macro(&mut self, actions: &[Action]) -> Result<u8> {
        ensure!(self.macros.len() < u8::MAX as usize, "too many macros");
        ensure!(actions.len() <= u16::MAX as usize, "too many actions");
        let mut bytes = Vec::new();
        for action in actions {
            action.encode(&mut bytes)?;
        }
        self.macros.push((actions.len() as u16, bytes));
        Ok(self.macros.len() as u8 - 1)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![
            PROGRAM_VERSION,
            self.keymaps.len() as u8,
            self.macros.len() as u8,
        ];
        for abbrev in &self.keymaps {
            out.extend_from_slice(abbrev);
        }
        for (count, _) in &self.macros {
            out.extend_from_slice(&count.to_le_bytes());
        }
        for (_, bytes) in &self.macros {
            out.extend_from_slice(bytes);
        }
        out
    }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod test;
