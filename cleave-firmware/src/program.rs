use cleave_common::{
    macro_wire::{action_type, keystroke_type, sub_action, KEYMAP_ABBREV_LEN},
    PROGRAM_VERSION,
};

use crate::reports::KeystrokeKind;

pub const MAX_MACRO_NUM: usize = 255;
pub const MAX_KEYMAP_NUM: usize = 8;

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadError {
    OutOfSpace,
    VersionMismatch,
    Corrupt,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MacroRef {
    pub first_action_offset: u16,
    pub action_count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubAction {
    Tap,
    Press,
    Release,
    Hold,
}

impl SubAction {
    fn from_wire(b: u8) -> Option<Self> {
        Some(match b {
            sub_action::TAP => Self::Tap,
            sub_action::PRESS => Self::Press,
            sub_action::RELEASE => Self::Release,
            sub_action::HOLD => Self::Hold,
            _ => return None,
        })
    }
}

fn keystroke_kind(b: u8) -> Option<KeystrokeKind> {
    Some(match b {
        keystroke_type::BASIC => KeystrokeKind::Basic,
        keystroke_type::MEDIA => KeystrokeKind::Media,
        keystroke_type::SYSTEM => KeystrokeKind::System,
        _ => return None,
    })
}

/// One decoded action. `Text` keeps its payload in the program buffer and
/// is re-read byte-wise during dispatch.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacroAction {
    #[default]
    Noop,
    Key {
        sub: SubAction,
        kind: KeystrokeKind,
        scancode: u16,
        modifiers: u8,
    },
    MouseButton {
        sub: SubAction,
        buttons: u8,
    },
    MoveMouse {
        x: i16,
        y: i16,
    },
    ScrollMouse {
        x: i16,
        y: i16,
    },
    Delay {
        ms: u16,
    },
    Text {
        offset: u16,
        len: u16,
    },
}

/// The validated configuration: macro directory plus bytecode, loaded once
/// at boot. Actions are decoded lazily from their byte offset so a macro's
/// program counter is just (action index, offset) — jumps re-decode.
pub struct Program<const SIZE: usize> {
    bytecode: [u8; SIZE],
    bytecode_len: usize,
    macros: [MacroRef; MAX_MACRO_NUM],
    macro_count: usize,
    keymaps: [[u8; KEYMAP_ABBREV_LEN]; MAX_KEYMAP_NUM],
    keymap_count: usize,
}

impl<const SIZE: usize> Default for Program<SIZE> {
    fn default() -> Self {
        Self {
            bytecode: [0; SIZE],
            bytecode_len: 0,
            macros: [MacroRef::default(); MAX_MACRO_NUM],
            macro_count: 0,
            keymaps: [[0; KEYMAP_ABBREV_LEN]; MAX_KEYMAP_NUM],
            keymap_count: 0,
        }
    }
}

impl<const SIZE: usize> Program<SIZE> {
    /// Load a program image; see `cleave_common::macro_wire` for the
    /// layout. A failed load leaves the program empty, never half-loaded.
    pub fn load(&mut self, image: impl IntoIterator<Item = u8>) -> Result<(), LoadError> {
        let result = self.load_inner(image.into_iter());
        if result.is_err() {
            self.bytecode_len = 0;
            self.macro_count = 0;
            self.keymap_count = 0;
        }
        result
    }

    fn load_inner(&mut self, mut iter: impl Iterator<Item = u8>) -> Result<(), LoadError> {
        if iter.next().ok_or(LoadError::Corrupt)? != PROGRAM_VERSION {
            return Err(LoadError::VersionMismatch);
        }
        let keymap_count = iter.next().ok_or(LoadError::Corrupt)? as usize;
        let macro_count = iter.next().ok_or(LoadError::Corrupt)? as usize;
        if keymap_count > MAX_KEYMAP_NUM || macro_count > MAX_MACRO_NUM {
            crate::error!(
                "corrupt program: {} keymaps / {} macros",
                keymap_count,
                macro_count
            );
            return Err(LoadError::Corrupt);
        }

        for k in 0..keymap_count {
            for b in self.keymaps[k].iter_mut() {
                *b = iter.next().ok_or(LoadError::Corrupt)?;
            }
        }
        for m in 0..macro_count {
            let lo = iter.next().ok_or(LoadError::Corrupt)?;
            let hi = iter.next().ok_or(LoadError::Corrupt)?;
            self.macros[m].action_count = u16::from_le_bytes([lo, hi]);
        }

        let mut len = 0;
        for b in iter {
            if len == SIZE {
                crate::error!("program too big: bytecode limit is {}", SIZE);
                return Err(LoadError::OutOfSpace);
            }
            self.bytecode[len] = b;
            len += 1;
        }
        self.bytecode_len = len;

        // validation walk; every directory entry must decode cleanly
        let mut offset = 0u16;
        for m in 0..macro_count {
            self.macros[m].first_action_offset = offset;
            for _ in 0..self.macros[m].action_count {
                let (_, next) = self.action_at(offset).ok_or(LoadError::Corrupt)?;
                offset = next;
            }
        }
        if offset as usize != len {
            crate::error!("corrupt program: {} trailing bytes", len - offset as usize);
            return Err(LoadError::Corrupt);
        }

        self.macro_count = macro_count;
        self.keymap_count = keymap_count;
        Ok(())
    }

    pub fn macro_count(&self) -> usize {
        self.macro_count
    }

    pub fn get_macro(&self, index: u8) -> Option<MacroRef> {
        if (index as usize) < self.macro_count {
            Some(self.macros[index as usize])
        } else {
            None
        }
    }

    fn read(&self, offset: usize, n: usize) -> Option<&[u8]> {
        self.bytecode[..self.bytecode_len].get(offset..offset + n)
    }

    /// Decode the action record at `offset`, returning it and the offset
    /// of the following record.
    pub fn action_at(&self, offset: u16) -> Option<(MacroAction, u16)> {
        let o = offset as usize;
        let tag = *self.read(o, 1)?.first()?;
        match tag {
            action_type::KEY => {
                let d = self.read(o + 1, 5)?;
                Some((
                    MacroAction::Key {
                        sub: SubAction::from_wire(d[0])?,
                        kind: keystroke_kind(d[1])?,
                        scancode: u16::from_le_bytes([d[2], d[3]]),
                        modifiers: d[4],
                    },
                    offset + 6,
                ))
            }
            action_type::MOUSE_BUTTON => {
                let d = self.read(o + 1, 2)?;
                Some((
                    MacroAction::MouseButton {
                        sub: SubAction::from_wire(d[0])?,
                        buttons: d[1],
                    },
                    offset + 3,
                ))
            }
            action_type::MOVE_MOUSE | action_type::SCROLL_MOUSE => {
                let d = self.read(o + 1, 4)?;
                let x = i16::from_le_bytes([d[0], d[1]]);
                let y = i16::from_le_bytes([d[2], d[3]]);
                Some((
                    if tag == action_type::MOVE_MOUSE {
                        MacroAction::MoveMouse { x, y }
                    } else {
                        MacroAction::ScrollMouse { x, y }
                    },
                    offset + 5,
                ))
            }
            action_type::DELAY => {
                let d = self.read(o + 1, 2)?;
                Some((
                    MacroAction::Delay {
                        ms: u16::from_le_bytes([d[0], d[1]]),
                    },
                    offset + 3,
                ))
            }
            action_type::TEXT => {
                let d = self.read(o + 1, 2)?;
                let len = u16::from_le_bytes([d[0], d[1]]);
                self.read(o + 3, len as usize)?;
                Some((
                    MacroAction::Text {
                        offset: offset + 3,
                        len,
                    },
                    offset + 3 + len,
                ))
            }
            _ => None,
        }
    }

    /// Byte offset of action `action_idx` within macro `index`, walking the
    /// records from the directory entry. Jump targets resolve through this.
    pub fn action_offset(&self, index: u8, action_idx: u16) -> Option<u16> {
        let m = self.get_macro(index)?;
        if action_idx >= m.action_count {
            return None;
        }
        let mut offset = m.first_action_offset;
        for _ in 0..action_idx {
            let (_, next) = self.action_at(offset)?;
            offset = next;
        }
        Some(offset)
    }

    pub fn text_byte(&self, offset: u16, idx: u16) -> u8 {
        self.bytecode[..self.bytecode_len]
            .get(offset as usize + idx as usize)
            .copied()
            .unwrap_or(0)
    }

    pub fn text(&self, offset: u16, len: u16) -> &[u8] {
        self.read(offset as usize, len as usize).unwrap_or(&[])
    }

    /// Resolve a keymap abbreviation ("qwe", "dvk", ...) to its index.
    pub fn keymap_by_abbreviation(&self, tok: &[u8]) -> Option<u8> {
        self.keymaps[..self.keymap_count]
            .iter()
            .position(|a| {
                let trimmed = a.iter().take_while(|&&b| b != 0).count();
                &a[..trimmed] == tok
            })
            .map(|i| i as u8)
    }
}

#[cfg(test)]
#[path = "program_test.rs"]
mod test;
