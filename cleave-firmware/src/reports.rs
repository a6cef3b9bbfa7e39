pub const BASIC_KEYBOARD_MAX_KEYS: usize = 6;
pub const MEDIA_KEYBOARD_MAX_KEYS: usize = 4;
pub const SYSTEM_KEYBOARD_MAX_KEYS: usize = 4;

/// Which report buffer a scancode is staged into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeystrokeKind {
    Basic,
    Media,
    System,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BasicReport {
    pub modifiers: u8,
    pub scancodes: [u8; BASIC_KEYBOARD_MAX_KEYS],
}

impl BasicReport {
    pub fn is_empty(&self) -> bool {
        self.modifiers == 0 && self.scancodes.iter().all(|&s| s == 0)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MediaReport {
    pub scancodes: [u16; MEDIA_KEYBOARD_MAX_KEYS],
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemReport {
    pub scancodes: [u8; SYSTEM_KEYBOARD_MAX_KEYS],
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    pub buttons: u8,
    pub x: i16,
    pub y: i16,
    pub wheel_x: i16,
    pub wheel_y: i16,
}

// Insertion is first-free-slot and refuses duplicates; deletion is
// match-and-clear. Zero is not a key.
fn add_code<T: Copy + PartialEq + Default>(slots: &mut [T], code: T) {
    if code == T::default() || slots.iter().any(|&s| s == code) {
        return;
    }
    if let Some(slot) = slots.iter_mut().find(|s| **s == T::default()) {
        *slot = code;
    }
}

fn del_code<T: Copy + PartialEq + Default>(slots: &mut [T], code: T) {
    if code == T::default() {
        return;
    }
    if let Some(slot) = slots.iter_mut().find(|s| **s == code) {
        *slot = T::default();
    }
}

/// Per-context staging buffers for the four outgoing HID reports. Zeroed
/// when a context starts and when a text-dispatch cycle completes; the
/// merge into the wire report belongs to the USB collaborator.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacroReports {
    pub basic: BasicReport,
    pub media: MediaReport,
    pub system: SystemReport,
    pub mouse: MouseReport,
    dirty: bool,
}

impl MacroReports {
    pub fn add_scancode(&mut self, kind: KeystrokeKind, scancode: u16) {
        match kind {
            KeystrokeKind::Basic => add_code(&mut self.basic.scancodes, scancode as u8),
            KeystrokeKind::Media => add_code(&mut self.media.scancodes, scancode),
            KeystrokeKind::System => add_code(&mut self.system.scancodes, scancode as u8),
        }
        self.dirty = true;
    }

    pub fn delete_scancode(&mut self, kind: KeystrokeKind, scancode: u16) {
        match kind {
            KeystrokeKind::Basic => del_code(&mut self.basic.scancodes, scancode as u8),
            KeystrokeKind::Media => del_code(&mut self.media.scancodes, scancode),
            KeystrokeKind::System => del_code(&mut self.system.scancodes, scancode as u8),
        }
        self.dirty = true;
    }

    pub fn add_modifiers(&mut self, modifiers: u8) {
        self.basic.modifiers |= modifiers;
        self.dirty = true;
    }

    pub fn delete_modifiers(&mut self, modifiers: u8) {
        self.basic.modifiers &= !modifiers;
        self.dirty = true;
    }

    pub fn set_mouse<F: FnOnce(&mut MouseReport)>(&mut self, f: F) {
        f(&mut self.mouse);
        self.dirty = true;
    }

    pub fn set_basic(&mut self, basic: BasicReport) {
        self.basic = basic;
        self.dirty = true;
    }

    pub fn clear_basic(&mut self) {
        self.basic = BasicReport::default();
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        *self = Self {
            dirty: true,
            ..Self::default()
        };
    }

    /// True once per mutation batch; the runner snapshots on it.
    pub fn take_dirty(&mut self) -> bool {
        core::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
#[path = "reports_test.rs"]
mod test;
