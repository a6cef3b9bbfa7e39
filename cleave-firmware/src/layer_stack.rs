pub const LAYER_STACK_SIZE: usize = 10;

pub const BASE_KEYMAP: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LayerId {
    #[default]
    Base,
    Mod,
    Fn,
    Mouse,
}

impl LayerId {
    pub fn from_token(tok: &[u8]) -> Option<Self> {
        Some(match tok {
            b"base" => Self::Base,
            b"mod" => Self::Mod,
            b"fn" => Self::Fn,
            b"mouse" => Self::Mouse,
            _ => return None,
        })
    }

    pub fn index(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Clone, Copy)]
struct Record {
    layer: LayerId,
    keymap: u8,
    held: bool,
    removed: bool,
}

impl Record {
    const fn base() -> Self {
        Self {
            layer: LayerId::Base,
            keymap: BASE_KEYMAP,
            held: false,
            removed: false,
        }
    }
}

/// Circular stack of active layer+keymap records. Deletion is lazy: pops
/// and hold expiry flag records `removed` and the stack unwinds flagged
/// entries from the top, so the two paths can interleave without losing
/// entries underneath. The stack never drops below one base record.
pub struct LayerStack {
    records: [Record; LAYER_STACK_SIZE],
    top: usize,
    size: usize,
    last_layer: LayerId,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self {
            records: [Record::base(); LAYER_STACK_SIZE],
            top: 0,
            size: 1,
            last_layer: LayerId::Base,
        }
    }
}

impl LayerStack {
    /// The active layer and keymap; always defined.
    pub fn active(&self) -> (LayerId, u8) {
        let r = &self.records[self.top];
        (r.layer, r.keymap)
    }

    /// The layer that was active before the most recent switch.
    pub fn last_layer(&self) -> LayerId {
        self.last_layer
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn push(&mut self, layer: LayerId, keymap: u8, held: bool) {
        self.last_layer = self.records[self.top].layer;
        self.top = (self.top + 1) % LAYER_STACK_SIZE;
        self.records[self.top] = Record {
            layer,
            keymap,
            held,
            removed: false,
        };
        if self.size < LAYER_STACK_SIZE {
            self.size += 1;
        }
    }

    /// Removes entries flagged `removed` from the top downward.
    /// `force_remove_top` flags the current top first; `match_toggled`
    /// instead flags the nearest non-held, non-removed entry, so a toggled
    /// layer can be switched off from under a held one.
    pub fn pop(&mut self, force_remove_top: bool, match_toggled: bool) -> bool {
        let before = self.active();
        self.last_layer = before.0;
        if force_remove_top {
            self.records[self.top].removed = true;
        }
        if match_toggled {
            for i in 0..self.size {
                let idx = (self.top + LAYER_STACK_SIZE - i) % LAYER_STACK_SIZE;
                let r = &mut self.records[idx];
                if !r.held && !r.removed {
                    r.removed = true;
                    break;
                }
            }
        }
        self.unwind();
        self.active() != before
    }

    /// Hold expiry: flags the topmost held record for `layer` and unwinds.
    pub fn release_held(&mut self, layer: LayerId) -> bool {
        let before = self.active();
        for i in 0..self.size {
            let idx = (self.top + LAYER_STACK_SIZE - i) % LAYER_STACK_SIZE;
            let r = &mut self.records[idx];
            if r.held && !r.removed && r.layer == layer {
                r.removed = true;
                break;
            }
        }
        self.last_layer = before.0;
        self.unwind();
        self.active() != before
    }

    /// Switches the keymap of the active record.
    pub fn set_keymap(&mut self, keymap: u8) {
        self.records[self.top].keymap = keymap;
    }

    fn unwind(&mut self) {
        while self.size > 1 && self.records[self.top].removed {
            self.top = (self.top + LAYER_STACK_SIZE - 1) % LAYER_STACK_SIZE;
            self.size -= 1;
        }
        // exhausted; fall back to a synthetic base record
        if self.records[self.top].removed {
            self.records[self.top] = Record::base();
        }
    }
}

#[cfg(test)]
#[path = "layer_stack_test.rs"]
mod test;
