/// Stable identity of a physical switch: its position in the backing
/// matrix, packed row-high/column-low. Queue entries and macro contexts
/// hold these handles, never references into the key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyId(u16);

impl KeyId {
    pub const fn new(row: u8, col: u8) -> Self {
        Self(((row as u16) << 8) | col as u16)
    }

    pub const fn none() -> Self {
        Self(0xffff)
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0xffff
    }

    pub fn row(&self) -> usize {
        (self.0 >> 8) as usize
    }

    pub fn column(&self) -> usize {
        (self.0 & 0xff) as usize
    }

    pub fn id(&self) -> u16 {
        self.0
    }

    pub fn from_id(id: u16) -> Self {
        Self(id)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct KeyState {
    active: bool,
    previous: bool,
    suppressed: bool,
    press_time: u64,
}

impl KeyState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn press_time(&self) -> u64 {
        self.press_time
    }
}

/// Logical key-state table. The matrix scanner owns the physical debounced
/// state; this table holds the logical (reportable) state those transitions
/// resolve into, possibly later than they physically occurred.
pub struct KeyStates<const ROWS: usize, const COLS: usize> {
    keys: [[KeyState; COLS]; ROWS],
}

impl<const ROWS: usize, const COLS: usize> Default for KeyStates<ROWS, COLS> {
    fn default() -> Self {
        Self {
            keys: [[KeyState::default(); COLS]; ROWS],
        }
    }
}

impl<const ROWS: usize, const COLS: usize> KeyStates<ROWS, COLS> {
    pub fn get(&self, key: KeyId) -> Option<&KeyState> {
        self.keys.get(key.row()).and_then(|r| r.get(key.column()))
    }

    fn get_mut(&mut self, key: KeyId) -> Option<&mut KeyState> {
        self.keys
            .get_mut(key.row())
            .and_then(|r| r.get_mut(key.column()))
    }

    /// Resolve a transition into the logical state. A suppressed key
    /// swallows its release (clearing the flag) instead of reporting it.
    pub fn apply(&mut self, key: KeyId, active: bool, now: u64) {
        let Some(k) = self.get_mut(key) else {
            crate::error!("invalid key {}", key.id());
            return;
        };
        if k.suppressed {
            if !active {
                k.suppressed = false;
            }
            return;
        }
        if active && !k.active {
            k.press_time = now;
        }
        k.active = active;
    }

    /// Marks the key so its pending physical release is never reported.
    pub fn suppress(&mut self, key: KeyId) {
        if let Some(k) = self.get_mut(key) {
            k.suppressed = true;
        }
    }

    pub fn is_active(&self, key: KeyId) -> bool {
        self.get(key).is_some_and(|k| k.active)
    }

    pub fn activated_now(&self, key: KeyId) -> bool {
        self.get(key).is_some_and(|k| k.active && !k.previous)
    }

    pub fn deactivated_now(&self, key: KeyId) -> bool {
        self.get(key).is_some_and(|k| !k.active && k.previous)
    }

    /// Rolls current state into previous; call once per tick, last.
    pub fn finish_tick(&mut self) {
        for row in self.keys.iter_mut() {
            for k in row.iter_mut() {
                k.previous = k.active;
            }
        }
    }
}

#[cfg(test)]
#[path = "key_states_test.rs"]
mod test;
