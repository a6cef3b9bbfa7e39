use crate::key_states::{KeyId, KeyStates};

pub const POSTPONER_BUFFER_SIZE: usize = 20;
/// Forced-drain threshold; above this fill the cooldown is ignored.
pub const POSTPONER_MAX_FILL: usize = 15;
/// Minimum scheduler ticks between an insertion and head delivery. Two, so
/// a composite keystroke can be observed as press-then-release downstream.
pub const CYCLES_PER_ACTIVATION: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Event {
    key: KeyId,
    active: bool,
}

impl Event {
    const fn none() -> Self {
        Self {
            key: KeyId::none(),
            active: false,
        }
    }
}

/// Ring buffer of key transitions whose delivery into the logical key
/// state is deferred until chord-disambiguation logic has had time to
/// settle. FIFO order is physical occurrence order and is never violated;
/// entries leave either by delivery or by explicit consumption.
pub struct Postponer {
    buffer: [Event; POSTPONER_BUFFER_SIZE],
    position: usize,
    size: usize,
    cycles_until_activation: u8,
    last_press_time: u64,
}

impl Default for Postponer {
    fn default() -> Self {
        Self {
            buffer: [Event::none(); POSTPONER_BUFFER_SIZE],
            position: 0,
            size: 0,
            cycles_until_activation: 0,
            last_press_time: 0,
        }
    }
}

impl Postponer {
    fn pos(&self, i: usize) -> usize {
        (self.position + i) % POSTPONER_BUFFER_SIZE
    }

    /// Transitions should be routed through [`Postponer::track`] while this
    /// holds; otherwise they may be applied directly.
    pub fn is_active(&self) -> bool {
        self.size > 0 || self.cycles_until_activation > 0
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn deliverable(&self) -> bool {
        self.size > 0 && (self.cycles_until_activation == 0 || self.size > POSTPONER_MAX_FILL)
    }

    /// Appends a transition and restarts the cooldown. Returns false when
    /// the buffer is at hard capacity; the event is dropped and reported,
    /// never silently corrupted.
    pub fn track(&mut self, key: KeyId, active: bool, now: u64) -> bool {
        if self.size == POSTPONER_BUFFER_SIZE {
            crate::error!("postponer overflow, dropping event for key {}", key.id());
            return false;
        }
        self.buffer[self.pos(self.size)] = Event { key, active };
        self.size += 1;
        // restart the settle window without shortening a longer macro
        // postponement request
        self.cycles_until_activation = self.cycles_until_activation.max(CYCLES_PER_ACTIVATION);
        if active {
            self.last_press_time = now;
        }
        true
    }

    /// If the head entry refers to `key` and is ripe, delivers its recorded
    /// activation in place of the live one. Lets a same-key re-press resolve
    /// in original order while new physical activity keeps arriving; the
    /// caller still tracks the live transition behind it.
    pub fn run_key<const R: usize, const C: usize>(
        &mut self,
        key: KeyId,
        keys: &mut KeyStates<R, C>,
        now: u64,
    ) -> bool {
        if self.deliverable() && self.buffer[self.position].key == key {
            self.deliver(keys, now);
            true
        } else {
            false
        }
    }

    /// Tick-once drain: delivers the head entry when the cooldown has
    /// elapsed, at most one entry per tick. Past the fill threshold the
    /// cooldown is overridden and the queue drains down to the threshold
    /// immediately, trading chord resolution for input liveness.
    pub fn run_postponed<const R: usize, const C: usize>(
        &mut self,
        keys: &mut KeyStates<R, C>,
        now: u64,
    ) {
        if self.deliverable() {
            self.deliver(keys, now);
        }
        while self.size > POSTPONER_MAX_FILL {
            self.deliver(keys, now);
        }
    }

    /// Cooldown bookkeeping; call exactly once per scheduler tick. A no-op
    /// on an idle queue.
    pub fn finish_cycle(&mut self) {
        self.cycles_until_activation = self.cycles_until_activation.saturating_sub(1);
    }

    /// Keeps queued events undelivered for the rest of this cycle.
    pub fn postpone_current_cycle(&mut self) {
        self.cycles_until_activation = self.cycles_until_activation.max(CYCLES_PER_ACTIVATION);
    }

    /// Keeps queued events undelivered for `n` cycles beyond the minimum.
    pub fn postpone_next_cycles(&mut self, n: u8) {
        self.cycles_until_activation = self
            .cycles_until_activation
            .max(CYCLES_PER_ACTIVATION.saturating_add(n));
    }

    fn deliver<const R: usize, const C: usize>(&mut self, keys: &mut KeyStates<R, C>, now: u64) {
        if self.size == 0 {
            return;
        }
        let e = self.buffer[self.position];
        self.position = self.pos(1);
        self.size -= 1;
        keys.apply(e.key, e.active, now);
    }

    /// Number of queued presses; releases are not counted.
    pub fn pending_keypress_count(&self) -> usize {
        (0..self.size)
            .filter(|&i| self.buffer[self.pos(i)].active)
            .count()
    }

    /// Identity of the idx-th queued press.
    pub fn pending_id(&self, idx: usize) -> Option<u16> {
        (0..self.size)
            .map(|i| self.buffer[self.pos(i)])
            .filter(|e| e.active)
            .nth(idx)
            .map(|e| e.key.id())
    }

    /// Is a release for `key` queued anywhere in the buffer?
    pub fn is_key_released(&self, key: KeyId) -> bool {
        (0..self.size)
            .map(|i| self.buffer[self.pos(i)])
            .any(|e| !e.active && e.key == key)
    }

    pub fn last_press_time(&self) -> u64 {
        self.last_press_time
    }

    /// Removes up to `count` press-plus-optional-release pairs from the
    /// front. A consumed press whose release is not yet queued leaves the
    /// key record suppressed (when `suppress`) so the eventual physical
    /// release is swallowed too.
    pub fn consume_pending_keypresses<const R: usize, const C: usize>(
        &mut self,
        count: usize,
        suppress: bool,
        keys: &mut KeyStates<R, C>,
    ) {
        for _ in 0..count {
            if !self.consume_one_keypress(suppress, keys) {
                break;
            }
        }
    }

    fn consume_one_keypress<const R: usize, const C: usize>(
        &mut self,
        suppress: bool,
        keys: &mut KeyStates<R, C>,
    ) -> bool {
        let mut shifting_by = 0;
        let mut consumed: Option<KeyId> = None;
        let mut release_found = false;
        for i in 0..self.size {
            let e = self.buffer[self.pos(i)];
            if release_found {
                self.buffer[self.pos(i - shifting_by)] = e;
                continue;
            }
            if e.active && consumed.is_none() {
                consumed = Some(e.key);
                shifting_by += 1;
            } else if !e.active && consumed == Some(e.key) {
                shifting_by += 1;
                release_found = true;
            } else {
                self.buffer[self.pos(i - shifting_by)] = e;
            }
        }
        self.size -= shifting_by;
        if suppress && !release_found {
            if let Some(key) = consumed {
                keys.suppress(key);
            }
        }
        consumed.is_some()
    }
}

#[cfg(test)]
#[path = "postponer_test.rs"]
mod test;
