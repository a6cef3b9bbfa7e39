use embassy_sync::blocking_mutex::raw::RawMutex;

use cleave_common::{
    keycodes::{char_needs_shift, char_to_scancode, modifier},
    macro_wire::COMMAND_PREFIX,
};

use crate::{
    key_states::{KeyId, KeyStates},
    layer_stack::{LayerId, LayerStack},
    postponer::Postponer,
    program::{LoadError, MacroAction, Program, SubAction},
    recorder::Recorder,
    reports::{KeystrokeKind, MacroReports},
    runner::{HostChannel, HostEvent, Notice},
    status::StatusBuffer,
};

pub(crate) mod commands;

pub const MACRO_STATE_POOL_SIZE: usize = 5;
pub const MACRO_REGISTER_COUNT: usize = 32;

/// Two taps of the same macro within this window count as a double tap.
pub(crate) const DOUBLETAP_TIMEOUT_MS: u64 = 250;
/// Release debounce floor for delayUntilRelease.
pub(crate) const RELEASE_DEBOUNCE_MS: u64 = 50;

/// Outcome of advancing one action by one tick. `Continue` is the
/// cooperative suspension point: the context stays at the same action and
/// resumes from its persisted sub-state next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    Continue,
    Complete,
    Break,
}

/// One in-flight macro invocation. Everything a multi-tick action needs to
/// resume lives here; processors never stash state elsewhere, so any number
/// of contexts can interleave.
pub struct MacroState {
    pub(crate) playing: bool,
    pub(crate) interrupted: bool,
    pub(crate) slot: u8,
    pub(crate) macro_index: u8,
    pub(crate) action_index: u16,
    pub(crate) action_count: u16,
    next_offset: u16,
    current_action: MacroAction,
    pub(crate) key: KeyId,
    pub(crate) start_time: u64,

    key_press_phase: u8,
    press_started: bool,
    in_motion: bool,
    pub(crate) dispatch_text_index: u16,
    pub(crate) dispatch_report_phase: u8,
    pub(crate) condition_passed: bool,
    pub(crate) delay_active: bool,
    pub(crate) delay_start: u64,
    pub(crate) hold_active: bool,
    pub(crate) hold_layer: LayerId,
    pub(crate) resolve_phase2_start: u64,
    pub(crate) jumped: bool,

    pub(crate) reports: MacroReports,
    pub(crate) reports_used: bool,
}

impl Default for MacroState {
    fn default() -> Self {
        Self {
            playing: false,
            interrupted: false,
            slot: 0,
            macro_index: 0,
            action_index: 0,
            action_count: 0,
            next_offset: 0,
            current_action: MacroAction::Noop,
            key: KeyId::none(),
            start_time: 0,
            key_press_phase: 0,
            press_started: false,
            in_motion: false,
            dispatch_text_index: 0,
            dispatch_report_phase: 0,
            condition_passed: false,
            delay_active: false,
            delay_start: 0,
            hold_active: false,
            hold_layer: LayerId::Base,
            resolve_phase2_start: 0,
            jumped: false,
            reports: MacroReports::default(),
            reports_used: false,
        }
    }
}

impl MacroState {
    fn reset_action_state(&mut self) {
        self.key_press_phase = 0;
        self.press_started = false;
        self.in_motion = false;
        self.dispatch_text_index = 0;
        self.dispatch_report_phase = 0;
        self.condition_passed = false;
        self.delay_active = false;
        self.resolve_phase2_start = 0;
    }
}

/// The macro interpreter plus the shared state it arbitrates: key table,
/// postponement queue, layer stack, registers, status text and recorder.
/// Advanced cooperatively, once per scheduler tick.
pub struct Engine<
    'c,
    const ROWS: usize,
    const COLS: usize,
    const PROG_SIZE: usize,
    M: RawMutex,
    const HOST_N: usize,
> {
    pub(crate) program: Program<PROG_SIZE>,
    pub(crate) keys: KeyStates<ROWS, COLS>,
    pub(crate) postponer: Postponer,
    pub(crate) layers: LayerStack,
    pub(crate) states: [MacroState; MACRO_STATE_POOL_SIZE],
    pub(crate) registers: [i32; MACRO_REGISTER_COUNT],
    pub(crate) status: StatusBuffer,
    pub(crate) recorder: Recorder,
    pub(crate) report_owner: Option<u8>,
    pub(crate) had_report_owner: bool,
    pub(crate) previous_macro_index: u8,
    pub(crate) previous_macro_end_time: u64,
    pub(crate) last_keymap: u8,
    pub(crate) host: &'c HostChannel<M, HOST_N>,
    pub(crate) now: u64,
}

impl<'c, const ROWS: usize, const COLS: usize, const PROG_SIZE: usize, M: RawMutex, const HOST_N: usize>
    Engine<'c, ROWS, COLS, PROG_SIZE, M, HOST_N>
{
    pub fn new(host: &'c HostChannel<M, HOST_N>) -> Self {
        Self {
            program: Program::default(),
            keys: KeyStates::default(),
            postponer: Postponer::default(),
            layers: LayerStack::default(),
            states: Default::default(),
            registers: [0; MACRO_REGISTER_COUNT],
            status: StatusBuffer::default(),
            recorder: Recorder::default(),
            report_owner: None,
            had_report_owner: false,
            previous_macro_index: 0,
            previous_macro_end_time: 0,
            last_keymap: 0,
            host,
            now: 0,
        }
    }

    pub fn load_program(&mut self, image: impl IntoIterator<Item = u8>) -> Result<(), LoadError> {
        self.program.load(image)
    }

    pub fn key_states(&self) -> &KeyStates<ROWS, COLS> {
        &self.keys
    }

    pub fn status(&self) -> &StatusBuffer {
        &self.status
    }

    pub fn any_playing(&self) -> bool {
        self.states.iter().any(|s| s.playing)
    }

    /// Physical transition intake from the matrix scanner. While the queue
    /// is live, transitions are tracked instead of applied, after letting a
    /// ripe same-key head entry out first so re-presses resolve in order.
    pub fn key_event(&mut self, key: KeyId, active: bool, now: u64) {
        self.now = now;
        if active {
            for s in self.states.iter_mut() {
                if s.playing && s.key != key {
                    s.interrupted = true;
                }
            }
        }
        if self.postponer.is_active() {
            self.postponer.run_key(key, &mut self.keys, now);
            self.postponer.track(key, active, now);
        } else {
            self.keys.apply(key, active, now);
        }
    }

    /// Broadcast cancellation to every playing context.
    pub fn signal_interrupt(&mut self) {
        for s in self.states.iter_mut() {
            if s.playing {
                s.interrupted = true;
            }
        }
    }

    /// Allocate a context from the pool and begin at action 0. With no free
    /// slot the request is reported and dropped.
    pub fn start_macro(&mut self, index: u8, key: KeyId, now: u64) {
        self.now = now;
        let Some(mref) = self.program.get_macro(index) else {
            self.report_error_num("unknown macro", index as i32);
            return;
        };
        if mref.action_count == 0 {
            return;
        }
        let Some(slot) = self.states.iter().position(|s| !s.playing) else {
            self.report_error_num("too many macros", index as i32);
            return;
        };
        let mut st = MacroState {
            playing: true,
            slot: slot as u8,
            macro_index: index,
            key,
            start_time: now,
            action_count: mref.action_count,
            ..Default::default()
        };
        self.decode_action(&mut st, mref.first_action_offset);
        self.states[slot] = st;
    }

    /// One scheduler tick: postponer drain, context advance, cooldown and
    /// key rollover bookkeeping.
    pub fn tick(&mut self, now: u64) {
        self.now = now;
        self.postponer.run_postponed(&mut self.keys, now);
        for slot in 0..MACRO_STATE_POOL_SIZE {
            if self.states[slot].playing {
                self.continue_macro(slot);
            }
        }
        if self.recorder.is_recording() {
            if let Some(owner) = self.report_owner {
                let basic = self.states[owner as usize].reports.basic;
                self.recorder.record_report(&basic);
            }
        }
        self.postponer.finish_cycle();
        self.keys.finish_tick();
    }

    fn continue_macro(&mut self, slot: usize) {
        // the context leaves the arena while it runs, so processors can
        // borrow the rest of the engine freely
        let mut st = core::mem::take(&mut self.states[slot]);
        match self.process_action(&mut st) {
            Progress::Continue => {}
            Progress::Complete => {
                if st.jumped {
                    st.jumped = false;
                } else {
                    st.action_index += 1;
                    if st.action_index >= st.action_count {
                        self.finish_macro(&mut st);
                    } else {
                        let offset = st.next_offset;
                        self.decode_action(&mut st, offset);
                        st.reset_action_state();
                    }
                }
            }
            Progress::Break => self.finish_macro(&mut st),
        }
        self.states[slot] = st;
    }

    fn finish_macro(&mut self, st: &mut MacroState) {
        self.end_hold(st);
        if st.reports_used && self.report_owner == Some(st.slot) {
            self.report_owner = None;
        }
        self.previous_macro_index = st.macro_index;
        self.previous_macro_end_time = self.now;
        st.playing = false;
    }

    fn decode_action(&mut self, st: &mut MacroState, offset: u16) {
        match self.program.action_at(offset) {
            Some((action, next)) => {
                st.current_action = action;
                st.next_offset = next;
            }
            None => {
                // load validation makes this unreachable for in-range jumps
                crate::error!("undecodable action at {}", offset);
                st.current_action = MacroAction::Noop;
                st.next_offset = offset;
            }
        }
    }

    fn process_action(&mut self, st: &mut MacroState) -> Progress {
        match st.current_action {
            MacroAction::Noop => Progress::Complete,
            MacroAction::Key {
                sub,
                kind,
                scancode,
                modifiers,
            } => self.process_key_action(st, sub, kind, scancode, modifiers),
            MacroAction::MouseButton { sub, buttons } => {
                self.process_mouse_button_action(st, sub, buttons)
            }
            MacroAction::MoveMouse { x, y } => self.process_mouse_motion(st, x, y, false),
            MacroAction::ScrollMouse { x, y } => self.process_mouse_motion(st, x, y, true),
            MacroAction::Delay { ms } => self.process_delay_action(st, ms as u64),
            MacroAction::Text { offset, len } => {
                if len > 0 && self.program.text_byte(offset, 0) == COMMAND_PREFIX {
                    self.process_command_action(st, offset, len)
                } else {
                    self.process_text_action(st, offset, len)
                }
            }
        }
    }

    /// Single-writer arbitration for the outgoing reports. The claim is
    /// held until the owning context finishes; contenders stall.
    pub(crate) fn claim_reports(&mut self, st: &mut MacroState) -> bool {
        match self.report_owner {
            None => {
                self.report_owner = Some(st.slot);
                st.reports_used = true;
                true
            }
            Some(owner) => owner == st.slot,
        }
    }

    // Press keeps modifier-before-scancode ordering: a settle tick between
    // phase 0 and 1 guarantees downstream consumers see the modifier first.
    fn process_key_action(
        &mut self,
        st: &mut MacroState,
        sub: SubAction,
        kind: KeystrokeKind,
        scancode: u16,
        modifiers: u8,
    ) -> Progress {
        if !self.claim_reports(st) {
            return Progress::Continue;
        }
        if sub == SubAction::Release {
            st.reports.delete_modifiers(modifiers);
            st.reports.delete_scancode(kind, scancode);
            return Progress::Complete;
        }
        loop {
            match st.key_press_phase {
                0 => {
                    st.reports.add_modifiers(modifiers);
                    st.key_press_phase = 1;
                    if modifiers != 0 {
                        return Progress::Continue;
                    }
                }
                1 => {
                    st.reports.add_scancode(kind, scancode);
                    st.key_press_phase = 2;
                    if sub == SubAction::Press {
                        return Progress::Complete;
                    }
                    return Progress::Continue;
                }
                2 => {
                    if sub == SubAction::Hold && self.keys.is_active(st.key) && !st.interrupted {
                        return Progress::Continue;
                    }
                    st.key_press_phase = 3;
                }
                _ => {
                    st.reports.delete_modifiers(modifiers);
                    st.reports.delete_scancode(kind, scancode);
                    return Progress::Complete;
                }
            }
        }
    }

    fn process_mouse_button_action(
        &mut self,
        st: &mut MacroState,
        sub: SubAction,
        buttons: u8,
    ) -> Progress {
        if !self.claim_reports(st) {
            return Progress::Continue;
        }
        match sub {
            SubAction::Tap => {
                if !st.press_started {
                    st.press_started = true;
                    st.reports.set_mouse(|m| m.buttons |= buttons);
                    Progress::Continue
                } else {
                    st.reports.set_mouse(|m| m.buttons &= !buttons);
                    Progress::Complete
                }
            }
            SubAction::Press => {
                st.reports.set_mouse(|m| m.buttons |= buttons);
                Progress::Complete
            }
            SubAction::Release => {
                st.reports.set_mouse(|m| m.buttons &= !buttons);
                Progress::Complete
            }
            SubAction::Hold => {
                if !st.press_started {
                    st.press_started = true;
                    st.reports.set_mouse(|m| m.buttons |= buttons);
                    Progress::Continue
                } else if self.keys.is_active(st.key) && !st.interrupted {
                    Progress::Continue
                } else {
                    st.reports.set_mouse(|m| m.buttons &= !buttons);
                    Progress::Complete
                }
            }
        }
    }

    fn process_mouse_motion(&mut self, st: &mut MacroState, x: i16, y: i16, scroll: bool) -> Progress {
        if !self.claim_reports(st) {
            return Progress::Continue;
        }
        if st.in_motion {
            st.reports.set_mouse(|m| {
                if scroll {
                    m.wheel_x = 0;
                    m.wheel_y = 0;
                } else {
                    m.x = 0;
                    m.y = 0;
                }
            });
            Progress::Complete
        } else {
            st.in_motion = true;
            st.reports.set_mouse(|m| {
                if scroll {
                    m.wheel_x = x;
                    m.wheel_y = y;
                } else {
                    m.x = x;
                    m.y = y;
                }
            });
            Progress::Continue
        }
    }

    pub(crate) fn process_delay_action(&mut self, st: &mut MacroState, ms: u64) -> Progress {
        if st.delay_active {
            if self.elapsed(st.delay_start) >= ms {
                st.delay_active = false;
                return Progress::Complete;
            }
        } else {
            st.delay_start = self.now;
            st.delay_active = true;
        }
        Progress::Continue
    }

    fn process_text_action(&mut self, st: &mut MacroState, offset: u16, len: u16) -> Progress {
        if !self.claim_reports(st) {
            return Progress::Continue;
        }
        let ch = self.program.text_byte(offset, st.dispatch_text_index);
        Self::dispatch_step(st, len, ch)
    }

    /// One tick of keystroke dispatch: a single-key report, then an empty
    /// report, per character. Never co-locates duplicate scancodes.
    pub(crate) fn dispatch_step(st: &mut MacroState, len: u16, ch: u8) -> Progress {
        if st.dispatch_text_index >= len {
            st.dispatch_text_index = 0;
            st.dispatch_report_phase = 0;
            st.reports.clear_basic();
            return Progress::Complete;
        }
        if st.dispatch_report_phase == 1 {
            st.reports.clear_basic();
            st.dispatch_report_phase = 0;
            st.dispatch_text_index += 1;
            return Progress::Continue;
        }
        st.reports.clear_basic();
        st.reports
            .add_scancode(KeystrokeKind::Basic, char_to_scancode(ch) as u16);
        if char_needs_shift(ch) {
            st.reports.add_modifiers(modifier::LEFT_SHIFT);
        }
        st.dispatch_report_phase = 1;
        Progress::Continue
    }

    pub(crate) fn end_hold(&mut self, st: &mut MacroState) {
        if st.hold_active {
            let before = self.layers.active();
            self.layers.release_held(st.hold_layer);
            st.hold_active = false;
            self.emit_layer_change(before);
        }
    }

    pub(crate) fn emit_layer_change(&mut self, before: (LayerId, u8)) {
        let after = self.layers.active();
        if after != before {
            self.host.report(HostEvent::SwitchLayer {
                layer: after.0,
                keymap: after.1,
            });
        }
    }

    pub(crate) fn elapsed(&self, since: u64) -> u64 {
        self.now.saturating_sub(since)
    }

    pub(crate) fn report_error(&mut self, msg: &str) {
        crate::error!("{}", msg);
        self.status.push_str(msg);
        self.status.push_str("\n");
        self.host.report(HostEvent::Notice(Notice::Error));
    }

    pub(crate) fn report_error_token(&mut self, msg: &str, tok: &[u8]) {
        crate::error!("{}: {}", msg, core::str::from_utf8(tok).unwrap_or("?"));
        self.status.push_str(msg);
        self.status.push_str(": ");
        self.status.push_bytes(tok);
        self.status.push_str("\n");
        self.host.report(HostEvent::Notice(Notice::Error));
    }

    pub(crate) fn report_error_num(&mut self, msg: &str, n: i32) {
        crate::error!("{}: {}", msg, n);
        self.status.push_str(msg);
        self.status.push_str(" ");
        self.status.push_num(n);
        self.status.push_str("\n");
        self.host.report(HostEvent::Notice(Notice::Error));
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod test;
