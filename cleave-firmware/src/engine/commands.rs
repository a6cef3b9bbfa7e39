use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::{
    engine::{
        Engine, MacroState, Progress, DOUBLETAP_TIMEOUT_MS, MACRO_REGISTER_COUNT,
        RELEASE_DEBOUNCE_MS,
    },
    key_states::KeyId,
    layer_stack::LayerId,
    runner::{HostEvent, Notice},
};

pub(crate) const COMMAND_LINE_MAX: usize = 256;

/// Space-delimited token scanner over one command line. Bytes at or below
/// space are delimiters, as in the stored text payloads.
pub(crate) struct Tokens<'a> {
    rest: &'a [u8],
}

impl<'a> Tokens<'a> {
    pub(crate) fn new(line: &'a [u8]) -> Self {
        Self { rest: line }
    }

    /// The unconsumed remainder, leading delimiters trimmed.
    pub(crate) fn rest(&self) -> &'a [u8] {
        let mut r = self.rest;
        while let [b, tail @ ..] = r {
            if *b <= b' ' {
                r = tail;
            } else {
                break;
            }
        }
        r
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let r = self.rest();
        if r.is_empty() {
            self.rest = r;
            return None;
        }
        let len = r.iter().position(|&b| b <= b' ').unwrap_or(r.len());
        self.rest = &r[len..];
        Some(&r[..len])
    }
}

fn parse_decimal(tok: &[u8]) -> Option<i32> {
    if tok.is_empty() {
        return None;
    }
    let mut v: i32 = 0;
    for &b in tok {
        if !b.is_ascii_digit() {
            return None;
        }
        v = v.checked_mul(10)?.checked_add((b - b'0') as i32)?;
    }
    Some(v)
}

fn signed_decimal(tok: &[u8]) -> Option<i32> {
    match tok {
        [b'-', rest @ ..] => Some(-parse_decimal(rest)?),
        _ => parse_decimal(tok),
    }
}

impl<'c, const ROWS: usize, const COLS: usize, const PROG_SIZE: usize, M: RawMutex, const HOST_N: usize>
    Engine<'c, ROWS, COLS, PROG_SIZE, M, HOST_N>
{
    pub(crate) fn process_command_action(
        &mut self,
        st: &mut MacroState,
        offset: u16,
        len: u16,
    ) -> Progress {
        let mut buf = [0u8; COMMAND_LINE_MAX];
        let n = {
            let text = self.program.text(offset, len).get(1..).unwrap_or(&[]);
            if text.len() > COMMAND_LINE_MAX {
                usize::MAX
            } else {
                buf[..text.len()].copy_from_slice(text);
                text.len()
            }
        };
        if n == usize::MAX {
            self.report_error("command too long");
            return Progress::Complete;
        }
        self.dispatch_command_line(st, &buf[..n])
    }

    // The command loop is re-entered from the top every tick; conditionals
    // and register writes keep scanning the line, everything else returns
    // its own result as the action's result.
    pub(crate) fn dispatch_command_line(&mut self, st: &mut MacroState, line: &[u8]) -> Progress {
        let mut toks = Tokens::new(line);
        while let Some(cmd) = toks.next() {
            match cmd {
                b"break" => return Progress::Break,
                b"goTo" => {
                    let Some(adr) = self.int_token(st, toks.next()) else {
                        return Progress::Complete;
                    };
                    return self.jump(st, adr);
                }
                b"switchKeymap" => return self.cmd_switch_keymap(toks.next()),
                b"switchLayer" => return self.cmd_switch_layer(toks.next()),
                b"untoggleLayer" => {
                    let before = self.layers.active();
                    self.layers.pop(false, true);
                    self.emit_layer_change(before);
                    return Progress::Complete;
                }
                b"holdLayer" => return self.cmd_hold_layer(st, toks.next(), None),
                b"holdLayerMax" => {
                    let layer = toks.next();
                    let Some(t) = self.int_token(st, toks.next()) else {
                        return Progress::Complete;
                    };
                    return self.cmd_hold_layer(st, layer, Some(t.max(0) as u64));
                }
                b"delayUntil" => {
                    let Some(t) = self.int_token(st, toks.next()) else {
                        return Progress::Complete;
                    };
                    return self.process_delay_action(st, t.max(0) as u64);
                }
                b"delayUntilRelease" => return self.cmd_delay_until_release(st, None),
                b"delayUntilReleaseMax" => {
                    let Some(t) = self.int_token(st, toks.next()) else {
                        return Progress::Complete;
                    };
                    return self.cmd_delay_until_release(st, Some(t.max(0) as u64));
                }
                b"recordMacro" => return self.cmd_record_macro(st, toks.next()),
                b"playMacro" => return self.cmd_play_macro(st, toks.next()),
                b"printStatus" => return self.cmd_print_status(st),
                b"reportError" => {
                    self.status.push_bytes(toks.rest());
                    self.status.push_str("\n");
                    return Progress::Complete;
                }
                b"consumePending" => {
                    let Some(n) = self.int_token(st, toks.next()) else {
                        return Progress::Complete;
                    };
                    self.postponer
                        .consume_pending_keypresses(n.max(0) as usize, true, &mut self.keys);
                    return Progress::Complete;
                }
                b"postponeKeys" => self.postponer.postpone_current_cycle(),
                b"postponeNext" => {
                    let Some(n) = self.int_token(st, toks.next()) else {
                        return Progress::Complete;
                    };
                    self.postponer
                        .postpone_next_cycles(n.clamp(0, u8::MAX as i32) as u8);
                }
                b"resolveSecondary" => return self.cmd_resolve_secondary(st, &mut toks),
                b"setReg" => {
                    let Some((i, v)) = self.reg_args(st, &mut toks) else {
                        return Progress::Complete;
                    };
                    self.registers[i] = v;
                }
                b"addReg" => {
                    let Some((i, v)) = self.reg_args(st, &mut toks) else {
                        return Progress::Complete;
                    };
                    self.registers[i] = self.registers[i].wrapping_add(v);
                }
                b"mulReg" => {
                    let Some((i, v)) = self.reg_args(st, &mut toks) else {
                        return Progress::Complete;
                    };
                    self.registers[i] = self.registers[i].wrapping_mul(v);
                }
                b"ifRegEq" | b"ifNotRegEq" => {
                    let Some((i, v)) = self.reg_args(st, &mut toks) else {
                        return Progress::Complete;
                    };
                    if !Self::cond(st, self.registers[i] == v, cmd[2] == b'N') {
                        return Progress::Complete;
                    }
                }
                b"ifDoubletap" | b"ifNotDoubletap" => {
                    let v = self.elapsed(self.previous_macro_end_time) <= DOUBLETAP_TIMEOUT_MS
                        && st.macro_index == self.previous_macro_index;
                    if !Self::cond(st, v, cmd[2] == b'N') {
                        return Progress::Complete;
                    }
                }
                b"ifInterrupted" | b"ifNotInterrupted" => {
                    if !Self::cond(st, st.interrupted, cmd[2] == b'N') {
                        return Progress::Complete;
                    }
                }
                b"ifPlaytime" | b"ifNotPlaytime" => {
                    let Some(t) = self.int_token(st, toks.next()) else {
                        return Progress::Complete;
                    };
                    let v = self.elapsed(st.start_time) >= t.max(0) as u64;
                    if !Self::cond(st, v, cmd[2] == b'N') {
                        return Progress::Complete;
                    }
                }
                b"ifPending" | b"ifNotPending" => {
                    let Some(n) = self.int_token(st, toks.next()) else {
                        return Progress::Complete;
                    };
                    let v = self.postponer.pending_keypress_count() >= n.max(0) as usize;
                    if !Self::cond(st, v, cmd[2] == b'N') {
                        return Progress::Complete;
                    }
                }
                b"ifKeyPendingAt" | b"ifNotKeyPendingAt" => {
                    let Some(idx) = self.int_token(st, toks.next()) else {
                        return Progress::Complete;
                    };
                    let Some(id) = self.int_token(st, toks.next()) else {
                        return Progress::Complete;
                    };
                    let v = self.postponer.pending_id(idx.max(0) as usize) == Some(id as u16);
                    if !Self::cond(st, v, cmd[2] == b'N') {
                        return Progress::Complete;
                    }
                }
                b"ifPendingReleased" | b"ifNotPendingReleased" => {
                    let Some(idx) = self.int_token(st, toks.next()) else {
                        return Progress::Complete;
                    };
                    let v = self
                        .postponer
                        .pending_id(idx.max(0) as usize)
                        .map(KeyId::from_id)
                        .is_some_and(|k| self.postponer.is_key_released(k));
                    if !Self::cond(st, v, cmd[2] == b'N') {
                        return Progress::Complete;
                    }
                }
                _ => {
                    self.report_error_token("unrecognized command", cmd);
                    return Progress::Complete;
                }
            }
        }
        Progress::Complete
    }

    /// A passed condition is sticky for the rest of the action so a stalled
    /// command downstream keeps running even when the condition has since
    /// turned false.
    fn cond(st: &mut MacroState, value: bool, negate: bool) -> bool {
        if value != negate {
            st.condition_passed = true;
            true
        } else {
            st.condition_passed
        }
    }

    fn int_value(&self, st: &MacroState, tok: &[u8]) -> Option<i32> {
        match tok.first()? {
            b'#' => {
                let idx = parse_decimal(&tok[1..])? as usize;
                self.registers.get(idx).copied()
            }
            b'@' => Some(st.action_index as i32 + signed_decimal(&tok[1..])?),
            b'-' => Some(-self.int_value(st, &tok[1..])?),
            _ => parse_decimal(tok),
        }
    }

    /// Integer argument: decimal literal, `#N` register indirection, `@N`
    /// action-relative address, optional leading negation. Parse failures
    /// are reported and abort the command.
    fn int_token(&mut self, st: &MacroState, tok: Option<&[u8]>) -> Option<i32> {
        let Some(tok) = tok else {
            self.report_error("missing argument");
            return None;
        };
        match self.int_value(st, tok) {
            Some(v) => Some(v),
            None => {
                self.report_error_token("invalid argument", tok);
                None
            }
        }
    }

    fn reg_index(&mut self, tok: Option<&[u8]>) -> Option<usize> {
        let Some(tok) = tok else {
            self.report_error("missing register");
            return None;
        };
        match parse_decimal(tok) {
            Some(i) if (i as usize) < MACRO_REGISTER_COUNT => Some(i as usize),
            _ => {
                self.report_error_token("bad register", tok);
                None
            }
        }
    }

    fn reg_args(&mut self, st: &MacroState, toks: &mut Tokens) -> Option<(usize, i32)> {
        let i = self.reg_index(toks.next())?;
        let v = self.int_token(st, toks.next())?;
        Some((i, v))
    }

    /// Program-counter jump: re-decode from the directory-resolved offset.
    pub(crate) fn jump(&mut self, st: &mut MacroState, adr: i32) -> Progress {
        let offset = if (0..st.action_count as i32).contains(&adr) {
            self.program.action_offset(st.macro_index, adr as u16)
        } else {
            None
        };
        let Some(offset) = offset else {
            self.report_error_num("jump out of range", adr);
            return Progress::Break;
        };
        st.action_index = adr as u16;
        self.decode_action(st, offset);
        st.reset_action_state();
        st.jumped = true;
        Progress::Complete
    }

    fn cmd_switch_keymap(&mut self, tok: Option<&[u8]>) -> Progress {
        let Some(tok) = tok else {
            self.report_error("missing keymap");
            return Progress::Complete;
        };
        let active_keymap = self.layers.active().1;
        let target = if tok == b"last" {
            Some(self.last_keymap)
        } else {
            self.program.keymap_by_abbreviation(tok)
        };
        match target {
            Some(idx) => {
                self.last_keymap = active_keymap;
                self.layers.set_keymap(idx);
                self.host.report(HostEvent::SwitchKeymap(idx));
            }
            None => self.report_error_token("unknown keymap", tok),
        }
        Progress::Complete
    }

    fn cmd_switch_layer(&mut self, tok: Option<&[u8]>) -> Progress {
        let Some(tok) = tok else {
            self.report_error("missing layer");
            return Progress::Complete;
        };
        let before = self.layers.active();
        if tok == b"previous" {
            self.layers.pop(true, false);
        } else {
            let layer = if tok == b"last" {
                Some(self.layers.last_layer())
            } else {
                LayerId::from_token(tok)
            };
            let Some(layer) = layer else {
                self.report_error_token("unknown layer", tok);
                return Progress::Complete;
            };
            self.layers.push(layer, before.1, false);
        }
        self.emit_layer_change(before);
        Progress::Complete
    }

    // Held while the macro key is logically down; a postponed release has
    // not been delivered yet, so the layer correctly stays active.
    fn cmd_hold_layer(
        &mut self,
        st: &mut MacroState,
        tok: Option<&[u8]>,
        timeout: Option<u64>,
    ) -> Progress {
        if !st.hold_active {
            let Some(tok) = tok else {
                self.report_error("missing layer");
                return Progress::Complete;
            };
            let Some(layer) = LayerId::from_token(tok) else {
                self.report_error_token("unknown layer", tok);
                return Progress::Complete;
            };
            let before = self.layers.active();
            self.layers.push(layer, before.1, true);
            self.emit_layer_change(before);
            st.hold_active = true;
            st.hold_layer = layer;
            st.delay_start = self.now;
            return Progress::Continue;
        }
        let expired = timeout.is_some_and(|t| self.elapsed(st.delay_start) >= t);
        if self.keys.is_active(st.key) && !st.interrupted && !expired {
            Progress::Continue
        } else {
            self.end_hold(st);
            Progress::Complete
        }
    }

    fn cmd_delay_until_release(&mut self, st: &mut MacroState, max: Option<u64>) -> Progress {
        if !st.delay_active {
            st.delay_start = self.now;
            st.delay_active = true;
            return Progress::Continue;
        }
        let released =
            self.elapsed(st.delay_start) >= RELEASE_DEBOUNCE_MS && !self.keys.is_active(st.key);
        let expired = max.is_some_and(|t| self.elapsed(st.delay_start) >= t);
        if released || expired || st.interrupted {
            st.delay_active = false;
            Progress::Complete
        } else {
            Progress::Continue
        }
    }

    fn cmd_record_macro(&mut self, st: &MacroState, tok: Option<&[u8]>) -> Progress {
        let Some(id) = self.int_token(st, tok) else {
            return Progress::Complete;
        };
        if !(0..=u8::MAX as i32).contains(&id) {
            self.report_error_num("bad macro id", id);
            return Progress::Complete;
        }
        let notice = if self.recorder.record_smart(id as u8) {
            Notice::Recording
        } else {
            Notice::RecordingDone
        };
        self.host.report(HostEvent::Notice(notice));
        Progress::Complete
    }

    fn cmd_play_macro(&mut self, st: &mut MacroState, tok: Option<&[u8]>) -> Progress {
        if !self.claim_reports(st) {
            return Progress::Continue;
        }
        let Some(id) = self.int_token(st, tok) else {
            return Progress::Complete;
        };
        if !(0..=u8::MAX as i32).contains(&id) {
            self.report_error_num("bad macro id", id);
            return Progress::Complete;
        }
        let mut basic = st.reports.basic;
        let more = self.recorder.play_smart(id as u8, &mut basic);
        st.reports.set_basic(basic);
        if more {
            Progress::Continue
        } else {
            Progress::Complete
        }
    }

    fn cmd_print_status(&mut self, st: &mut MacroState) -> Progress {
        if !self.claim_reports(st) {
            return Progress::Continue;
        }
        let len = self.status.len().min(u16::MAX as usize) as u16;
        let ch = self.status.byte_at(st.dispatch_text_index as usize);
        let progress = Self::dispatch_step(st, len, ch);
        if progress == Progress::Complete {
            self.status.clear();
        }
        progress
    }

    fn cmd_resolve_secondary(&mut self, st: &mut MacroState, toks: &mut Tokens) -> Progress {
        let Some(t1) = self.int_token(st, toks.next()) else {
            return Progress::Complete;
        };
        let Some(t2) = self.int_token(st, toks.next()) else {
            return Progress::Complete;
        };
        let Some(primary) = self.int_token(st, toks.next()) else {
            return Progress::Complete;
        };
        let Some(secondary) = self.int_token(st, toks.next()) else {
            return Progress::Complete;
        };
        self.resolve_secondary(st, t1.max(0) as u64, t2.max(0) as u64, primary, secondary)
    }

    /// Three-phase chord disambiguation, postponing the whole time.
    ///
    /// Phase 1 waits for a resolving event: the first timeout, a queued
    /// release of the first pending key, or release of the macro key
    /// itself. Phase 2 is the safety margin re-check one tick later.
    /// Phase 3 commits; the short-circuit order favours secondary and is
    /// load-bearing for chord timing.
    fn resolve_secondary(
        &mut self,
        st: &mut MacroState,
        t1: u64,
        t2: u64,
        primary: i32,
        secondary: i32,
    ) -> Progress {
        self.postponer.postpone_current_cycle();
        let key_released =
            !self.keys.is_active(st.key) || self.postponer.is_key_released(st.key);
        let other_released = self
            .postponer
            .pending_id(0)
            .map(KeyId::from_id)
            .is_some_and(|k| self.postponer.is_key_released(k));
        let timer1 = self.elapsed(st.start_time) >= t1;
        let timer2 =
            st.resolve_phase2_start != 0 && self.elapsed(st.resolve_phase2_start) >= t2;

        if !timer1 && !other_released && !key_released && st.resolve_phase2_start == 0 {
            return Progress::Continue;
        }
        if st.resolve_phase2_start == 0 {
            st.resolve_phase2_start = self.now.max(1);
            return Progress::Continue;
        }
        if !timer1 && !timer2 && !other_released && !key_released {
            return Progress::Continue;
        }
        st.resolve_phase2_start = 0;
        if timer1 || key_released || (other_released && timer2) {
            self.jump(st, secondary)
        } else {
            // one more postponed cycle lets the resolved press propagate
            self.postponer.postpone_next_cycles(1);
            self.jump(st, primary)
        }
    }
}

#[cfg(test)]
#[path = "commands_test.rs"]
mod test;
