use crate::reports::BasicReport;

pub const MAX_RUNTIME_MACROS: usize = 32;
pub const REPORT_BUFFER_MAX_LENGTH: usize = 2048;

const EMPTY_REPORT: u8 = 0;
const BASIC_REPORT: u8 = 1;

#[derive(Debug, Default, Clone, Copy)]
struct Header {
    id: u8,
    offset: u16,
    length: u16,
}

#[derive(Debug, Clone, Copy)]
struct Playback {
    position: u16,
    end: u16,
}

/// Records the per-tick basic report stream into a bounded byte buffer
/// under small integer ids, and plays a recorded stream back one report
/// per tick. Re-recording an id appends a fresh take; exhausted space
/// stops the recording and reports, it never overruns.
pub struct Recorder {
    buffer: [u8; REPORT_BUFFER_MAX_LENGTH],
    length: usize,
    headers: [Header; MAX_RUNTIME_MACROS],
    header_count: usize,
    recording: Option<usize>,
    playback: Option<Playback>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            buffer: [0u8; REPORT_BUFFER_MAX_LENGTH],
            length: 0,
            headers: [Header::default(); MAX_RUNTIME_MACROS],
            header_count: 0,
            recording: None,
            playback: None,
        }
    }
}

impl Recorder {
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Toggles recording of `id`. Returns true when now recording.
    pub fn record_smart(&mut self, id: u8) -> bool {
        if self.recording.take().is_some() {
            return false;
        }
        let idx = match self.headers[..self.header_count]
            .iter()
            .position(|h| h.id == id)
        {
            Some(idx) => idx,
            None if self.header_count < MAX_RUNTIME_MACROS => {
                let idx = self.header_count;
                self.header_count += 1;
                idx
            }
            None => {
                crate::error!("no free runtime macro slot for id {}", id);
                return false;
            }
        };
        self.headers[idx] = Header {
            id,
            offset: self.length as u16,
            length: 0,
        };
        self.recording = Some(idx);
        true
    }

    /// Appends one report to the recording in progress, if any.
    pub fn record_report(&mut self, report: &BasicReport) {
        let Some(idx) = self.recording else {
            return;
        };
        if report.is_empty() {
            self.write(idx, &[EMPTY_REPORT]);
            return;
        }
        let n = report
            .scancodes
            .iter()
            .position(|&s| s == 0)
            .unwrap_or(report.scancodes.len());
        let mut record = [0u8; 9];
        record[0] = BASIC_REPORT;
        record[1] = n as u8;
        record[2] = report.modifiers;
        record[3..3 + n].copy_from_slice(&report.scancodes[..n]);
        self.write(idx, &record[..3 + n]);
    }

    fn write(&mut self, idx: usize, bytes: &[u8]) {
        if self.recording.is_none() {
            return;
        }
        if self.length + bytes.len() > REPORT_BUFFER_MAX_LENGTH {
            crate::error!("runtime macro buffer full, stopping recording");
            self.recording = None;
            return;
        }
        self.buffer[self.length..self.length + bytes.len()].copy_from_slice(bytes);
        self.length += bytes.len();
        self.headers[idx].length += bytes.len() as u16;
    }

    /// Plays the next recorded report of `id` into `report`, starting
    /// playback when none is running. Returns true while more remains.
    pub fn play_smart(&mut self, id: u8, report: &mut BasicReport) -> bool {
        let pb = match self.playback {
            Some(pb) => pb,
            None => {
                let Some(h) = self.headers[..self.header_count].iter().find(|h| h.id == id)
                else {
                    crate::warn!("unknown runtime macro {}", id);
                    return false;
                };
                Playback {
                    position: h.offset,
                    end: h.offset + h.length,
                }
            }
        };
        let pb = self.play_report(pb, report);
        if pb.position < pb.end {
            self.playback = Some(pb);
            true
        } else {
            self.playback = None;
            false
        }
    }

    fn play_report(&self, mut pb: Playback, report: &mut BasicReport) -> Playback {
        *report = BasicReport::default();
        let mut read = || {
            let b = self.buffer.get(pb.position as usize).copied().unwrap_or(0);
            pb.position += 1;
            b
        };
        if read() == BASIC_REPORT {
            let n = read().min(report.scancodes.len() as u8);
            report.modifiers = read();
            for i in 0..n {
                report.scancodes[i as usize] = read();
            }
        }
        pb
    }
}

#[cfg(test)]
#[path = "recorder_test.rs"]
mod test;
