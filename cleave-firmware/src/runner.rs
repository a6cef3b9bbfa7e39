use embassy_futures::select::{select3, Either3};
use embassy_sync::{
    blocking_mutex::raw::{NoopRawMutex, RawMutex},
    channel::Channel,
    signal::Signal,
};
use embassy_time::{Duration, Instant, Ticker};

use crate::{
    engine::Engine,
    key_states::KeyId,
    layer_stack::LayerId,
    reports::MacroReports,
    TICK_MS,
};

/// One debounced physical transition from the matrix scanner.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanEvent(pub KeyId, pub bool);

pub struct ScanChannel<M: RawMutex, const N: usize>(Channel<M, ScanEvent, N>);

impl<M: RawMutex, const N: usize> Default for ScanChannel<M, N> {
    fn default() -> Self {
        Self(Channel::new())
    }
}

impl<M: RawMutex, const N: usize> ScanChannel<M, N> {
    pub async fn receive(&self) -> ScanEvent {
        self.0.receive().await
    }

    pub fn try_send(&self, event: ScanEvent) {
        self.0.try_send(event).ok();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notice {
    Recording,
    RecordingDone,
    Error,
}

/// Outbound traffic to the report-assembly / display / keymap
/// collaborators.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostEvent {
    Reports(MacroReports),
    ClearReports,
    SwitchLayer { layer: LayerId, keymap: u8 },
    SwitchKeymap(u8),
    Notice(Notice),
}

pub enum ControlMessage {
    StartMacro { index: u8, key: KeyId },
    Exit,
}

#[derive(Default)]
pub struct ControlSignal(Signal<NoopRawMutex, ControlMessage>);

impl ControlSignal {
    pub fn start_macro(&self, index: u8, key: KeyId) {
        self.0.signal(ControlMessage::StartMacro { index, key });
    }

    pub fn exit(&self) {
        self.0.signal(ControlMessage::Exit);
    }
}

pub struct HostChannel<M: RawMutex, const N: usize> {
    channel: Channel<M, HostEvent, N>,
    ctl: ControlSignal,
}

impl<M: RawMutex, const N: usize> Default for HostChannel<M, N> {
    fn default() -> Self {
        Self {
            channel: Channel::new(),
            ctl: ControlSignal::default(),
        }
    }
}

impl<M: RawMutex, const N: usize> HostChannel<M, N> {
    pub async fn receive(&self) -> HostEvent {
        self.channel.receive().await
    }

    pub fn try_receive(&self) -> Option<HostEvent> {
        self.channel.try_receive().ok()
    }

    pub fn control(&self) -> &ControlSignal {
        &self.ctl
    }

    async fn wait_control(&self) -> ControlMessage {
        self.ctl.0.wait().await
    }

    // A consumer that stalls loses messages, not ordering: drop everything
    // and leave a resync marker.
    pub(crate) fn report(&self, event: HostEvent) {
        if self.channel.try_send(event).is_err() {
            self.channel.clear();
            let _ = self.channel.try_send(HostEvent::ClearReports);
        }
    }
}

impl<'c, const ROWS: usize, const COLS: usize, const PROG_SIZE: usize, M: RawMutex, const HOST_N: usize>
    Engine<'c, ROWS, COLS, PROG_SIZE, M, HOST_N>
{
    /// The fixed-rate cooperative loop: scan intake, control messages and
    /// the scheduler tick, until an Exit control message.
    pub async fn run<const SCAN_N: usize>(&mut self, scan: &ScanChannel<M, SCAN_N>) {
        let mut ticker = Ticker::every(Duration::from_millis(TICK_MS));
        loop {
            match select3(scan.receive(), self.host.wait_control(), ticker.next()).await {
                Either3::First(ScanEvent(key, active)) => {
                    self.key_event(key, active, Instant::now().as_millis());
                }
                Either3::Second(ControlMessage::StartMacro { index, key }) => {
                    self.start_macro(index, key, Instant::now().as_millis());
                }
                Either3::Second(ControlMessage::Exit) => return,
                Either3::Third(()) => {
                    self.tick(Instant::now().as_millis());
                    self.flush_reports();
                }
            }
        }
    }

    /// Snapshot the claimed reports for the assembly collaborator when
    /// they changed this tick; signal a clear when the claim lapses.
    pub fn flush_reports(&mut self) {
        match self.report_owner {
            Some(slot) => {
                self.had_report_owner = true;
                if self.states[slot as usize].reports.take_dirty() {
                    let snapshot = self.states[slot as usize].reports;
                    self.host.report(HostEvent::Reports(snapshot));
                }
            }
            None => {
                if self.had_report_owner {
                    self.had_report_owner = false;
                    self.host.report(HostEvent::ClearReports);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod test;
