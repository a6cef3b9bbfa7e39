use cleave_config::{Action, ProgramBuilder};
use embassy_futures::{block_on, join::join};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

use crate::{engine::Engine, time_driver_test_stub};

use super::*;

extern crate std;
use std::vec::Vec;

type Host = HostChannel<NoopRawMutex, 32>;
type Scan = ScanChannel<NoopRawMutex, 8>;

#[test]
fn run_loop_reports_macro_output_and_exits() {
    time_driver_test_stub::set_time(1_000_000);

    let host = Host::default();
    let scan = Scan::default();

    let mut b = ProgramBuilder::new();
    b.add_macro(&[Action::tap(0x04)]).unwrap();
    let image = b.build();

    block_on(async {
        let mut engine = Engine::<2, 3, 512, NoopRawMutex, 32>::new(&host);
        engine.load_program(image).unwrap();

        let driver = async {
            let key = KeyId::new(0, 0);
            scan.try_send(ScanEvent(key, true));
            host.control().start_macro(0, key);

            let mut seen_press = false;
            loop {
                match host.receive().await {
                    HostEvent::Reports(r) if r.basic.scancodes[0] == 0x04 => {
                        seen_press = true;
                    }
                    HostEvent::ClearReports if seen_press => break,
                    _ => {}
                }
            }
            host.control().exit();
        };

        join(engine.run(&scan), driver).await;
    });
}

#[test]
fn flush_reports_snapshots_and_clears() {
    let host = Host::default();
    let mut b = ProgramBuilder::new();
    b.add_macro(&[Action::tap(0x05)]).unwrap();

    let mut e = Engine::<2, 3, 512, NoopRawMutex, 32>::new(&host);
    e.load_program(b.build()).unwrap();

    e.start_macro(0, KeyId::new(0, 0), 0);
    e.tick(1);
    e.flush_reports();
    e.tick(2);
    e.flush_reports();
    e.flush_reports(); // idle flush adds nothing

    let mut events = Vec::new();
    while let Some(ev) = host.try_receive() {
        events.push(ev);
    }
    assert_eq!(events.len(), 2);
    let HostEvent::Reports(r) = events[0] else {
        panic!("expected a report snapshot, got {events:?}");
    };
    assert_eq!(r.basic.scancodes[0], 5);
    assert_eq!(events[1], HostEvent::ClearReports);
}

#[test]
fn host_channel_overrun_resyncs_with_clear() {
    let host = HostChannel::<NoopRawMutex, 2>::default();
    for _ in 0..4 {
        host.report(HostEvent::SwitchKeymap(1));
    }
    let mut last = None;
    while let Some(ev) = host.try_receive() {
        last = Some(ev);
    }
    assert_eq!(last, Some(HostEvent::ClearReports));
}
