use super::*;

extern crate std;

fn report(modifiers: u8, scancodes: &[u8]) -> BasicReport {
    let mut r = BasicReport::default();
    r.modifiers = modifiers;
    r.scancodes[..scancodes.len()].copy_from_slice(scancodes);
    r
}

#[test]
fn record_then_play_reproduces_stream() {
    let mut rec = Recorder::default();

    assert!(rec.record_smart(3));
    assert!(rec.is_recording());
    rec.record_report(&report(0, &[4]));
    rec.record_report(&report(0, &[]));
    rec.record_report(&report(0x02, &[5, 6]));
    assert!(!rec.record_smart(3), "toggle stops recording");

    let mut out = report(0xff, &[9, 9, 9]);
    assert!(rec.play_smart(3, &mut out));
    assert_eq!(out, report(0, &[4]));

    assert!(rec.play_smart(3, &mut out));
    assert_eq!(out, BasicReport::default());

    assert!(!rec.play_smart(3, &mut out), "last report ends playback");
    assert_eq!(out, report(0x02, &[5, 6]));

    // smart play restarts from the top
    assert!(rec.play_smart(3, &mut out));
    assert_eq!(out, report(0, &[4]));
}

#[test]
fn unknown_id_is_reported_noop() {
    let mut rec = Recorder::default();
    let mut out = report(0, &[4]);
    assert!(!rec.play_smart(9, &mut out));
    assert_eq!(out, report(0, &[4]), "report untouched");
}

#[test]
fn re_recording_replaces_id() {
    let mut rec = Recorder::default();

    rec.record_smart(1);
    rec.record_report(&report(0, &[10]));
    rec.record_smart(1);

    rec.record_smart(1);
    rec.record_report(&report(0, &[11]));
    rec.record_smart(1);

    let mut out = BasicReport::default();
    assert!(!rec.play_smart(1, &mut out));
    assert_eq!(out, report(0, &[11]));
}

#[test]
fn buffer_exhaustion_stops_recording() {
    let mut rec = Recorder::default();
    rec.record_smart(0);
    for _ in 0..REPORT_BUFFER_MAX_LENGTH {
        rec.record_report(&report(0, &[4, 5, 6]));
    }
    assert!(!rec.is_recording(), "stopped when the buffer filled");
}

#[test]
fn ids_are_independent() {
    let mut rec = Recorder::default();

    rec.record_smart(1);
    rec.record_report(&report(0, &[20]));
    rec.record_smart(1);

    rec.record_smart(2);
    rec.record_report(&report(0, &[30]));
    rec.record_smart(2);

    let mut out = BasicReport::default();
    assert!(!rec.play_smart(2, &mut out));
    assert_eq!(out, report(0, &[30]));
    assert!(!rec.play_smart(1, &mut out));
    assert_eq!(out, report(0, &[20]));
}
