use super::*;

extern crate std;

#[test]
fn basic_insert_no_duplicates_first_free_slot() {
    let mut r = MacroReports::default();

    r.add_scancode(KeystrokeKind::Basic, 4);
    r.add_scancode(KeystrokeKind::Basic, 5);
    r.add_scancode(KeystrokeKind::Basic, 4);
    assert_eq!(r.basic.scancodes, [4, 5, 0, 0, 0, 0]);

    r.delete_scancode(KeystrokeKind::Basic, 4);
    assert_eq!(r.basic.scancodes, [0, 5, 0, 0, 0, 0]);

    // freed slot is reused first
    r.add_scancode(KeystrokeKind::Basic, 6);
    assert_eq!(r.basic.scancodes, [6, 5, 0, 0, 0, 0]);
}

#[test]
fn zero_is_not_a_key() {
    let mut r = MacroReports::default();
    r.add_scancode(KeystrokeKind::Basic, 0);
    r.delete_scancode(KeystrokeKind::Basic, 0);
    assert!(r.basic.is_empty());
}

#[test]
fn full_report_drops_extra_scancodes() {
    let mut r = MacroReports::default();
    for sc in 10..20 {
        r.add_scancode(KeystrokeKind::Basic, sc);
    }
    assert_eq!(r.basic.scancodes, [10, 11, 12, 13, 14, 15]);
}

#[test]
fn media_and_system_buffers() {
    let mut r = MacroReports::default();

    r.add_scancode(KeystrokeKind::Media, 0x00e9);
    r.add_scancode(KeystrokeKind::System, 0x82);
    assert_eq!(r.media.scancodes[0], 0x00e9);
    assert_eq!(r.system.scancodes[0], 0x82);

    r.delete_scancode(KeystrokeKind::Media, 0x00e9);
    r.delete_scancode(KeystrokeKind::System, 0x82);
    assert_eq!(r.media, MediaReport::default());
    assert_eq!(r.system, SystemReport::default());
}

#[test]
fn modifiers_accumulate() {
    let mut r = MacroReports::default();
    r.add_modifiers(0x02);
    r.add_modifiers(0x01);
    assert_eq!(r.basic.modifiers, 0x03);
    r.delete_modifiers(0x02);
    assert_eq!(r.basic.modifiers, 0x01);
}

#[test]
fn dirty_flag_tracks_mutations() {
    let mut r = MacroReports::default();
    assert!(!r.take_dirty());

    r.add_scancode(KeystrokeKind::Basic, 4);
    assert!(r.take_dirty());
    assert!(!r.take_dirty());

    r.set_mouse(|m| m.x = 5);
    assert!(r.take_dirty());

    r.clear();
    assert!(r.take_dirty());
    assert!(r.basic.is_empty());
}
