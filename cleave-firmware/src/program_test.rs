use cleave_config::{Action, Kind, ProgramBuilder, Sub};

use super::*;

extern crate std;

#[test]
fn load_and_decode_actions() {
    let mut b = ProgramBuilder::new();
    b.add_keymap("qwe").unwrap();
    b.add_keymap("dv").unwrap();
    b.add_macro(&[
        Action::tap(4),
        Action::Key {
            sub: Sub::Hold,
            kind: Kind::Media,
            scancode: 0xe9,
            modifiers: 0x02,
        },
        Action::Delay(120),
    ])
    .unwrap();
    b.add_macro(&[
        Action::MouseButton {
            sub: Sub::Press,
            buttons: 1,
        },
        Action::MoveMouse(-3, 7),
        Action::ScrollMouse(0, -1),
        Action::Text("hi"),
    ])
    .unwrap();

    let mut p = Program::<512>::default();
    p.load(b.build()).unwrap();

    assert_eq!(p.macro_count(), 2);
    assert_eq!(p.keymap_by_abbreviation(b"qwe"), Some(0));
    assert_eq!(p.keymap_by_abbreviation(b"dv"), Some(1));
    assert_eq!(p.keymap_by_abbreviation(b"xxx"), None);

    let m0 = p.get_macro(0).unwrap();
    assert_eq!(m0.action_count, 3);
    let (a, next) = p.action_at(m0.first_action_offset).unwrap();
    assert_eq!(
        a,
        MacroAction::Key {
            sub: SubAction::Tap,
            kind: KeystrokeKind::Basic,
            scancode: 4,
            modifiers: 0,
        }
    );
    let (a, next) = p.action_at(next).unwrap();
    assert_eq!(
        a,
        MacroAction::Key {
            sub: SubAction::Hold,
            kind: KeystrokeKind::Media,
            scancode: 0xe9,
            modifiers: 0x02,
        }
    );
    let (a, _) = p.action_at(next).unwrap();
    assert_eq!(a, MacroAction::Delay { ms: 120 });

    let m1 = p.get_macro(1).unwrap();
    let (a, next) = p.action_at(m1.first_action_offset).unwrap();
    assert_eq!(
        a,
        MacroAction::MouseButton {
            sub: SubAction::Press,
            buttons: 1,
        }
    );
    let (a, next) = p.action_at(next).unwrap();
    assert_eq!(a, MacroAction::MoveMouse { x: -3, y: 7 });
    let (a, next) = p.action_at(next).unwrap();
    assert_eq!(a, MacroAction::ScrollMouse { x: 0, y: -1 });
    let (a, _) = p.action_at(next).unwrap();
    let MacroAction::Text { offset, len } = a else {
        panic!("expected text action");
    };
    assert_eq!(p.text(offset, len), b"hi");
    assert_eq!(p.text_byte(offset, 1), b'i');

    assert_eq!(p.get_macro(2), None);
}

#[test]
fn action_offset_walks_records() {
    let mut b = ProgramBuilder::new();
    b.add_macro(&[Action::Delay(1), Action::Text("abc"), Action::tap(5)])
        .unwrap();

    let mut p = Program::<256>::default();
    p.load(b.build()).unwrap();

    let o0 = p.action_offset(0, 0).unwrap();
    assert_eq!(o0, p.get_macro(0).unwrap().first_action_offset);
    let o2 = p.action_offset(0, 2).unwrap();
    let (a, _) = p.action_at(o2).unwrap();
    assert!(matches!(a, MacroAction::Key { scancode: 5, .. }));

    assert_eq!(p.action_offset(0, 3), None);
    assert_eq!(p.action_offset(1, 0), None);
}

#[test]
fn rejects_bad_images() {
    let mut b = ProgramBuilder::new();
    b.add_macro(&[Action::tap(4)]).unwrap();
    let good = b.build();

    let mut p = Program::<256>::default();

    let mut wrong_version = good.clone();
    wrong_version[0] = 99;
    assert_eq!(p.load(wrong_version), Err(LoadError::VersionMismatch));
    assert_eq!(p.macro_count(), 0);

    let truncated = good[..good.len() - 2].to_vec();
    assert_eq!(p.load(truncated), Err(LoadError::Corrupt));

    let mut trailing = good.clone();
    trailing.push(0xff);
    assert_eq!(p.load(trailing), Err(LoadError::Corrupt));

    assert_eq!(p.load([]), Err(LoadError::Corrupt));

    let mut tiny = Program::<4>::default();
    assert_eq!(tiny.load(good.clone()), Err(LoadError::OutOfSpace));

    // a failed load leaves the program empty, then a good load works
    p.load(good).unwrap();
    assert_eq!(p.macro_count(), 1);
}

#[test]
fn rejects_undecodable_bytecode() {
    // one macro claiming one action, bytecode is a bogus tag
    let image = [cleave_common::PROGRAM_VERSION, 0, 1, 1, 0, 0xee];
    let mut p = Program::<64>::default();
    assert_eq!(p.load(image), Err(LoadError::Corrupt));
}
