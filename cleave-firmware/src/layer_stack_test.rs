use super::*;

extern crate std;

#[test]
fn starts_on_base() {
    let s = LayerStack::default();
    assert_eq!(s.active(), (LayerId::Base, BASE_KEYMAP));
    assert_eq!(s.size(), 1);
}

#[test]
fn previous_pop_restores_push_order() {
    let mut s = LayerStack::default();

    s.push(LayerId::Fn, 0, false);
    s.push(LayerId::Mouse, 0, false);
    assert_eq!(s.active().0, LayerId::Mouse);

    assert!(s.pop(true, false));
    assert_eq!(s.active().0, LayerId::Fn);

    assert!(s.pop(true, false));
    assert_eq!(s.active().0, LayerId::Base);
}

#[test]
fn never_empties_below_base() {
    let mut s = LayerStack::default();
    s.push(LayerId::Fn, 1, false);

    for _ in 0..20 {
        s.pop(true, false);
    }
    assert_eq!(s.size(), 1);
    assert_eq!(s.active(), (LayerId::Base, BASE_KEYMAP));
}

#[test]
fn match_toggled_skips_held_top() {
    let mut s = LayerStack::default();

    s.push(LayerId::Mouse, 0, false); // toggled
    s.push(LayerId::Fn, 0, true); // held on top

    // removes the toggled record from under the held one
    assert!(!s.pop(false, true), "active layer unchanged while held on top");
    assert_eq!(s.active().0, LayerId::Fn);

    // once the hold releases, the toggled layer is already gone
    assert!(s.release_held(LayerId::Fn));
    assert_eq!(s.active().0, LayerId::Base);
}

#[test]
fn release_held_targets_matching_record() {
    let mut s = LayerStack::default();

    s.push(LayerId::Fn, 0, true);
    s.push(LayerId::Mouse, 0, false);

    // the held fn is below the top; removal is lazy until the top pops
    assert!(!s.release_held(LayerId::Fn));
    assert_eq!(s.active().0, LayerId::Mouse);

    assert!(s.pop(true, false));
    assert_eq!(s.active().0, LayerId::Base, "lazily removed record skipped");
}

#[test]
fn last_layer_tracks_switches() {
    let mut s = LayerStack::default();

    s.push(LayerId::Fn, 0, false);
    assert_eq!(s.last_layer(), LayerId::Base);

    s.push(LayerId::Mouse, 0, false);
    assert_eq!(s.last_layer(), LayerId::Fn);

    s.pop(true, false);
    assert_eq!(s.last_layer(), LayerId::Mouse);
}

#[test]
fn keymap_follows_records() {
    let mut s = LayerStack::default();

    s.push(LayerId::Fn, 2, false);
    assert_eq!(s.active(), (LayerId::Fn, 2));

    s.set_keymap(1);
    assert_eq!(s.active(), (LayerId::Fn, 1));

    s.pop(true, false);
    assert_eq!(s.active(), (LayerId::Base, BASE_KEYMAP));
}

#[test]
fn layer_tokens() {
    assert_eq!(LayerId::from_token(b"fn"), Some(LayerId::Fn));
    assert_eq!(LayerId::from_token(b"mouse"), Some(LayerId::Mouse));
    assert_eq!(LayerId::from_token(b"mod"), Some(LayerId::Mod));
    assert_eq!(LayerId::from_token(b"base"), Some(LayerId::Base));
    assert_eq!(LayerId::from_token(b"nope"), None);
}
