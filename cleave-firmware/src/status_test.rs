use super::*;

extern crate std;

#[test]
fn accumulates_text_and_numbers() {
    let mut s = StatusBuffer::default();
    s.push_str("reg ");
    s.push_num(0);
    s.push_str(" = ");
    s.push_num(-42);
    assert_eq!(s.as_bytes(), b"reg 0 = -42");
    assert_eq!(s.byte_at(4), b'0');
    assert_eq!(s.byte_at(999), 0);
}

#[test]
fn saturates_at_capacity() {
    let mut s = StatusBuffer::default();
    for _ in 0..STATUS_BUFFER_MAX_LENGTH {
        s.push_str("x");
    }
    assert_eq!(s.len(), STATUS_BUFFER_MAX_LENGTH);

    s.push_str("overflow");
    s.push_num(123456);
    assert_eq!(s.len(), STATUS_BUFFER_MAX_LENGTH);

    s.clear();
    assert!(s.is_empty());
    s.push_str("ok");
    assert_eq!(s.as_bytes(), b"ok");
}

#[test]
fn extreme_numbers() {
    let mut s = StatusBuffer::default();
    s.push_num(i32::MIN);
    s.push_str(" ");
    s.push_num(i32::MAX);
    assert_eq!(s.as_bytes(), b"-2147483648 2147483647");
}
