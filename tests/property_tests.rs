//! Property-based checks of the encoding primitives.

use quickcheck_macros::quickcheck;
use rohcpress::encodings::{is_value_in_lsb_interval, WlsbWindow};
use rohcpress::sdvl::{sdvl_decode, sdvl_encode, sdvl_encoded_len, SDVL_MAX_VALUE};

#[quickcheck]
fn sdvl_roundtrips_every_encodable_value(value: u32) -> bool {
    let value = value & SDVL_MAX_VALUE;
    let mut buf = Vec::new();
    let written = sdvl_encode(value, &mut buf).unwrap();
    let (decoded, consumed) = sdvl_decode(&buf).unwrap();
    decoded == value && consumed == written && Some(written) == sdvl_encoded_len(value)
}

#[quickcheck]
fn sdvl_length_is_monotonic(a: u32, b: u32) -> bool {
    let (a, b) = (a & SDVL_MAX_VALUE, b & SDVL_MAX_VALUE);
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    sdvl_encoded_len(lo).unwrap() <= sdvl_encoded_len(hi).unwrap()
}

#[quickcheck]
fn wlsb_k_required_covers_all_references(start: u16, count: u8) -> bool {
    let mut window = WlsbWindow::new(16, 16, -1);
    let count = (count % 16).max(1);
    for i in 0..count {
        window.add(u64::from(start.wrapping_add(u16::from(i))));
    }
    let next = u64::from(start.wrapping_add(u16::from(count)));
    let k = window.k_required(next);
    // The k reported must actually cover every stored reference.
    k >= 16 || window.covered_by(next, k)
}

#[quickcheck]
fn wlsb_interval_contains_its_base(v_ref: u64, k: u8) -> bool {
    let k = (k % 63) + 1;
    // With p = 0 the interval starts at the reference itself.
    is_value_in_lsb_interval(v_ref, v_ref, k, 0)
}

#[quickcheck]
fn wlsb_smaller_k_implies_larger_k(value: u16, v_ref: u16, k: u8) -> bool {
    let k = k % 15;
    let (value, v_ref) = (u64::from(value), u64::from(v_ref));
    // Coverage at k implies coverage at k + 1: the window only grows.
    !is_value_in_lsb_interval(value, v_ref, k.max(1), -1)
        || is_value_in_lsb_interval(value, v_ref, k.max(1) + 1, -1)
}
