//! Timetag tests

use osckit_core::time::{now, NTP_DELTA};
use osckit_core::{time_to_timetag, timetag_to_time, Timetag};

#[test]
fn test_none_is_immediate() {
    assert_eq!(time_to_timetag(None), Timetag::new(0, 1));
    assert!(time_to_timetag(None).is_immediate());
}

#[test]
fn test_immediate_decodes_to_now() {
    let t = timetag_to_time(Timetag::IMMEDIATE);
    assert!((t - now()).abs() < 0.5);
}

#[test]
fn test_roundtrip_current_time() {
    let t = now();
    let back = timetag_to_time(time_to_timetag(Some(t)));
    // f64 Unix seconds near the present carry about 2.4e-7 s of precision
    assert!((back - t).abs() < 1e-6);
}

#[test]
fn test_roundtrip_small_values_exact() {
    for t in [0.0, 0.25, 1.5, 1000.125] {
        assert_eq!(timetag_to_time(time_to_timetag(Some(t))), t);
    }
}

#[test]
fn test_seconds_offset() {
    let tag = time_to_timetag(Some(1.75));
    assert_eq!(tag.seconds as u64, NTP_DELTA + 1);
    assert_eq!(tag.fraction, 3 << 30);
}
