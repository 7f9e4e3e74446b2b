//! NTP timetags
//!
//! Bundles carry a 64-bit fixed point NTP time: 32 bits of seconds since
//! 1900-01-01 and 32 bits of fraction. The raw value `(0, 1)` means
//! "immediately" and decodes to the current time.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between 1900-01-01 (NTP epoch) and 1970-01-01 (Unix epoch)
pub const NTP_DELTA: u64 = 2_208_988_800;

/// Fraction units per second
const FRACTION_SCALE: f64 = 4_294_967_296.0;

/// An NTP timetag as carried in a bundle header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timetag {
    pub seconds: u32,
    pub fraction: u32,
}

impl Timetag {
    /// The "process immediately" sentinel
    pub const IMMEDIATE: Timetag = Timetag {
        seconds: 0,
        fraction: 1,
    };

    pub fn new(seconds: u32, fraction: u32) -> Self {
        Self { seconds, fraction }
    }

    pub fn is_immediate(&self) -> bool {
        *self == Self::IMMEDIATE
    }

    pub fn to_be_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.seconds.to_be_bytes());
        out[4..].copy_from_slice(&self.fraction.to_be_bytes());
        out
    }

    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        let [s0, s1, s2, s3, f0, f1, f2, f3] = bytes;
        Self::new(
            u32::from_be_bytes([s0, s1, s2, s3]),
            u32::from_be_bytes([f0, f1, f2, f3]),
        )
    }
}

/// Current Unix time in seconds
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Convert an optional Unix time to a timetag
///
/// `None` yields [`Timetag::IMMEDIATE`].
pub fn time_to_timetag(time: Option<f64>) -> Timetag {
    let Some(value) = time else {
        return Timetag::IMMEDIATE;
    };
    let whole = value.floor();
    let fract = value - whole;
    let seconds = (whole as i64 + NTP_DELTA as i64) as u32;
    let fraction = (fract * FRACTION_SCALE) as u32;
    Timetag::new(seconds, fraction)
}

/// Convert a timetag to Unix time
///
/// The `(0, 1)` sentinel is read as "now", whatever the sender meant by it.
pub fn timetag_to_time(timetag: Timetag) -> f64 {
    if timetag.is_immediate() {
        return now();
    }
    timetag.seconds as f64 + timetag.fraction as f64 / FRACTION_SCALE - NTP_DELTA as f64
}
