//! Timing, thresholds and compile-time configuration.
//!
//! Deployment-specific values (allow-list, hold times, bus bound) are embedded
//! at compile time via environment variables, see `build.rs`.

use embassy_time::Duration;

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(20); // 50 Hz
pub const ECHO_TIMEOUT: Duration = Duration::from_millis(20);
pub const TRIGGER_GUARD_US: u32 = 2;
pub const TRIGGER_PULSE_US: u32 = 10;
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0343;
pub const MAX_DISTANCE_CM: f32 = 400.0;

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------
pub const WINDOW_LEN: usize = 5;
/// Proximity holds while the window's distance sum is in `(0, PROXIMITY_SUM_CM)`.
pub const PROXIMITY_SUM_CM: f32 = 90.0;
/// Motion holds while more than this many of the window's PIR samples are high.
pub const MOTION_HIGH_COUNT: u8 = 2;

// ---------------------------------------------------------------------------
// RFID
// ---------------------------------------------------------------------------
pub const TAG_POLL_PERIOD: Duration = Duration::from_millis(500);
pub const TAG_ENQUEUE_TIMEOUT: Duration = Duration::from_millis(100);
pub const MAX_ALLOWED_UIDS: usize = 16;
pub const DEFAULT_ALLOWED_UIDS: &str = "DE AD BE EF,CA FE BA BE,BF 6D CB 1F,79 49 4D B2";

// ---------------------------------------------------------------------------
// Queues
// ---------------------------------------------------------------------------
pub const SAMPLE_QUEUE_DEPTH: usize = 4;
pub const TAG_QUEUE_DEPTH: usize = 5;

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------
pub const LOCKED_ANGLE: u8 = 180;
pub const UNLOCKED_ANGLE: u8 = 0;

pub const DISPLAY_PERIOD: Duration = Duration::from_millis(200);
pub const DISPLAY_VALUE_COL: u8 = 8;
pub const DISPLAY_VALUE_WIDTH: u8 = 8;
pub const DISPLAY_PRESENCE_ROW: u8 = 0;
pub const DISPLAY_LOCK_ROW: u8 = 1;

const DEFAULT_HOLD_MS: u64 = 10_000;
const DEFAULT_BUS_TIMEOUT_MS: u64 = 50;

/// How long a grant keeps the door unlocked and a wake keeps the backlight on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Holds {
    pub lock: Duration,
    pub backlight: Duration,
}

impl Default for Holds {
    fn default() -> Self {
        Self {
            lock: Duration::from_millis(DEFAULT_HOLD_MS),
            backlight: Duration::from_millis(DEFAULT_HOLD_MS),
        }
    }
}

/// Controller configuration, embedded at compile time.
#[derive(Clone)]
pub struct Config {
    pub allowed_uids: &'static str,
    pub holds: Holds,
    pub bus_timeout: Duration,
}

impl Config {
    /// Get the compile-time configuration.
    pub fn get() -> Self {
        Self {
            allowed_uids: option_env!("DOOR_ALLOWED_UIDS").unwrap_or(DEFAULT_ALLOWED_UIDS),
            holds: Holds {
                lock: Duration::from_millis(parse_ms(
                    option_env!("DOOR_LOCK_HOLD_MS"),
                    DEFAULT_HOLD_MS,
                )),
                backlight: Duration::from_millis(parse_ms(
                    option_env!("DOOR_BACKLIGHT_HOLD_MS"),
                    DEFAULT_HOLD_MS,
                )),
            },
            bus_timeout: Duration::from_millis(parse_ms(
                option_env!("DOOR_BUS_TIMEOUT_MS"),
                DEFAULT_BUS_TIMEOUT_MS,
            )),
        }
    }
}

/// Parse a millisecond count, ignoring non-digits. Zero or absent falls back.
pub const fn parse_ms(s: Option<&str>, fallback: u64) -> u64 {
    let bytes = match s {
        Some(s) => s.as_bytes(),
        None => return fallback,
    };
    let mut result: u64 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        if digit >= b'0' && digit <= b'9' {
            result = result.saturating_mul(10).saturating_add((digit - b'0') as u64);
        }
        i += 1;
    }
    if result == 0 {
        fallback
    } else {
        result
    }
}
