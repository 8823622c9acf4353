//! Collaborator interfaces consumed by the controller core, plus thin
//! `embedded-hal` drivers for the board's parts.
//!
//! The core never talks to a bus directly: it calls these traits, and the
//! firmware decides what implements them.

use core::fmt;

use crate::Error;

pub mod lcd;
pub mod mfrc522;
pub mod panel;
pub mod rtc;
pub mod servo;

/// Character display with a switchable backlight.
pub trait CharacterDisplay {
    /// Reset the controller into a known mode and clear it. Safe to repeat.
    fn init(&mut self) -> Result<(), Error>;
    /// Blank `width` cells starting at (`line`, `col`).
    fn clear_region(&mut self, line: u8, col: u8, width: u8) -> Result<(), Error>;
    fn write(&mut self, line: u8, col: u8, text: &str) -> Result<(), Error>;
    fn backlight(&mut self, on: bool) -> Result<(), Error>;
}

/// Real-time clock, read for log timestamps only.
pub trait RealTimeClock {
    fn now(&mut self) -> Result<TimeOfDay, Error>;
}

/// Lock actuator positioned by angle.
pub trait LockServo {
    /// Move to `angle` degrees, clamped to 0..=180.
    fn set_position(&mut self, angle: u8);
}

/// RFID transceiver operations used by the tag reader.
pub trait RfidTransceiver {
    /// A new card answered the request in the field.
    fn card_present(&mut self) -> bool;
    fn read_uid(&mut self) -> Result<[u8; 4], Error>;
    fn halt(&mut self);
    fn stop_crypto(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}
