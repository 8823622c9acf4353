use core::fmt;

/// Failures surfaced by collaborators and shared resources.
///
/// None of these are fatal: callers log them and skip the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The shared I2C bus could not be acquired within the arbiter bound.
    BusTimeout,
    /// A peripheral transfer failed (NACK, arbitration loss, SPI error).
    Bus,
    /// The RFID transceiver saw no card, or the card went away mid-read.
    NoCard,
    /// A UID string or byte sequence was not a canonical 4-byte UID.
    InvalidUid,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BusTimeout => f.write_str("bus timeout"),
            Error::Bus => f.write_str("bus transfer failed"),
            Error::NoCard => f.write_str("no card"),
            Error::InvalidUid => f.write_str("invalid uid"),
        }
    }
}
