//! Bounded-wait mutual exclusion for the shared two-wire bus.
//!
//! The bus is best-effort: a caller that cannot get it within the bound skips
//! its work for the cycle instead of waiting.

use core::fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::{with_timeout, Duration};

use crate::drivers::{RealTimeClock, TimeOfDay};
use crate::Error;

pub struct BusArbiter<B> {
    bus: Mutex<CriticalSectionRawMutex, B>,
    timeout: Duration,
}

impl<B> BusArbiter<B> {
    pub const fn new(bus: B, timeout: Duration) -> Self {
        Self {
            bus: Mutex::new(bus),
            timeout,
        }
    }

    /// Acquire the bus, giving up after the arbiter's bound.
    pub async fn acquire(&self) -> Result<MutexGuard<'_, CriticalSectionRawMutex, B>, Error> {
        with_timeout(self.timeout, self.bus.lock())
            .await
            .map_err(|_| Error::BusTimeout)
    }

    /// Run `f` with exclusive bus access, or fail with [`Error::BusTimeout`].
    pub async fn with<R>(&self, f: impl FnOnce(&mut B) -> R) -> Result<R, Error> {
        let mut guard = self.acquire().await?;
        Ok(f(&mut *guard))
    }
}

impl<B: RealTimeClock> BusArbiter<B> {
    /// Read the RTC for a log timestamp. Never waits past the bound; any
    /// failure is logged and yields a placeholder stamp.
    pub async fn timestamp(&self) -> Stamp {
        match self.with(|bus| bus.now()).await {
            Ok(Ok(time)) => Stamp(Some(time)),
            Ok(Err(e)) => {
                log::warn!("rtc: read failed: {}", e);
                Stamp(None)
            }
            Err(_) => {
                log::warn!("rtc: bus timeout");
                Stamp(None)
            }
        }
    }
}

/// Log timestamp; renders `--:--:--` when the clock was unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp(pub Option<TimeOfDay>);

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(time) => write!(f, "{}", time),
            None => f.write_str("--:--:--"),
        }
    }
}
