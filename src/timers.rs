//! One-shot countdown timers and the expiry service that fires them.
//!
//! The timers themselves are plain state machines stored inside the shared
//! state's critical section, next to the flag each one guards. The expiry
//! service sleeps until the earliest armed deadline and then runs
//! [`SharedState::expire`], which is the only place timers fire.

use embassy_futures::select::select;
use embassy_time::{Duration, Instant, Timer};

use crate::shared::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Armed(Instant),
    Fired,
}

/// One-shot, re-armable countdown.
///
/// Arming while already armed supersedes the previous deadline (no
/// accumulation). Each arm fires at most once.
#[derive(Debug, Clone, Copy)]
pub struct CountdownTimer {
    state: TimerState,
}

impl CountdownTimer {
    pub const fn new() -> Self {
        Self {
            state: TimerState::Idle,
        }
    }

    pub fn arm(&mut self, now: Instant, duration: Duration) {
        self.state = TimerState::Armed(now + duration);
    }

    /// Fire if the deadline has passed. Returns `true` exactly once per arm.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            TimerState::Armed(deadline) if now >= deadline => {
                self.state = TimerState::Fired;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            TimerState::Armed(deadline) => Some(deadline),
            _ => None,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Expiry service: fires the lock and backlight timers on their deadlines.
///
/// Wakes early whenever a timer is (re)armed so the new deadline is honoured.
pub async fn run(shared: &SharedState) -> ! {
    log::info!("timers: expiry service started");

    loop {
        match shared.next_deadline() {
            Some(deadline) => {
                // A rearm only moves the deadline; expire() below decides.
                let _ = select(Timer::at(deadline), shared.timers_rearmed().wait()).await;
            }
            None => shared.timers_rearmed().wait().await,
        }

        let expired = shared.expire(Instant::now());
        if expired.lock {
            log::debug!("timers: lock hold expired");
        }
        if expired.backlight {
            log::debug!("timers: backlight hold expired");
        }
    }
}
