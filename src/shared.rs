//! Shared controller state: lock, backlight and detection flags plus the two
//! countdown timers that guard them.
//!
//! Ownership of each flag:
//! - Lock: access machine (grant/deny) and the lock-timer expiry.
//! - Backlight: fusion (wake), access machine (wake on grant) and the
//!   backlight-timer expiry (off).
//! - Detection: fusion only.
//!
//! Readers (actuator, presenter) take snapshots. Writers go through
//! [`SharedState::update`] so that a flag check, the flag write and the timer
//! rearm it implies happen in one critical section. Doorbells are rung after
//! the critical section is released.

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_time::Instant;

use crate::config::{Holds, LOCKED_ANGLE, UNLOCKED_ANGLE};
use crate::doorbell::Doorbell;
use crate::timers::{CountdownTimer, TimerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked,
}

impl LockState {
    /// Servo angle that realises this state.
    pub fn angle(self) -> u8 {
        match self {
            LockState::Locked => LOCKED_ANGLE,
            LockState::Unlocked => UNLOCKED_ANGLE,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LockState::Locked => "Locked",
            LockState::Unlocked => "Unlocked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklightState {
    On,
    Off,
}

impl BacklightState {
    pub fn is_on(self) -> bool {
        self == BacklightState::On
    }
}

/// Fusion output for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionState {
    pub proximity: bool,
    pub motion: bool,
}

impl DetectionState {
    pub fn any(self) -> bool {
        self.proximity || self.motion
    }

    pub fn label(self) -> &'static str {
        if self.any() {
            "Detected"
        } else {
            "None"
        }
    }
}

/// Point-in-time copy of the flags for readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub lock: LockState,
    pub backlight: BacklightState,
    pub detection: DetectionState,
}

/// Which timers fired during an [`SharedState::expire`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expired {
    pub lock: bool,
    pub backlight: bool,
}

struct Flags {
    lock: LockState,
    backlight: BacklightState,
    detection: DetectionState,
    lock_timer: CountdownTimer,
    backlight_timer: CountdownTimer,
}

/// Mutable view of the flags, valid inside one critical section.
pub struct Update<'a> {
    flags: &'a mut Flags,
    holds: Holds,
    now: Instant,
    lock_written: bool,
    timers_armed: bool,
}

impl Update<'_> {
    pub fn lock(&self) -> LockState {
        self.flags.lock
    }

    pub fn backlight(&self) -> BacklightState {
        self.flags.backlight
    }

    /// Unlock, restart the relock countdown and wake the backlight if it is
    /// off. Returns `true` if the backlight was woken.
    pub fn grant(&mut self) -> bool {
        self.flags.lock = LockState::Unlocked;
        self.flags.lock_timer.arm(self.now, self.holds.lock);
        self.lock_written = true;
        self.timers_armed = true;
        self.wake_backlight()
    }

    /// Lock immediately. Pending timers are left alone.
    pub fn deny(&mut self) {
        self.flags.lock = LockState::Locked;
        self.lock_written = true;
    }

    /// Turn the backlight on and start its countdown, only on Off -> On.
    /// Returns `true` if this call turned it on.
    pub fn wake_backlight(&mut self) -> bool {
        if self.flags.backlight.is_on() {
            return false;
        }
        self.flags.backlight = BacklightState::On;
        self.flags.backlight_timer.arm(self.now, self.holds.backlight);
        self.timers_armed = true;
        true
    }

    pub fn set_detection(&mut self, detection: DetectionState) {
        self.flags.detection = detection;
    }
}

pub struct SharedState {
    flags: Mutex<RefCell<Flags>>,
    holds: Holds,
    actuator: Doorbell,
    timers_rearmed: Doorbell,
}

impl SharedState {
    /// Boot state: locked, backlight off, nothing detected, timers idle.
    pub const fn new(holds: Holds) -> Self {
        Self {
            flags: Mutex::new(RefCell::new(Flags {
                lock: LockState::Locked,
                backlight: BacklightState::Off,
                detection: DetectionState {
                    proximity: false,
                    motion: false,
                },
                lock_timer: CountdownTimer::new(),
                backlight_timer: CountdownTimer::new(),
            })),
            holds,
            actuator: Doorbell::new(),
            timers_rearmed: Doorbell::new(),
        }
    }

    pub fn holds(&self) -> Holds {
        self.holds
    }

    /// Run `f` against the flags inside a critical section.
    ///
    /// Rings the actuator doorbell if the lock flag was written and the timer
    /// doorbell if a timer was armed, after the section ends.
    pub fn update<R>(&self, now: Instant, f: impl FnOnce(&mut Update<'_>) -> R) -> R {
        let (result, lock_written, timers_armed) = critical_section::with(|cs| {
            let mut flags = self.flags.borrow_ref_mut(cs);
            let mut update = Update {
                flags: &mut *flags,
                holds: self.holds,
                now,
                lock_written: false,
                timers_armed: false,
            };
            let result = f(&mut update);
            (result, update.lock_written, update.timers_armed)
        });

        if lock_written {
            self.actuator.ring();
        }
        if timers_armed {
            self.timers_rearmed.ring();
        }
        result
    }

    pub fn grant(&self, now: Instant) -> bool {
        self.update(now, |u| u.grant())
    }

    pub fn deny(&self, now: Instant) {
        self.update(now, |u| u.deny())
    }

    pub fn wake_backlight(&self, now: Instant) -> bool {
        self.update(now, |u| u.wake_backlight())
    }

    /// Timer expiry callback: flip the flags of every timer whose deadline
    /// has passed. Minimal work, no blocking.
    pub fn expire(&self, now: Instant) -> Expired {
        let expired = critical_section::with(|cs| {
            let mut flags = self.flags.borrow_ref_mut(cs);
            let mut expired = Expired::default();
            if flags.lock_timer.poll(now) {
                flags.lock = LockState::Locked;
                expired.lock = true;
            }
            if flags.backlight_timer.poll(now) {
                flags.backlight = BacklightState::Off;
                expired.backlight = true;
            }
            expired
        });

        if expired.lock {
            self.actuator.ring();
        }
        expired
    }

    /// Earliest armed deadline across both timers.
    pub fn next_deadline(&self) -> Option<Instant> {
        critical_section::with(|cs| {
            let flags = self.flags.borrow_ref(cs);
            match (flags.lock_timer.deadline(), flags.backlight_timer.deadline()) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            }
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        critical_section::with(|cs| {
            let flags = self.flags.borrow_ref(cs);
            Snapshot {
                lock: flags.lock,
                backlight: flags.backlight,
                detection: flags.detection,
            }
        })
    }

    pub fn lock_state(&self) -> LockState {
        critical_section::with(|cs| self.flags.borrow_ref(cs).lock)
    }

    pub fn backlight(&self) -> BacklightState {
        critical_section::with(|cs| self.flags.borrow_ref(cs).backlight)
    }

    pub fn detection(&self) -> DetectionState {
        critical_section::with(|cs| self.flags.borrow_ref(cs).detection)
    }

    pub fn lock_timer(&self) -> TimerState {
        critical_section::with(|cs| self.flags.borrow_ref(cs).lock_timer.state())
    }

    pub fn backlight_timer(&self) -> TimerState {
        critical_section::with(|cs| self.flags.borrow_ref(cs).backlight_timer.state())
    }

    /// Rung whenever the lock flag is written.
    pub fn actuator(&self) -> &Doorbell {
        &self.actuator
    }

    /// Rung whenever a timer is armed, so the expiry service can reschedule.
    pub fn timers_rearmed(&self) -> &Doorbell {
        &self.timers_rearmed
    }
}
