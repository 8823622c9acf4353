//! Access decisions for scanned tags.
//!
//! Decision table, evaluated against the lock state at the moment of the scan:
//!
//! | UID                | Lock     | vs. last granted | Decision          |
//! |--------------------|----------|------------------|-------------------|
//! | not allowed        | any      | -                | `Denied` (locks)  |
//! | allowed            | Locked   | -                | `Granted`         |
//! | allowed            | Unlocked | different        | `Granted`         |
//! | allowed            | Unlocked | same             | `AlreadyUnlocked` |
//!
//! A grant unlocks, restarts the relock countdown and wakes the backlight.
//! Re-scanning the tag that is holding the door open does nothing, so a tag
//! left on the reader cannot extend the unlock window forever.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::Instant;

use crate::bus::BusArbiter;
use crate::drivers::RealTimeClock;
use crate::shared::{LockState, SharedState};
use crate::uid::{AllowList, TagUid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Denied,
    Granted,
    AlreadyUnlocked,
}

/// What one scan did to the shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub decision: Decision,
    pub backlight_woken: bool,
}

pub struct AccessControl {
    allow_list: AllowList,
    last_granted: Option<TagUid>,
}

impl AccessControl {
    pub fn new(allow_list: AllowList) -> Self {
        Self {
            allow_list,
            last_granted: None,
        }
    }

    /// Pure decision for `uid` given the current lock state. Records the UID
    /// as the last granted tag on a grant.
    pub fn decide(&mut self, uid: &TagUid, lock: LockState) -> Decision {
        if !self.allow_list.contains(uid) {
            return Decision::Denied;
        }

        let same_tag = self.last_granted.as_ref() == Some(uid);
        if lock == LockState::Unlocked && same_tag {
            return Decision::AlreadyUnlocked;
        }

        self.last_granted = Some(uid.clone());
        Decision::Granted
    }

    /// Decide and apply in one critical section, so a relock firing
    /// concurrently cannot split the decision from its effect.
    pub fn process(&mut self, uid: &TagUid, shared: &SharedState, now: Instant) -> Outcome {
        shared.update(now, |u| {
            let decision = self.decide(uid, u.lock());
            let backlight_woken = match decision {
                Decision::Denied => {
                    u.deny();
                    false
                }
                Decision::Granted => u.grant(),
                Decision::AlreadyUnlocked => false,
            };
            Outcome {
                decision,
                backlight_woken,
            }
        })
    }

    pub fn last_granted(&self) -> Option<&TagUid> {
        self.last_granted.as_ref()
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }
}

/// Access task: one UID at a time, in scan order.
pub async fn run<B: RealTimeClock, const N: usize>(
    mut access: AccessControl,
    shared: &SharedState,
    bus: &BusArbiter<B>,
    tags: Receiver<'_, CriticalSectionRawMutex, TagUid, N>,
) -> ! {
    log::info!(
        "access: started, {} authorized uids",
        access.allow_list().len()
    );

    loop {
        let uid = tags.receive().await;
        let outcome = access.process(&uid, shared, Instant::now());

        match outcome.decision {
            Decision::Granted => {
                log::info!("access: GRANTED uid={}", uid);
                if outcome.backlight_woken {
                    log::info!("access: backlight on (rfid)");
                }
            }
            Decision::Denied => {
                let stamp = bus.timestamp().await;
                log::warn!("[{}] access: DENIED unknown uid={}", stamp, uid);
            }
            Decision::AlreadyUnlocked => {
                let stamp = bus.timestamp().await;
                log::info!(
                    "[{}] access: same tag re-scanned while unlocked, ignoring uid={}",
                    stamp,
                    uid
                );
            }
        }
    }
}
