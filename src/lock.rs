//! Lock actuator task: moves the servo whenever the lock flag is written.

use crate::drivers::LockServo;
use crate::shared::{LockState, SharedState};

pub struct LockActuator<S> {
    servo: S,
}

impl<S: LockServo> LockActuator<S> {
    pub fn new(servo: S) -> Self {
        Self { servo }
    }

    /// Drive the servo to whatever the lock flag says now.
    pub fn actuate(&mut self, shared: &SharedState) -> LockState {
        let lock = shared.lock_state();
        self.servo.set_position(lock.angle());
        lock
    }

    /// Sync the servo to the boot state, then follow the actuator doorbell.
    ///
    /// Rings coalesce; the flag is re-read on every wake, so the servo always
    /// ends on the latest state.
    pub async fn run(mut self, shared: &SharedState) -> ! {
        let lock = self.actuate(shared);
        log::info!("lock: started, {}", lock.label());

        loop {
            shared.actuator().wait().await;
            let lock = self.actuate(shared);
            log::info!("lock: {}", lock.label());
        }
    }

    pub fn into_inner(self) -> S {
        self.servo
    }
}
