//! Single-slot wake primitive for ISR-to-task and task-to-task handoff.
//!
//! A doorbell holds at most one pending ring. Ringing an already-pending
//! doorbell is a no-op, so a burst of rings wakes the waiter once. Waking
//! consumes the pending ring.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

pub struct Doorbell {
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl Doorbell {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Ring the bell. Safe from interrupt context; never blocks.
    pub fn ring(&self) {
        self.signal.signal(());
    }

    /// Wait for a ring and consume it.
    pub async fn wait(&self) {
        self.signal.wait().await;
    }

    /// Consume a pending ring without waiting.
    pub fn try_take(&self) -> bool {
        self.signal.try_take().is_some()
    }

    /// Drop any pending ring.
    pub fn reset(&self) {
        self.signal.reset();
    }

    pub fn is_pending(&self) -> bool {
        self.signal.signaled()
    }
}

impl Default for Doorbell {
    fn default() -> Self {
        Self::new()
    }
}
