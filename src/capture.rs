//! Ultrasonic echo pulse capture.
//!
//! The echo line's edge interrupt calls [`PulseCapture::on_rising`] and
//! [`PulseCapture::on_falling`] with a free-running microsecond timestamp.
//! Both are O(1), lock-free and never block. A falling edge that follows a
//! rising edge publishes the pulse width and rings the sampler's doorbell.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_time::{with_timeout, Duration};

use crate::doorbell::Doorbell;

pub struct PulseCapture {
    rise_us: AtomicU32,
    width_us: AtomicU32,
    rising_seen: AtomicBool,
    done: Doorbell,
}

impl PulseCapture {
    pub const fn new() -> Self {
        Self {
            rise_us: AtomicU32::new(0),
            width_us: AtomicU32::new(0),
            rising_seen: AtomicBool::new(false),
            done: Doorbell::new(),
        }
    }

    /// Echo line went high: restart the pulse counter.
    pub fn on_rising(&self, now_us: u32) {
        self.rise_us.store(now_us, Ordering::Relaxed);
        self.rising_seen.store(true, Ordering::Release);
    }

    /// Echo line went low: latch the width and wake the sampler.
    pub fn on_falling(&self, now_us: u32) {
        if !self.rising_seen.swap(false, Ordering::AcqRel) {
            return; // no matching rising edge, e.g. armed mid-pulse
        }
        // Wrapping: the counter rolls over every ~71 minutes
        let width = now_us.wrapping_sub(self.rise_us.load(Ordering::Relaxed));
        self.width_us.store(width, Ordering::Release);
        self.done.ring();
    }

    /// Forget any stale edge or pending wake before a new trigger.
    pub fn prepare(&self) {
        self.rising_seen.store(false, Ordering::Release);
        self.width_us.store(0, Ordering::Release);
        self.done.reset();
    }

    /// Wait for a completed pulse. `None` if no falling edge arrived in time.
    pub async fn wait_width(&self, timeout: Duration) -> Option<u32> {
        with_timeout(timeout, self.done.wait())
            .await
            .ok()
            .map(|()| self.width_us.load(Ordering::Acquire))
    }
}

impl Default for PulseCapture {
    fn default() -> Self {
        Self::new()
    }
}
