//! Sliding-window fusion of distance and PIR samples into detections.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::Instant;

use crate::bus::BusArbiter;
use crate::config::{MOTION_HIGH_COUNT, PROXIMITY_SUM_CM, WINDOW_LEN};
use crate::drivers::RealTimeClock;
use crate::sampler::Sample;
use crate::shared::{DetectionState, SharedState};
use crate::window::SlidingWindow;

pub struct FusionEngine {
    distance: SlidingWindow<f32, WINDOW_LEN>,
    motion: SlidingWindow<u8, WINDOW_LEN>,
}

impl FusionEngine {
    pub fn new() -> Self {
        Self {
            distance: SlidingWindow::new(),
            motion: SlidingWindow::new(),
        }
    }

    /// Fold one sample into the windows and evaluate both detectors.
    ///
    /// Proximity: window distance sum in `(0, PROXIMITY_SUM_CM)`; a zero sum
    /// means no valid echoes and never counts. Motion: more than
    /// `MOTION_HIGH_COUNT` high PIR samples in the window.
    pub fn ingest(&mut self, sample: Sample) -> DetectionState {
        self.distance.push(sample.distance_cm);
        self.motion.push(sample.motion_raw as u8);

        let distance_sum = self.distance.sum();
        DetectionState {
            proximity: distance_sum > 0.0 && distance_sum < PROXIMITY_SUM_CM,
            motion: self.motion.sum() > MOTION_HIGH_COUNT,
        }
    }

    pub fn distance_sum(&self) -> f32 {
        self.distance.sum()
    }

    pub fn motion_count(&self) -> u8 {
        self.motion.sum()
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Publish a detection and wake the backlight if anything is detected while
/// it is off. Returns `true` if the backlight was woken.
pub fn publish(shared: &SharedState, detection: DetectionState, now: Instant) -> bool {
    shared.update(now, |u| {
        u.set_detection(detection);
        detection.any() && u.wake_backlight()
    })
}

/// Fusion task: consume samples forever, publishing detections.
pub async fn run<B: RealTimeClock, const N: usize>(
    mut engine: FusionEngine,
    shared: &SharedState,
    bus: &BusArbiter<B>,
    samples: Receiver<'_, CriticalSectionRawMutex, Sample, N>,
) -> ! {
    log::info!("fusion: started");

    loop {
        let sample = samples.receive().await;
        let detection = engine.ingest(sample);

        if publish(shared, detection, Instant::now()) {
            let stamp = bus.timestamp().await;
            log::info!(
                "[{}] backlight on ({})",
                stamp,
                if detection.proximity { "distance" } else { "motion" }
            );
        }
    }
}
