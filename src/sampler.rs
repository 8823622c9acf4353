//! 50 Hz sampling of the ultrasonic ranger and the PIR sensor.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Sender, TrySendError};
use embassy_time::Ticker;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::capture::PulseCapture;
use crate::config::{
    ECHO_TIMEOUT, MAX_DISTANCE_CM, SAMPLE_PERIOD, SPEED_OF_SOUND_CM_PER_US, TRIGGER_GUARD_US,
    TRIGGER_PULSE_US,
};

/// One sampling period's readings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    /// Zero means no usable echo.
    pub distance_cm: f32,
    pub motion_raw: bool,
}

/// Convert an echo width to a distance. Missing echoes and readings past the
/// sensor's range normalize to zero.
pub fn distance_cm(duration_us: u32) -> f32 {
    if duration_us == 0 {
        return 0.0;
    }
    let distance = duration_us as f32 * SPEED_OF_SOUND_CM_PER_US / 2.0;
    if distance > MAX_DISTANCE_CM {
        0.0
    } else {
        distance
    }
}

pub struct Sampler<'a, T, P, D> {
    capture: &'a PulseCapture,
    trigger: T,
    pir: P,
    delay: D,
}

impl<'a, T, P, D> Sampler<'a, T, P, D>
where
    T: OutputPin,
    P: InputPin,
    D: DelayNs,
{
    pub fn new(capture: &'a PulseCapture, trigger: T, pir: P, delay: D) -> Self {
        Self {
            capture,
            trigger,
            pir,
            delay,
        }
    }

    /// Take one sample. Waits at most [`ECHO_TIMEOUT`] for the echo.
    pub async fn sample(&mut self) -> Sample {
        self.capture.prepare();
        self.fire_trigger();

        let duration_us = self.capture.wait_width(ECHO_TIMEOUT).await.unwrap_or(0);
        let motion_raw = self.pir.is_high().unwrap_or(false);

        Sample {
            distance_cm: distance_cm(duration_us),
            motion_raw,
        }
    }

    fn fire_trigger(&mut self) {
        let result = self
            .trigger
            .set_low()
            .and_then(|()| {
                self.delay.delay_us(TRIGGER_GUARD_US);
                self.trigger.set_high()
            })
            .and_then(|()| {
                self.delay.delay_us(TRIGGER_PULSE_US);
                self.trigger.set_low()
            });
        if let Err(e) = result {
            log::debug!("sampler: trigger pin error: {:?}", e);
        }
    }

    /// Sample on a fixed cadence anchored to absolute deadlines.
    ///
    /// The queue send blocks when fusion falls behind: samples are never
    /// dropped, and a full queue is logged.
    pub async fn run<const N: usize>(
        mut self,
        samples: Sender<'_, CriticalSectionRawMutex, Sample, N>,
    ) -> ! {
        log::info!("sampler: started, period={}ms", SAMPLE_PERIOD.as_millis());
        let mut ticker = Ticker::every(SAMPLE_PERIOD);

        loop {
            let sample = self.sample().await;
            if let Err(TrySendError::Full(sample)) = samples.try_send(sample) {
                log::warn!("sampler: fusion queue full, waiting");
                samples.send(sample).await;
            }
            ticker.next().await;
        }
    }
}
