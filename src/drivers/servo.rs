//! Hobby servo on a 50 Hz PWM channel.

use embedded_hal::pwm::SetDutyCycle;

use super::LockServo;

const PERIOD_US: u32 = 20_000;
const MIN_PULSE_US: u32 = 500;
const MAX_PULSE_US: u32 = 2_500;

pub struct Servo<P> {
    pwm: P,
}

impl<P: SetDutyCycle> Servo<P> {
    pub fn new(pwm: P) -> Self {
        Self { pwm }
    }

    pub fn into_inner(self) -> P {
        self.pwm
    }
}

/// Pulse width for an angle, clamped to 0..=180 degrees.
pub fn pulse_us(angle: u8) -> u32 {
    let angle = angle.min(180) as u32;
    MIN_PULSE_US + (MAX_PULSE_US - MIN_PULSE_US) * angle / 180
}

impl<P: SetDutyCycle> LockServo for Servo<P> {
    fn set_position(&mut self, angle: u8) {
        let pulse = pulse_us(angle) as u16;
        if self
            .pwm
            .set_duty_cycle_fraction(pulse, PERIOD_US as u16)
            .is_err()
        {
            log::warn!("servo: failed to set duty for {} deg", angle);
        }
    }
}
