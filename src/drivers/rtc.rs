//! DS3231 time-of-day read.

use embedded_hal::i2c::I2c;

use super::TimeOfDay;
use crate::Error;

pub const RTC_ADDRESS: u8 = 0x68;

const REG_SECONDS: u8 = 0x00;
const HOUR_12H: u8 = 0x40;
const HOUR_PM: u8 = 0x20;

pub fn read_time<I: I2c>(i2c: &mut I, address: u8) -> Result<TimeOfDay, Error> {
    let mut regs = [0u8; 3];
    i2c.write_read(address, &[REG_SECONDS], &mut regs)
        .map_err(|_| Error::Bus)?;
    Ok(decode_time(regs))
}

/// Decode the seconds, minutes and hours registers (BCD, 12h or 24h mode).
pub fn decode_time(regs: [u8; 3]) -> TimeOfDay {
    let [sec, min, hour] = regs;
    let hour = if hour & HOUR_12H != 0 {
        let h12 = bcd(hour & 0x1F) % 12;
        if hour & HOUR_PM != 0 {
            h12 + 12
        } else {
            h12
        }
    } else {
        bcd(hour & 0x3F)
    };
    TimeOfDay {
        hour,
        minute: bcd(min & 0x7F),
        second: bcd(sec & 0x7F),
    }
}

fn bcd(v: u8) -> u8 {
    (v >> 4) * 10 + (v & 0x0F)
}
