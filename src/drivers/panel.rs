//! The shared I2C bus and everything on it: the LCD and the RTC.
//!
//! `I2cPanel` owns the bus, so holding the bus arbiter's guard on it is the
//! only way to reach either device.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::lcd::{Lcd, LCD_ADDRESS};
use super::rtc::{self, RTC_ADDRESS};
use super::{CharacterDisplay, RealTimeClock, TimeOfDay};
use crate::Error;

pub struct I2cPanel<I, D> {
    i2c: I,
    delay: D,
    lcd: Lcd,
    rtc_address: u8,
}

impl<I: I2c, D: DelayNs> I2cPanel<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            lcd: Lcd::new(LCD_ADDRESS),
            rtc_address: RTC_ADDRESS,
        }
    }

    pub fn into_inner(self) -> I {
        self.i2c
    }
}

impl<I: I2c, D: DelayNs> CharacterDisplay for I2cPanel<I, D> {
    fn init(&mut self) -> Result<(), Error> {
        self.lcd.init(&mut self.i2c, &mut self.delay)
    }

    fn clear_region(&mut self, line: u8, col: u8, width: u8) -> Result<(), Error> {
        self.lcd.set_cursor(&mut self.i2c, &mut self.delay, line, col)?;
        for _ in 0..width {
            self.lcd.print(&mut self.i2c, &mut self.delay, " ")?;
        }
        Ok(())
    }

    fn write(&mut self, line: u8, col: u8, text: &str) -> Result<(), Error> {
        self.lcd.set_cursor(&mut self.i2c, &mut self.delay, line, col)?;
        self.lcd.print(&mut self.i2c, &mut self.delay, text)
    }

    fn backlight(&mut self, on: bool) -> Result<(), Error> {
        self.lcd.set_backlight(&mut self.i2c, on)
    }
}

impl<I: I2c, D: DelayNs> RealTimeClock for I2cPanel<I, D> {
    fn now(&mut self) -> Result<TimeOfDay, Error> {
        rtc::read_time(&mut self.i2c, self.rtc_address)
    }
}
