//! HD44780 16x2 character LCD behind a PCF8574 I2C backpack (4-bit mode).
//!
//! Backpack pin map: P0=RS, P1=RW, P2=EN, P3=backlight, P4..P7=D4..D7.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::Error;

pub const LCD_ADDRESS: u8 = 0x27;
pub const LCD_COLUMNS: u8 = 16;
pub const LCD_ROWS: u8 = 2;

const RS: u8 = 0x01;
const EN: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE_INC: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;

const ROW_OFFSETS: [u8; 2] = [0x00, 0x40];

/// LCD state; the bus is passed in per call because it is shared with the RTC.
pub struct Lcd {
    address: u8,
    backlight: bool,
}

impl Lcd {
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            backlight: false,
        }
    }

    /// Power-on initialization into 4-bit, two-line mode, display cleared.
    pub fn init<I: I2c, D: DelayNs>(&mut self, i2c: &mut I, delay: &mut D) -> Result<(), Error> {
        delay.delay_ms(50);

        // Reset sequence: three 8-bit function sets, then switch to 4-bit
        self.write_nibble(i2c, delay, 0x30, 0)?;
        delay.delay_ms(5);
        self.write_nibble(i2c, delay, 0x30, 0)?;
        delay.delay_us(150);
        self.write_nibble(i2c, delay, 0x30, 0)?;
        self.write_nibble(i2c, delay, 0x20, 0)?;

        self.command(i2c, delay, CMD_FUNCTION_4BIT_2LINE)?;
        self.command(i2c, delay, CMD_DISPLAY_ON)?;
        self.command(i2c, delay, CMD_ENTRY_MODE_INC)?;
        self.clear(i2c, delay)
    }

    pub fn clear<I: I2c, D: DelayNs>(&mut self, i2c: &mut I, delay: &mut D) -> Result<(), Error> {
        self.command(i2c, delay, CMD_CLEAR)?;
        delay.delay_ms(2);
        Ok(())
    }

    pub fn set_cursor<I: I2c, D: DelayNs>(
        &mut self,
        i2c: &mut I,
        delay: &mut D,
        row: u8,
        col: u8,
    ) -> Result<(), Error> {
        let row = row.min(LCD_ROWS - 1) as usize;
        let col = col.min(LCD_COLUMNS - 1);
        self.command(i2c, delay, CMD_SET_DDRAM | (ROW_OFFSETS[row] + col))
    }

    pub fn print<I: I2c, D: DelayNs>(
        &mut self,
        i2c: &mut I,
        delay: &mut D,
        text: &str,
    ) -> Result<(), Error> {
        for byte in text.bytes() {
            self.send(i2c, delay, byte, RS)?;
        }
        Ok(())
    }

    pub fn set_backlight<I: I2c>(&mut self, i2c: &mut I, on: bool) -> Result<(), Error> {
        self.backlight = on;
        i2c.write(self.address, &[self.backlight_bit()])
            .map_err(|_| Error::Bus)
    }

    pub fn backlight(&self) -> bool {
        self.backlight
    }

    fn command<I: I2c, D: DelayNs>(&mut self, i2c: &mut I, delay: &mut D, cmd: u8) -> Result<(), Error> {
        self.send(i2c, delay, cmd, 0)
    }

    fn send<I: I2c, D: DelayNs>(
        &mut self,
        i2c: &mut I,
        delay: &mut D,
        byte: u8,
        mode: u8,
    ) -> Result<(), Error> {
        self.write_nibble(i2c, delay, byte & 0xF0, mode)?;
        self.write_nibble(i2c, delay, (byte << 4) & 0xF0, mode)
    }

    fn write_nibble<I: I2c, D: DelayNs>(
        &mut self,
        i2c: &mut I,
        delay: &mut D,
        nibble: u8,
        mode: u8,
    ) -> Result<(), Error> {
        let data = nibble | mode | self.backlight_bit();
        i2c.write(self.address, &[data | EN]).map_err(|_| Error::Bus)?;
        delay.delay_us(1);
        i2c.write(self.address, &[data]).map_err(|_| Error::Bus)?;
        delay.delay_us(50);
        Ok(())
    }

    fn backlight_bit(&self) -> u8 {
        if self.backlight {
            BACKLIGHT
        } else {
            0
        }
    }
}
