//! Tests for the thin peripheral drivers: RTC decoding, servo pulses and the
//! I2C panel.

use door_controller::drivers::mfrc522::Mfrc522;
use door_controller::drivers::panel::I2cPanel;
use door_controller::drivers::rtc::{decode_time, RTC_ADDRESS};
use door_controller::drivers::servo::{pulse_us, Servo};
use door_controller::drivers::{
    CharacterDisplay, LockServo, RealTimeClock, RfidTransceiver, TimeOfDay,
};
use door_controller::Error;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, I2c, Operation};
use embedded_hal::pwm::{self, SetDutyCycle};
use embedded_hal::spi::{self, SpiDevice};

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// I2C bus that records writes and answers reads with `regs`.
#[derive(Default)]
struct FakeI2c {
    writes: Vec<(u8, Vec<u8>)>,
    regs: Vec<u8>,
    nack: bool,
}

impl i2c::ErrorType for FakeI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for FakeI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.nack {
            return Err(i2c::ErrorKind::NoAcknowledge(
                i2c::NoAcknowledgeSource::Address,
            ));
        }
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                Operation::Read(buf) => {
                    for (i, b) in buf.iter_mut().enumerate() {
                        *b = self.regs.get(i).copied().unwrap_or(0);
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct FakePwm {
    duties: Vec<u16>,
}

impl pwm::ErrorType for FakePwm {
    type Error = pwm::ErrorKind;
}

impl SetDutyCycle for FakePwm {
    fn max_duty_cycle(&self) -> u16 {
        20_000
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duties.push(duty);
        Ok(())
    }
}

/// MFRC522 register file behind SPI: address byte `0b1RRRRRR0` reads,
/// `0b0RRRRRR0` writes.
struct FakeSpi {
    regs: [u8; 64],
}

impl spi::ErrorType for FakeSpi {
    type Error = spi::ErrorKind;
}

impl SpiDevice for FakeSpi {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), Self::Error> {
        for op in operations.iter_mut() {
            match op {
                spi::Operation::Write(bytes) => {
                    let reg = ((bytes[0] >> 1) & 0x3F) as usize;
                    self.regs[reg] = bytes[1];
                }
                spi::Operation::TransferInPlace(buf) => {
                    let reg = ((buf[0] >> 1) & 0x3F) as usize;
                    buf[1] = self.regs[reg];
                }
                _ => return Err(spi::ErrorKind::Other),
            }
        }
        Ok(())
    }
}

// ============================================================================
// RTC
// ============================================================================

#[test]
fn test_decode_time_24h() {
    assert_eq!(
        decode_time([0x45, 0x30, 0x23]),
        TimeOfDay {
            hour: 23,
            minute: 30,
            second: 45
        }
    );
}

#[test]
fn test_decode_time_12h_pm() {
    // 12h mode, PM, 03
    let time = decode_time([0x00, 0x15, 0x40 | 0x20 | 0x03]);
    assert_eq!(time.hour, 15);
    assert_eq!(time.minute, 15);
}

#[test]
fn test_decode_time_12h_midnight_and_noon() {
    assert_eq!(decode_time([0, 0, 0x40 | 0x12]).hour, 0);
    assert_eq!(decode_time([0, 0, 0x40 | 0x20 | 0x12]).hour, 12);
}

#[test]
fn test_time_of_day_display() {
    let time = TimeOfDay {
        hour: 9,
        minute: 4,
        second: 0,
    };
    assert_eq!(time.to_string(), "09:04:00");
}

// ============================================================================
// Servo
// ============================================================================

#[test]
fn test_pulse_width_range() {
    assert_eq!(pulse_us(0), 500);
    assert_eq!(pulse_us(90), 1_500);
    assert_eq!(pulse_us(180), 2_500);
    assert_eq!(pulse_us(255), 2_500);
}

#[test]
fn test_servo_sets_duty_for_angle() {
    let mut servo = Servo::new(FakePwm::default());
    servo.set_position(180);
    servo.set_position(0);
    let pwm = servo.into_inner();
    assert_eq!(pwm.duties, vec![2_500, 500]);
}

// ============================================================================
// I2cPanel
// ============================================================================

#[test]
fn test_panel_reads_rtc_registers() {
    let i2c = FakeI2c {
        regs: vec![0x07, 0x59, 0x18],
        ..Default::default()
    };
    let mut panel = I2cPanel::new(i2c, NoDelay);
    assert_eq!(
        panel.now(),
        Ok(TimeOfDay {
            hour: 18,
            minute: 59,
            second: 7
        })
    );
    let i2c = panel.into_inner();
    assert_eq!(i2c.writes, vec![(RTC_ADDRESS, vec![0x00])]);
}

#[test]
fn test_panel_bus_error_maps_to_error() {
    let i2c = FakeI2c {
        nack: true,
        ..Default::default()
    };
    let mut panel = I2cPanel::new(i2c, NoDelay);
    assert_eq!(panel.now(), Err(Error::Bus));
    assert_eq!(panel.backlight(true), Err(Error::Bus));
}

#[test]
fn test_panel_write_goes_to_lcd_address() {
    let mut panel = I2cPanel::new(FakeI2c::default(), NoDelay);
    panel.write(1, 8, "Locked").unwrap();
    let i2c = panel.into_inner();
    assert!(!i2c.writes.is_empty());
    assert!(i2c.writes.iter().all(|(addr, _)| *addr == 0x27));
}

#[test]
fn test_panel_clear_region_prints_spaces() {
    let mut plain = I2cPanel::new(FakeI2c::default(), NoDelay);
    plain.write(0, 8, "        ").unwrap();
    let mut cleared = I2cPanel::new(FakeI2c::default(), NoDelay);
    cleared.clear_region(0, 8, 8).unwrap();

    assert_eq!(cleared.into_inner().writes, plain.into_inner().writes);
}

#[test]
fn test_panel_backlight_bit() {
    let mut panel = I2cPanel::new(FakeI2c::default(), NoDelay);
    panel.backlight(true).unwrap();
    panel.backlight(false).unwrap();
    let i2c = panel.into_inner();
    assert_eq!(i2c.writes, vec![(0x27, vec![0x08]), (0x27, vec![0x00])]);
}

// ============================================================================
// MFRC522
// ============================================================================

#[test]
fn test_mfrc522_reads_version_register() {
    let mut regs = [0u8; 64];
    regs[0x37] = 0x92;
    let mut rfid = Mfrc522::new(FakeSpi { regs });
    assert_eq!(rfid.version(), Ok(0x92));
}

#[test]
fn test_mfrc522_stop_crypto_clears_only_crypto_bit() {
    let mut regs = [0u8; 64];
    regs[0x08] = 0x0B;
    let mut rfid = Mfrc522::new(FakeSpi { regs });
    rfid.stop_crypto();
    assert_eq!(rfid.into_inner().regs[0x08], 0x03);
}

#[test]
fn test_mfrc522_init_configures_timer_and_antenna() {
    let mut rfid = Mfrc522::new(FakeSpi { regs: [0u8; 64] });
    assert_eq!(rfid.init(), Ok(()));
    let regs = rfid.into_inner().regs;
    assert_eq!(regs[0x2A], 0x80);
    assert_eq!(regs[0x2B], 0xA9);
    assert_eq!(regs[0x15], 0x40);
    assert_eq!(regs[0x11], 0x3D);
    assert_eq!(regs[0x14] & 0x03, 0x03);
}
