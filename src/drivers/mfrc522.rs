//! MFRC522 RFID transceiver over SPI, ISO 14443A single-size (4-byte) UIDs.
//!
//! Only what the tag reader needs: wake a new card (REQA), anticollision and
//! select on cascade level 1, halt, and clearing the crypto session.

use embedded_hal::spi::SpiDevice;

use super::RfidTransceiver;
use crate::Error;

// Registers
const COMMAND: u8 = 0x01;
const COM_IRQ: u8 = 0x04;
const DIV_IRQ: u8 = 0x05;
const ERROR: u8 = 0x06;
const STATUS2: u8 = 0x08;
const FIFO_DATA: u8 = 0x09;
const FIFO_LEVEL: u8 = 0x0A;
const BIT_FRAMING: u8 = 0x0D;
const COLL: u8 = 0x0E;
const MODE: u8 = 0x11;
const TX_CONTROL: u8 = 0x14;
const TX_ASK: u8 = 0x15;
const CRC_RESULT_H: u8 = 0x21;
const CRC_RESULT_L: u8 = 0x22;
const T_MODE: u8 = 0x2A;
const T_PRESCALER: u8 = 0x2B;
const T_RELOAD_H: u8 = 0x2C;
const T_RELOAD_L: u8 = 0x2D;
const VERSION: u8 = 0x37;

// PCD commands
const PCD_IDLE: u8 = 0x00;
const PCD_CALC_CRC: u8 = 0x03;
const PCD_TRANSCEIVE: u8 = 0x0C;
const PCD_SOFT_RESET: u8 = 0x0F;

// PICC commands
const PICC_REQA: u8 = 0x26;
const PICC_SEL_CL1: u8 = 0x93;
const PICC_HLTA: u8 = 0x50;

const IRQ_TIMER: u8 = 0x01;
const IRQ_RX_IDLE: u8 = 0x30;
const DIV_IRQ_CRC: u8 = 0x04;
const ERR_FATAL: u8 = 0x13; // buffer overflow, parity, protocol
const STATUS2_CRYPTO1_ON: u8 = 0x08;
const POWER_DOWN: u8 = 0x10;

const MAX_POLLS: u32 = 2_000;

pub struct Mfrc522<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Mfrc522<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Soft reset, 25 ms receive timeout, 100% ASK, CRC preset 0x6363, antenna on.
    pub fn init(&mut self) -> Result<(), Error> {
        self.write(COMMAND, PCD_SOFT_RESET)?;
        let mut polls = 0;
        while self.read(COMMAND)? & POWER_DOWN != 0 {
            polls += 1;
            if polls >= MAX_POLLS {
                return Err(Error::Bus);
            }
        }

        self.write(T_MODE, 0x80)?;
        self.write(T_PRESCALER, 0xA9)?;
        self.write(T_RELOAD_H, 0x03)?;
        self.write(T_RELOAD_L, 0xE8)?;
        self.write(TX_ASK, 0x40)?;
        self.write(MODE, 0x3D)?;
        self.set_bits(TX_CONTROL, 0x03)
    }

    pub fn version(&mut self) -> Result<u8, Error> {
        self.read(VERSION)
    }

    pub fn into_inner(self) -> SPI {
        self.spi
    }

    fn read(&mut self, reg: u8) -> Result<u8, Error> {
        let mut buf = [((reg << 1) & 0x7E) | 0x80, 0];
        self.spi.transfer_in_place(&mut buf).map_err(|_| Error::Bus)?;
        Ok(buf[1])
    }

    fn write(&mut self, reg: u8, value: u8) -> Result<(), Error> {
        self.spi
            .write(&[(reg << 1) & 0x7E, value])
            .map_err(|_| Error::Bus)
    }

    fn set_bits(&mut self, reg: u8, mask: u8) -> Result<(), Error> {
        let value = self.read(reg)?;
        self.write(reg, value | mask)
    }

    fn clear_bits(&mut self, reg: u8, mask: u8) -> Result<(), Error> {
        let value = self.read(reg)?;
        self.write(reg, value & !mask)
    }

    fn load_fifo(&mut self, data: &[u8]) -> Result<(), Error> {
        self.write(FIFO_LEVEL, 0x80)?;
        for &byte in data {
            self.write(FIFO_DATA, byte)?;
        }
        Ok(())
    }

    /// Send `data` to the card and collect its answer into `out`.
    /// `tx_last_bits` is the number of valid bits in the final byte (0 = 8).
    fn transceive(&mut self, data: &[u8], out: &mut [u8], tx_last_bits: u8) -> Result<usize, Error> {
        self.write(COMMAND, PCD_IDLE)?;
        self.write(COM_IRQ, 0x7F)?;
        self.load_fifo(data)?;
        self.write(BIT_FRAMING, tx_last_bits & 0x07)?;
        self.write(COMMAND, PCD_TRANSCEIVE)?;
        self.set_bits(BIT_FRAMING, 0x80)?;

        let mut polls = 0;
        loop {
            let irq = self.read(COM_IRQ)?;
            if irq & IRQ_RX_IDLE != 0 {
                break;
            }
            if irq & IRQ_TIMER != 0 {
                self.clear_bits(BIT_FRAMING, 0x80)?;
                return Err(Error::NoCard);
            }
            polls += 1;
            if polls >= MAX_POLLS {
                self.clear_bits(BIT_FRAMING, 0x80)?;
                return Err(Error::NoCard);
            }
        }
        self.clear_bits(BIT_FRAMING, 0x80)?;

        if self.read(ERROR)? & ERR_FATAL != 0 {
            return Err(Error::Bus);
        }

        let available = self.read(FIFO_LEVEL)? as usize;
        let count = available.min(out.len());
        for slot in out.iter_mut().take(count) {
            *slot = self.read(FIFO_DATA)?;
        }
        Ok(count)
    }

    fn calc_crc(&mut self, data: &[u8]) -> Result<[u8; 2], Error> {
        self.write(COMMAND, PCD_IDLE)?;
        self.write(DIV_IRQ, DIV_IRQ_CRC)?;
        self.load_fifo(data)?;
        self.write(COMMAND, PCD_CALC_CRC)?;

        let mut polls = 0;
        while self.read(DIV_IRQ)? & DIV_IRQ_CRC == 0 {
            polls += 1;
            if polls >= MAX_POLLS {
                return Err(Error::Bus);
            }
        }
        self.write(COMMAND, PCD_IDLE)?;
        Ok([self.read(CRC_RESULT_L)?, self.read(CRC_RESULT_H)?])
    }

    fn select(&mut self, uid: &[u8; 4], bcc: u8) -> Result<(), Error> {
        let mut frame = [PICC_SEL_CL1, 0x70, uid[0], uid[1], uid[2], uid[3], bcc, 0, 0];
        let crc = self.calc_crc(&frame[..7])?;
        frame[7] = crc[0];
        frame[8] = crc[1];

        let mut sak = [0u8; 3];
        match self.transceive(&frame, &mut sak, 0)? {
            3 => Ok(()),
            _ => Err(Error::NoCard),
        }
    }
}

impl<SPI: SpiDevice> RfidTransceiver for Mfrc522<SPI> {
    fn card_present(&mut self) -> bool {
        if self.clear_bits(COLL, 0x80).is_err() {
            return false;
        }
        let mut atqa = [0u8; 2];
        matches!(self.transceive(&[PICC_REQA], &mut atqa, 7), Ok(2))
    }

    fn read_uid(&mut self) -> Result<[u8; 4], Error> {
        let mut answer = [0u8; 5];
        if self.transceive(&[PICC_SEL_CL1, 0x20], &mut answer, 0)? != 5 {
            return Err(Error::NoCard);
        }
        let uid = [answer[0], answer[1], answer[2], answer[3]];
        let bcc = answer[4];
        if uid.iter().fold(0u8, |acc, b| acc ^ b) != bcc {
            return Err(Error::Bus);
        }
        self.select(&uid, bcc)?;
        Ok(uid)
    }

    fn halt(&mut self) {
        let Ok(crc) = self.calc_crc(&[PICC_HLTA, 0x00]) else {
            log::debug!("rfid: halt crc failed");
            return;
        };
        // A halted card stays silent, so a timeout here is success.
        let _ = self.transceive(&[PICC_HLTA, 0x00, crc[0], crc[1]], &mut [], 0);
    }

    fn stop_crypto(&mut self) {
        if self.clear_bits(STATUS2, STATUS2_CRYPTO1_ON).is_err() {
            log::debug!("rfid: failed to clear crypto1");
        }
    }
}
