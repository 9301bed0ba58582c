//! DS18B20 one-wire temperature driver.
//!
//! Addresses the single device on the line with SKIP ROM, starts a
//! conversion, polls for completion, then reads the 9-byte scratchpad.
//! Byte 8 is a Dallas/Maxim CRC-8 over bytes 0..8; bytes 0..2 hold the
//! temperature as a little-endian signed count of 1/16 °C.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::{RawReading, SensorBus};
use crate::error::BusError;

const CMD_SKIP_ROM: u8 = 0xCC;
const CMD_CONVERT_T: u8 = 0x44;
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

/// 12-bit conversion takes up to 750 ms; polled in 10 ms steps.
const CONVERSION_POLLS: u32 = 80;
const CONVERSION_POLL_MS: u32 = 10;

/// Dallas/Maxim CRC-8 (poly 0x31, reflected).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

/// Validate a scratchpad and return degrees Celsius rounded to 2 decimals.
pub fn decode_scratchpad(pad: &[u8; 9]) -> Result<f32, BusError> {
    if pad.iter().all(|b| *b == 0xFF) {
        return Err(BusError::NoDevice);
    }
    if crc8(&pad[..8]) != pad[8] {
        return Err(BusError::Checksum);
    }
    let raw = i16::from_le_bytes([pad[0], pad[1]]);
    let celsius = f32::from(raw) / 16.0;
    Ok((celsius * 100.0).round() / 100.0)
}

pub struct Ds18b20Bus<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> Ds18b20Bus<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    fn low(&mut self) -> Result<(), BusError> {
        self.pin.set_low().map_err(|_| BusError::Gpio)
    }

    fn release(&mut self) -> Result<(), BusError> {
        self.pin.set_high().map_err(|_| BusError::Gpio)
    }

    /// Reset pulse; `Err(NoDevice)` when nothing pulls the presence slot low.
    fn reset(&mut self) -> Result<(), BusError> {
        self.low()?;
        self.delay.delay_us(480);
        self.release()?;
        self.delay.delay_us(70);
        let present = self.pin.is_low().map_err(|_| BusError::Gpio)?;
        self.delay.delay_us(410);
        if present { Ok(()) } else { Err(BusError::NoDevice) }
    }

    fn write_bit(&mut self, one: bool) -> Result<(), BusError> {
        self.low()?;
        self.delay.delay_us(if one { 6 } else { 60 });
        self.release()?;
        self.delay.delay_us(if one { 64 } else { 10 });
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, BusError> {
        self.low()?;
        self.delay.delay_us(6);
        self.release()?;
        self.delay.delay_us(9);
        let bit = self.pin.is_high().map_err(|_| BusError::Gpio)?;
        self.delay.delay_us(55);
        Ok(bit)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 1 == 1)?;
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, BusError> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    fn read_scratchpad(&mut self) -> Result<[u8; 9], BusError> {
        self.reset()?;
        self.write_byte(CMD_SKIP_ROM)?;
        self.write_byte(CMD_CONVERT_T)?;

        // The device holds the line low while converting.
        let mut done = false;
        for _ in 0..CONVERSION_POLLS {
            self.delay.delay_ms(CONVERSION_POLL_MS);
            if self.read_bit()? {
                done = true;
                break;
            }
        }
        if !done {
            return Err(BusError::Timeout);
        }

        self.reset()?;
        self.write_byte(CMD_SKIP_ROM)?;
        self.write_byte(CMD_READ_SCRATCHPAD)?;
        let mut pad = [0u8; 9];
        for byte in pad.iter_mut() {
            *byte = self.read_byte()?;
        }
        Ok(pad)
    }
}

impl<P, D> SensorBus for Ds18b20Bus<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn measure(&mut self) -> Result<RawReading, BusError> {
        let pad = self.read_scratchpad()?;
        let temperature = decode_scratchpad(&pad)?;
        Ok(RawReading {
            temperature: Some(temperature),
            ..RawReading::default()
        })
    }
}
