//! DHT11 / DHT22 single-wire temperature and humidity driver.
//!
//! The host pulls the line low to request a frame, then releases it.  The
//! sensor answers with an 80 µs low / 80 µs high preamble followed by 40
//! bits, each a 50 µs low then a high pulse whose length encodes the bit
//! (~27 µs = 0, ~70 µs = 1).  Frame layout:
//!
//! ```text
//!  [hum_hi] [hum_lo] [temp_hi] [temp_lo] [checksum]
//! ```
//!
//! [`decode_frame`] is pure and covers both models.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::{RawReading, SensorBus};
use crate::error::BusError;

/// Upper bound for any single level phase of the answer.
const PHASE_TIMEOUT_US: u32 = 100;
/// High pulses longer than this are a `1` bit.
const ONE_BIT_THRESHOLD_US: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtModel {
    Dht11,
    Dht22,
}

impl DhtModel {
    /// How long the host must hold the line low to start a conversion.
    fn start_low_ms(self) -> u32 {
        match self {
            Self::Dht11 => 18,
            Self::Dht22 => 2,
        }
    }
}

/// Decode a received frame into `(temperature_c, humidity_pct)`.
pub fn decode_frame(model: DhtModel, frame: &[u8; 5]) -> Result<(f32, f32), BusError> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(BusError::Checksum);
    }

    let negative = frame[2] & 0x80 != 0;
    let (humidity, magnitude) = match model {
        DhtModel::Dht11 => (
            f32::from(frame[0]) + f32::from(frame[1]) * 0.1,
            f32::from(frame[2] & 0x7F) + f32::from(frame[3]) * 0.1,
        ),
        DhtModel::Dht22 => (
            f32::from(u16::from_be_bytes([frame[0], frame[1]])) / 10.0,
            f32::from(u16::from_be_bytes([frame[2] & 0x7F, frame[3]])) / 10.0,
        ),
    };
    let temperature = if negative { -magnitude } else { magnitude };
    Ok((temperature, humidity))
}

pub struct DhtBus<P, D> {
    pin: P,
    delay: D,
    model: DhtModel,
}

impl<P, D> DhtBus<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D, model: DhtModel) -> Self {
        Self { pin, delay, model }
    }

    fn read_frame(&mut self) -> Result<[u8; 5], BusError> {
        self.pin.set_low().map_err(|_| BusError::Gpio)?;
        self.delay.delay_ms(self.model.start_low_ms());
        self.pin.set_high().map_err(|_| BusError::Gpio)?;

        // Preamble: sensor pulls low, releases, then starts the first bit.
        self.wait_for(false)?;
        self.wait_for(true)?;
        self.wait_for(false)?;

        let mut frame = [0u8; 5];
        for bit in 0..40 {
            self.wait_for(true)?;
            let high_us = self.wait_for(false)?;
            if high_us > ONE_BIT_THRESHOLD_US {
                frame[bit / 8] |= 1 << (7 - bit % 8);
            }
        }
        Ok(frame)
    }

    /// Poll until the line reaches `high`; returns the microseconds waited.
    fn wait_for(&mut self, high: bool) -> Result<u32, BusError> {
        let mut waited = 0;
        loop {
            if self.pin.is_high().map_err(|_| BusError::Gpio)? == high {
                return Ok(waited);
            }
            if waited >= PHASE_TIMEOUT_US {
                return Err(BusError::Timeout);
            }
            self.delay.delay_us(1);
            waited += 1;
        }
    }
}

impl<P, D> SensorBus for DhtBus<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn measure(&mut self) -> Result<RawReading, BusError> {
        let frame = self.read_frame()?;
        let (temperature, humidity) = decode_frame(self.model, &frame)?;
        log::debug!("{:?} frame {:02x?}", self.model, frame);
        Ok(RawReading {
            temperature: Some(temperature),
            humidity: Some(humidity),
            contact: None,
        })
    }
}
