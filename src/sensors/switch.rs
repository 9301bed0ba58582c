//! Reed / door contact on a pulled-up input.
//!
//! A closed contact shorts the pin to ground, so a high level means open.

use embedded_hal::digital::InputPin;

use crate::app::ports::{RawReading, SensorBus};
use crate::error::BusError;

pub struct SwitchBus<P> {
    pin: P,
}

impl<P: InputPin> SwitchBus<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: InputPin> SensorBus for SwitchBus<P> {
    fn measure(&mut self) -> Result<RawReading, BusError> {
        let open = self.pin.is_high().map_err(|_| BusError::Gpio)?;
        Ok(RawReading {
            contact: Some(open),
            ..RawReading::default()
        })
    }
}
