//! Sensor subsystem: bus drivers and the [`SensorRegistry`] that turns a
//! raw bus reading into a [`MeasurementSet`].
//!
//! The registry is configured once at boot from `(pin, model, kinds)` and
//! owns the capability descriptors for the rest of the cycle.  Drivers are
//! generic over `embedded-hal` 1.0 so the timing-sensitive code runs on
//! host tests against a scripted line.

pub mod dht;
pub mod ds18b20;
pub mod switch;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::{RawReading, SensorBus};
use crate::capability::{
    CapabilityDescriptor, CapabilityKind, CapabilitySet, MeasurementSet, Reading,
};
use crate::config::NodeConfig;
use crate::error::{BusError, ConfigError, SensorFault};
use dht::{DhtBus, DhtModel};
use ds18b20::Ds18b20Bus;
use switch::SwitchBus;

/// Highest GPIO a sensor may be wired to.
pub const MAX_SENSOR_GPIO: u8 = 16;

/// Plausible ranges; anything outside is a wiring or decode problem.
const TEMPERATURE_RANGE_C: (f32, f32) = (-55.0, 125.0);
const HUMIDITY_RANGE_PCT: (f32, f32) = (0.0, 100.0);

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorModel {
    Dht11,
    Dht22,
    Ds18b20,
    Switch,
}

impl SensorModel {
    /// Case-insensitive; the bare `11`/`22` forms of older configs are accepted.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "DHT11" | "11" => Ok(Self::Dht11),
            "DHT22" | "22" | "AM2302" => Ok(Self::Dht22),
            "DS18B20" => Ok(Self::Ds18b20),
            "SWITCH" => Ok(Self::Switch),
            _ => Err(ConfigError::UnknownModel),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dht11 => "DHT11",
            Self::Dht22 => "DHT22",
            Self::Ds18b20 => "DS18B20",
            Self::Switch => "SWITCH",
        }
    }

    /// Kinds one bus transaction of this model delivers.
    pub fn supported(self) -> CapabilitySet {
        match self {
            Self::Dht11 | Self::Dht22 => {
                [CapabilityKind::Temperature, CapabilityKind::Humidity]
                    .into_iter()
                    .collect()
            }
            Self::Ds18b20 => [CapabilityKind::Temperature].into_iter().collect(),
            Self::Switch => [CapabilityKind::BinaryContact].into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SensorRegistry {
    pin: u8,
    model: SensorModel,
    kinds: CapabilitySet,
    descriptors: heapless::Vec<CapabilityDescriptor, { CapabilityKind::COUNT }>,
}

impl SensorRegistry {
    pub fn configure(
        pin: u8,
        model: &str,
        kinds: CapabilitySet,
        expire_after_secs: u32,
    ) -> Result<Self, ConfigError> {
        if pin > MAX_SENSOR_GPIO {
            return Err(ConfigError::InvalidPin(pin));
        }
        let model = SensorModel::parse(model)?;
        if kinds.is_empty() {
            return Err(ConfigError::NoCapabilities);
        }
        let supported = model.supported();
        let mut descriptors = heapless::Vec::new();
        for kind in kinds.iter() {
            if !supported.contains(kind) {
                return Err(ConfigError::UnsupportedCapability(kind));
            }
            // One slot per kind; the set cannot overflow it.
            let _ = descriptors.push(CapabilityDescriptor::new(kind, expire_after_secs));
        }
        Ok(Self {
            pin,
            model,
            kinds,
            descriptors,
        })
    }

    pub fn from_config(config: &NodeConfig) -> Result<Self, ConfigError> {
        Self::configure(
            config.sensor_pin,
            &config.sensor_model,
            config.capability_set()?,
            config.expire_after_secs,
        )
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn model(&self) -> SensorModel {
        self.model
    }

    pub fn kinds(&self) -> CapabilitySet {
        self.kinds
    }

    /// Descriptors in publish order.
    pub fn descriptors(&self) -> &[CapabilityDescriptor] {
        &self.descriptors
    }

    /// Read the bus once and keep exactly the configured kinds.
    pub fn measure(
        &self,
        bus: &mut impl SensorBus,
        now: u64,
    ) -> Result<MeasurementSet, SensorFault> {
        let raw = bus.measure()?;
        let mut readings: heapless::Vec<(CapabilityKind, Reading), { CapabilityKind::COUNT }> =
            heapless::Vec::new();
        for kind in self.kinds.iter() {
            let _ = readings.push((kind, extract(&raw, kind)?));
        }
        Ok(MeasurementSet::from_readings(now, readings))
    }
}

fn extract(raw: &RawReading, kind: CapabilityKind) -> Result<Reading, SensorFault> {
    let numeric = |value: Option<f32>, (lo, hi): (f32, f32)| match value {
        None => Err(SensorFault::MissingReading(kind)),
        Some(v) if !v.is_finite() || v < lo || v > hi => Err(SensorFault::OutOfRange(kind)),
        Some(v) => Ok(Reading::Numeric(v)),
    };
    match kind {
        CapabilityKind::Temperature => numeric(raw.temperature, TEMPERATURE_RANGE_C),
        CapabilityKind::Humidity => numeric(raw.humidity, HUMIDITY_RANGE_PCT),
        CapabilityKind::BinaryContact => raw
            .contact
            .map(Reading::Binary)
            .ok_or(SensorFault::MissingReading(kind)),
    }
}

// ---------------------------------------------------------------------------
// Model dispatch
// ---------------------------------------------------------------------------

/// The bus driver for whichever model the registry was configured with.
pub enum ModelBus<P, D> {
    Dht(DhtBus<P, D>),
    Ds18b20(Ds18b20Bus<P, D>),
    Switch(SwitchBus<P>),
}

impl<P, D> ModelBus<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// `pin` must be configured open-drain with a pull-up.
    pub fn new(model: SensorModel, pin: P, delay: D) -> Self {
        match model {
            SensorModel::Dht11 => Self::Dht(DhtBus::new(pin, delay, DhtModel::Dht11)),
            SensorModel::Dht22 => Self::Dht(DhtBus::new(pin, delay, DhtModel::Dht22)),
            SensorModel::Ds18b20 => Self::Ds18b20(Ds18b20Bus::new(pin, delay)),
            SensorModel::Switch => Self::Switch(SwitchBus::new(pin)),
        }
    }
}

impl<P, D> SensorBus for ModelBus<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn measure(&mut self) -> Result<RawReading, BusError> {
        match self {
            Self::Dht(bus) => bus.measure(),
            Self::Ds18b20(bus) => bus.measure(),
            Self::Switch(bus) => bus.measure(),
        }
    }
}
