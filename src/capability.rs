//! Capability kinds, readings and the fixed-size sets built over them.
//!
//! A capability is one measurable quantity of the node (temperature,
//! humidity, contact).  The set of kinds is closed, so every per-kind
//! collection here is a fixed array indexed by [`CapabilityKind::index`]
//! rather than a map.

use core::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum CapabilityKind {
    Temperature = 0,
    Humidity = 1,
    BinaryContact = 2,
}

/// Static per-kind metadata, fixed at compile time.
#[derive(Debug)]
pub struct KindInfo {
    /// Name used in topics and entity names.
    pub slug: &'static str,
    pub unit: Option<&'static str>,
    pub device_class: &'static str,
    pub numeric: bool,
}

static KIND_TABLE: [KindInfo; CapabilityKind::COUNT] = [
    KindInfo {
        slug: "temperature",
        unit: Some("°C"),
        device_class: "temperature",
        numeric: true,
    },
    KindInfo {
        slug: "humidity",
        unit: Some("%"),
        device_class: "humidity",
        numeric: true,
    },
    KindInfo {
        slug: "contact",
        unit: None,
        device_class: "door",
        numeric: false,
    },
];

impl CapabilityKind {
    pub const COUNT: usize = 3;

    /// Every kind, in publish order.
    pub const ALL: [Self; Self::COUNT] = [Self::Temperature, Self::Humidity, Self::BinaryContact];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn info(self) -> &'static KindInfo {
        &KIND_TABLE[self.index()]
    }

    pub fn slug(self) -> &'static str {
        self.info().slug
    }

    pub fn unit(self) -> Option<&'static str> {
        self.info().unit
    }

    pub fn device_class(self) -> &'static str {
        self.info().device_class
    }

    pub fn is_numeric(self) -> bool {
        self.info().numeric
    }

    /// Parse a configured capability name.  Accepts the short aliases
    /// used by existing node configs (`t`, `hum`, `bin`, ...).
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "temperature" | "temp" | "t" => Ok(Self::Temperature),
            "humidity" | "hum" | "h" => Ok(Self::Humidity),
            "door" | "binary" | "bin" | "contact" => Ok(Self::BinaryContact),
            _ => Err(ConfigError::UnknownCapability),
        }
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One measured value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reading {
    Numeric(f32),
    Binary(bool),
}

/// Rendered state payload; the longest numeric value fits comfortably.
pub type StatePayload = heapless::String<24>;

impl Reading {
    /// Render the value as the hub expects it on the state topic.
    ///
    /// Numbers use at most two decimals with trailing zeros dropped
    /// (`20.4`, `40`, `21.06`); contacts use `ON`/`OFF`.
    pub fn state_payload(&self) -> StatePayload {
        let mut out = StatePayload::new();
        match *self {
            Self::Numeric(v) => {
                let _ = write!(out, "{:.2}", v);
                if out.contains('.') {
                    while out.ends_with('0') {
                        out.pop();
                    }
                    if out.ends_with('.') {
                        out.pop();
                    }
                }
                if out == "-0" {
                    out.clear();
                    let _ = out.push('0');
                }
            }
            Self::Binary(true) => {
                let _ = out.push_str(BINARY_ON);
            }
            Self::Binary(false) => {
                let _ = out.push_str(BINARY_OFF);
            }
        }
        out
    }
}

pub const BINARY_ON: &str = "ON";
pub const BINARY_OFF: &str = "OFF";

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Declares one capability of this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    pub kind: CapabilityKind,
    /// Seconds after which the hub marks the entity unavailable when no
    /// state arrives.  Must exceed the sleep interval (see config validation).
    pub expire_after_secs: u32,
}

impl CapabilityDescriptor {
    pub fn new(kind: CapabilityKind, expire_after_secs: u32) -> Self {
        Self {
            kind,
            expire_after_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// CapabilitySet
// ---------------------------------------------------------------------------

/// Fixed-size set of kinds, one bit per [`CapabilityKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Insert a kind.  Returns `false` if it was already present.
    pub fn insert(&mut self, kind: CapabilityKind) -> bool {
        let had = self.contains(kind);
        self.0 |= 1 << kind.index();
        !had
    }

    /// Remove a kind.  Returns `false` if it was not present.
    pub fn remove(&mut self, kind: CapabilityKind) -> bool {
        let had = self.contains(kind);
        self.0 &= !(1 << kind.index());
        had
    }

    pub fn contains(&self, kind: CapabilityKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Kinds in publish order.
    pub fn iter(&self) -> impl Iterator<Item = CapabilityKind> + '_ {
        CapabilityKind::ALL.into_iter().filter(|k| self.contains(*k))
    }
}

impl FromIterator<CapabilityKind> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = CapabilityKind>>(iter: I) -> Self {
        let mut set = Self::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// MeasurementSet
// ---------------------------------------------------------------------------

/// Readings captured in one wake cycle, keyed by kind.
///
/// Built once by the sensor registry and then only read or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSet {
    readings: [Option<Reading>; CapabilityKind::COUNT],
    /// Wall-clock seconds at capture.
    captured_at: u64,
}

impl MeasurementSet {
    /// Build a set from `(kind, reading)` pairs.  A later pair for the
    /// same kind replaces an earlier one.
    pub fn from_readings<I>(captured_at: u64, readings: I) -> Self
    where
        I: IntoIterator<Item = (CapabilityKind, Reading)>,
    {
        let mut slots = [None; CapabilityKind::COUNT];
        for (kind, reading) in readings {
            slots[kind.index()] = Some(reading);
        }
        Self {
            readings: slots,
            captured_at,
        }
    }

    pub fn get(&self, kind: CapabilityKind) -> Option<Reading> {
        self.readings[kind.index()]
    }

    pub fn captured_at(&self) -> u64 {
        self.captured_at
    }

    /// The set of kinds that carry a reading.
    pub fn kinds(&self) -> CapabilitySet {
        self.iter().map(|(k, _)| k).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CapabilityKind, Reading)> + '_ {
        CapabilityKind::ALL
            .into_iter()
            .filter_map(|k| self.readings[k.index()].map(|r| (k, r)))
    }
}
