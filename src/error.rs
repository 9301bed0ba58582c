//! Unified error types for the sensor node firmware.
//!
//! Every subsystem converts into the single [`Error`] enum so the cycle
//! orchestration can route each failure class to its recovery policy:
//!
//! | Variant        | Policy                                             |
//! |----------------|----------------------------------------------------|
//! | `Config`       | fatal at boot                                      |
//! | `Sensor`       | skip reporting this cycle, keep snapshot, sleep    |
//! | `Connectivity` | abort the publish sequence, keep snapshot, sleep   |
//! | `Transport`    | per publish, continue with the remaining messages  |
//! | `Persistence`  | log, behave as if never reported                   |
//!
//! All variants are `Copy` so they travel through events without allocation.

use core::fmt;

use crate::capability::CapabilityKind;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Configuration is invalid (bad pin, unknown model, bad document).
    Config(ConfigError),
    /// The sensor could not be read this cycle.
    Sensor(SensorFault),
    /// The network could not be brought up.
    Connectivity(ConnectivityError),
    /// The MQTT session failed to open or a publish failed.
    Transport(TransportFault),
    /// The persisted snapshot could not be read or written.
    Persistence(StorageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Connectivity(e) => write!(f, "connectivity: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Persistence(e) => write!(f, "persistence: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// GPIO number outside the usable range.
    InvalidPin(u8),
    /// Sensor model name not recognised.
    UnknownModel,
    /// Capability name not recognised.
    UnknownCapability,
    /// The model cannot produce the requested capability.
    UnsupportedCapability(CapabilityKind),
    /// No capability was requested.
    NoCapabilities,
    /// The configuration document could not be parsed.
    Parse,
    /// A field failed range validation; the message names the field.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPin(pin) => write!(f, "invalid GPIO {pin}"),
            Self::UnknownModel => write!(f, "sensor model not supported"),
            Self::UnknownCapability => write!(f, "capability not supported"),
            Self::UnsupportedCapability(kind) => {
                write!(f, "model cannot measure {}", kind.slug())
            }
            Self::NoCapabilities => write!(f, "no capability configured"),
            Self::Parse => write!(f, "config document malformed"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor faults
// ---------------------------------------------------------------------------

/// Low-level failure reported by a sensor bus driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Frame or scratchpad checksum mismatch.
    Checksum,
    /// The device did not answer within its timing window.
    Timeout,
    /// No device answered the bus reset / presence pulse.
    NoDevice,
    /// The GPIO itself could not be driven or sampled.
    Gpio,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checksum => write!(f, "checksum mismatch"),
            Self::Timeout => write!(f, "bus timeout"),
            Self::NoDevice => write!(f, "no device on bus"),
            Self::Gpio => write!(f, "GPIO access failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFault {
    /// The bus read failed.
    Bus(BusError),
    /// The bus answered but did not carry a value for this capability.
    MissingReading(CapabilityKind),
    /// The value is outside the physically plausible range.
    OutOfRange(CapabilityKind),
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "{e}"),
            Self::MissingReading(kind) => write!(f, "no {} in reading", kind.slug()),
            Self::OutOfRange(kind) => write!(f, "{} reading out of range", kind.slug()),
        }
    }
}

impl From<BusError> for SensorFault {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<SensorFault> for Error {
    fn from(e: SensorFault) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Connectivity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    /// The configured access point was not found by the scan.
    ApNotInRange,
    /// Association or DHCP did not complete within the timeout.
    Timeout,
    ConnectionFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ApNotInRange => write!(f, "access point not in range"),
            Self::Timeout => write!(f, "WiFi connection timed out"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

// ---------------------------------------------------------------------------
// Transport faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFault {
    /// The broker refused or never acknowledged the session.
    ConnectFailed,
    /// The client rejected a last-will registration.
    WillRejected,
    /// A single publish could not be enqueued or sent.
    PublishFailed,
    /// A payload could not be encoded.
    Encode,
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "MQTT connect failed"),
            Self::WillRejected => write!(f, "MQTT last will rejected"),
            Self::PublishFailed => write!(f, "MQTT publish failed"),
            Self::Encode => write!(f, "payload encoding failed"),
        }
    }
}

impl From<TransportFault> for Error {
    fn from(e: TransportFault) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Stored blob failed deserialization.
    Corrupted,
    /// Storage partition is full.
    Full,
    /// Generic I/O error from the backend.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "stored data corrupted"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Persistence(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
