//! Port traits: the hexagonal boundary between the wake cycle and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (sensor bus, Wi-Fi, MQTT client, NVS, sleep timer,
//! watchdog, clock, event sinks) implement these traits.  The
//! [`NodeService`](super::service::NodeService) consumes them via generics,
//! so the cycle logic never touches hardware directly and every path runs
//! on the host against recording fakes.
//!
//! Every call that can block carries its own bound (timeout or attempt
//! count); none of these traits is expected to wait indefinitely.

use std::net::Ipv4Addr;

use crate::config::StaticIpConfig;
use crate::error::{BusError, ConnectivityError, StorageError, TransportFault};

// ───────────────────────────────────────────────────────────────
// Sensor bus (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw values as one bus transaction delivered them.  A driver fills only
/// the quantities its device produces.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawReading {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    /// `true` = contact open.
    pub contact: Option<bool>,
}

/// One blocking bus transaction against the configured sensor.
pub trait SensorBus {
    fn measure(&mut self) -> Result<RawReading, BusError>;
}

// ───────────────────────────────────────────────────────────────
// Network
// ───────────────────────────────────────────────────────────────

/// What the node knows about its link once associated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub ip: Ipv4Addr,
}

pub trait NetworkPort {
    /// One association attempt, bounded by `timeout_secs`.  Retries are the
    /// caller's business.
    fn connect(
        &mut self,
        ssid: &str,
        password: &str,
        static_ip: Option<&StaticIpConfig>,
        timeout_secs: u32,
    ) -> Result<NetworkInfo, ConnectivityError>;

    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Publish/subscribe transport
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerAddress<'a> {
    pub host: &'a str,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub user: &'a str,
    pub password: &'a str,
}

/// MQTT-shaped client.  Wills must be registered before `connect`.
pub trait PubSubPort {
    fn set_last_will(&mut self, topic: &str, payload: &[u8], retain: bool)
    -> Result<(), TransportFault>;

    fn connect(
        &mut self,
        client_id: &str,
        broker: BrokerAddress<'_>,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), TransportFault>;

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), TransportFault>;

    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Blob storage for the last reported snapshot.
///
/// `save` MUST replace the previous value atomically: after a power loss
/// either the old or the new blob is readable, never a mix.  The ESP-IDF
/// NVS commit guarantees this natively.
pub trait StoragePort {
    /// `Ok(None)` when nothing was ever stored under `key`.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    fn save(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Sleep, watchdog and clock
// ───────────────────────────────────────────────────────────────

/// Why the chip last came out of reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    PowerOn,
    Watchdog,
    /// Woken by the RTC alarm armed before deep sleep.
    SleepWake,
    Other,
}

impl ResetCause {
    /// Anything but a timer wake means RTC state cannot be trusted.
    pub fn is_first_boot(self) -> bool {
        self != Self::SleepWake
    }
}

pub trait SleepPort {
    fn reset_cause(&self) -> ResetCause;

    fn arm_alarm(&mut self, secs: u32);

    /// Enter deep sleep.  On hardware this does not return.
    fn enter_low_power(&mut self);

    /// Stay awake for `secs` seconds (development mode).
    fn busy_wait(&mut self, secs: u32);
}

/// Cooperative watchdog feed, called between blocking steps.
pub trait LivenessPort {
    fn feed(&mut self);
}

pub trait ClockPort {
    /// Wall-clock seconds.  Survives deep sleep via the RTC.
    fn now_secs(&self) -> u64;

    /// Seconds since this boot.
    fn uptime_secs(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
