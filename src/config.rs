//! Node configuration.
//!
//! A static key-value document read once at boot.  The device build embeds
//! `node_config.json`; field aliases accept the key names used by older
//! node configs (`wifi_passwd`, `mqtt_server`, `dht_pin`, ...).

use serde::{Deserialize, Serialize};

use crate::capability::{CapabilityKind, CapabilitySet};
use crate::error::ConfigError;
use crate::policy::Tolerances;
use crate::sensors::SensorRegistry;

/// Minimum slack between the sleep interval and the hub's `expire_after`,
/// covering boot, association and publish time of the next cycle.
pub const EXPIRE_MARGIN_SECS: i64 = 60;

/// Upper bound for the dev-mode busy wait.
pub const MAX_BUSY_WAIT_SECS: u32 = 3600;

/// Fixed IPv4 assignment, skipping DHCP to shorten radio-on time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticIpConfig {
    pub ip: String,
    pub gateway: String,
    #[serde(default = "default_netmask_bits")]
    pub netmask_bits: u8,
    #[serde(default)]
    pub dns: Option<String>,
}

fn default_netmask_bits() -> u8 {
    24
}

/// Node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    // --- Identity ---
    /// Human-readable name; empty means "use the device id".
    pub device_name: String,
    pub manufacturer: String,
    pub model: String,

    // --- WiFi ---
    pub wifi_ssid: String,
    #[serde(alias = "wifi_passwd")]
    pub wifi_password: String,
    /// Per-attempt association timeout.
    #[serde(alias = "wifi_timeout_sec")]
    pub wifi_timeout_secs: u32,
    pub wifi_attempts: u8,
    pub static_ip: Option<StaticIpConfig>,

    // --- MQTT ---
    #[serde(alias = "mqtt_server")]
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_password: String,
    pub discovery_prefix: String,
    /// Seconds the hub keeps an entity available without a new state.
    pub expire_after_secs: u32,

    // --- Sensor ---
    #[serde(alias = "dht_pin")]
    pub sensor_pin: u8,
    #[serde(alias = "dht_model")]
    pub sensor_model: String,
    pub capabilities: Vec<String>,

    // --- Report policy ---
    /// Temperature tolerance band (°C).
    pub temp_threshold: f32,
    /// Humidity tolerance band (%).
    pub hum_threshold: f32,
    /// Report at least this often even when values are stable.
    #[serde(alias = "time_threshold")]
    pub time_threshold_secs: u32,

    // --- Power ---
    /// Deep-sleep interval.  Zero or negative selects the dev busy-wait
    /// of `|sleep_time_secs|` seconds instead of powering down.
    #[serde(alias = "sleep_time_sec")]
    pub sleep_time_secs: i32,
    /// Shorter interval used after the network could not be reached.
    pub retry_sleep_secs: u32,
    pub watchdog_timeout_secs: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            manufacturer: "Espressif".into(),
            model: "NodeMCU-8266".into(),

            wifi_ssid: String::new(),
            wifi_password: String::new(),
            wifi_timeout_secs: 30,
            wifi_attempts: 3,
            static_ip: None,

            mqtt_host: String::new(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_password: String::new(),
            discovery_prefix: "homeassistant".into(),
            expire_after_secs: 1800,

            sensor_pin: 4,
            sensor_model: "DHT22".into(),
            capabilities: vec!["temperature".into(), "humidity".into()],

            temp_threshold: 0.5,
            hum_threshold: 2.0,
            time_threshold_secs: 900,

            sleep_time_secs: 600,
            retry_sleep_secs: 30,
            watchdog_timeout_secs: 60,
        }
    }
}

impl NodeConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(doc: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(doc).map_err(|_| ConfigError::Parse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range-check every field that the cycle relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wifi_ssid.len() > 32 {
            return Err(ConfigError::ValidationFailed("wifi_ssid must be at most 32 bytes"));
        }
        if self.wifi_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed("wifi_timeout_secs must be > 0"));
        }
        if self.wifi_attempts == 0 {
            return Err(ConfigError::ValidationFailed("wifi_attempts must be > 0"));
        }
        if let Some(ip) = &self.static_ip {
            if ip.ip.parse::<std::net::Ipv4Addr>().is_err()
                || ip.gateway.parse::<std::net::Ipv4Addr>().is_err()
            {
                return Err(ConfigError::ValidationFailed("static_ip addresses must be IPv4"));
            }
            if ip.netmask_bits > 32 {
                return Err(ConfigError::ValidationFailed("static_ip.netmask_bits must be 0-32"));
            }
            if let Some(dns) = &ip.dns {
                if dns.parse::<std::net::Ipv4Addr>().is_err() {
                    return Err(ConfigError::ValidationFailed("static_ip.dns must be IPv4"));
                }
            }
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError::ValidationFailed("mqtt_port must be > 0"));
        }
        if !is_topic_segment(&self.discovery_prefix, true) {
            return Err(ConfigError::ValidationFailed(
                "discovery_prefix must be non-empty without MQTT wildcards",
            ));
        }
        if !self.device_name.is_empty() && !is_topic_segment(&self.device_name, false) {
            return Err(ConfigError::ValidationFailed(
                "device_name must not contain '/', '+' or '#'",
            ));
        }
        if !(self.temp_threshold >= 0.0 && self.temp_threshold.is_finite()) {
            return Err(ConfigError::ValidationFailed("temp_threshold must be >= 0"));
        }
        if !(self.hum_threshold >= 0.0 && self.hum_threshold.is_finite()) {
            return Err(ConfigError::ValidationFailed("hum_threshold must be >= 0"));
        }
        if self.time_threshold_secs == 0 {
            return Err(ConfigError::ValidationFailed("time_threshold_secs must be > 0"));
        }
        if self.retry_sleep_secs == 0 {
            return Err(ConfigError::ValidationFailed("retry_sleep_secs must be > 0"));
        }
        if self.sleep_time_secs < -(MAX_BUSY_WAIT_SECS as i32) {
            return Err(ConfigError::ValidationFailed(
                "negative sleep_time_secs must be >= -3600",
            ));
        }
        if i64::from(self.expire_after_secs)
            < i64::from(self.sleep_time_secs.max(0)) + EXPIRE_MARGIN_SECS
        {
            return Err(ConfigError::ValidationFailed(
                "expire_after_secs must exceed sleep_time_secs by at least 60",
            ));
        }
        if !(5..=300).contains(&self.watchdog_timeout_secs) {
            return Err(ConfigError::ValidationFailed("watchdog_timeout_secs must be 5-300"));
        }
        // One association attempt blocks between two feeds.
        if self.wifi_timeout_secs >= self.watchdog_timeout_secs {
            return Err(ConfigError::ValidationFailed(
                "wifi_timeout_secs must be below watchdog_timeout_secs",
            ));
        }
        // Pin, model and capabilities must agree with each other.
        SensorRegistry::from_config(self)?;
        Ok(())
    }

    /// Resolve the configured capability names into a set.
    pub fn capability_set(&self) -> Result<CapabilitySet, ConfigError> {
        let mut set = CapabilitySet::empty();
        for name in &self.capabilities {
            set.insert(CapabilityKind::parse(name)?);
        }
        if set.is_empty() {
            return Err(ConfigError::NoCapabilities);
        }
        Ok(set)
    }

    /// Per-kind tolerance bands for the change-detection policy.
    pub fn tolerances(&self) -> Tolerances {
        Tolerances::none()
            .with(CapabilityKind::Temperature, self.temp_threshold)
            .with(CapabilityKind::Humidity, self.hum_threshold)
    }

    /// Whether the node powers down between cycles.
    pub fn deep_sleep_enabled(&self) -> bool {
        self.sleep_time_secs > 0
    }
}

fn is_topic_segment(s: &str, allow_slash: bool) -> bool {
    !s.is_empty()
        && !s.ends_with('/')
        && !s.contains(['+', '#'])
        && (allow_slash || !s.contains('/'))
}
