//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements   | Connects to                   |
//! |-------------|--------------|-------------------------------|
//! | `device_id` | (boot)       | eFuse factory MAC             |
//! | `log_sink`  | EventSink    | Serial log output             |
//! | `mqtt`      | PubSubPort   | ESP-MQTT client               |
//! | `nvs`       | StoragePort  | NVS / in-memory store         |
//! | `sleep`     | SleepPort    | RTC timer, deep sleep         |
//! | `time`      | ClockPort    | RTC wall clock, esp_timer     |
//! | `wifi`      | NetworkPort  | ESP-IDF WiFi STA              |
//!
//! The sensor bus adapters live in [`crate::sensors`] and the watchdog in
//! [`crate::drivers::watchdog`].

pub mod device_id;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod sleep;
pub mod time;
pub mod wifi;
