//! Clock adapter.
//!
//! - **`target_os = "espidf"`**: wall time from `gettimeofday`, which the
//!   RTC keeps counting through deep sleep; uptime from `esp_timer`, which
//!   restarts at every wake.
//! - **`not(target_os = "espidf")`**: `SystemTime` and `Instant`.
//!
//! Without NTP the wall clock starts near zero after a power-on reset.
//! That is fine here: it only has to be monotonic across sleeps, and a
//! power-on always forces a report anyway.

use crate::app::ports::ClockPort;

pub struct ClockAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for ClockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl ClockPort for ClockAdapter {
    #[cfg(target_os = "espidf")]
    fn now_secs(&self) -> u64 {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: `tv` is a valid out-pointer; the timezone argument may be null.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return self.uptime_secs();
        }
        u64::try_from(tv.tv_sec).unwrap_or(0)
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    #[cfg(target_os = "espidf")]
    fn uptime_secs(&self) -> u64 {
        // SAFETY: esp_timer is started by the IDF before `main`.
        let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
        u64::try_from(us).unwrap_or(0) / 1_000_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}
