//! Sleep and reset-cause adapter.
//!
//! Implements [`SleepPort`].
//!
//! - **`target_os = "espidf"`**: the RTC timer is the only wake source;
//!   `esp_deep_sleep_start` powers down everything but the RTC domain and
//!   the chip restarts from reset when the alarm fires.
//! - **`not(target_os = "espidf")`**: records what it was asked to do.  A
//!   simulated deep sleep returns, and the next reset cause reads as a
//!   timer wake, so host loops behave like a sleeping node.

use log::info;

use crate::app::ports::{ResetCause, SleepPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{hal::delay::FreeRtos, sys::*};

pub struct SleepAdapter {
    armed_secs: Option<u32>,
    #[cfg(not(target_os = "espidf"))]
    cause: ResetCause,
    #[cfg(not(target_os = "espidf"))]
    slept_secs: u64,
}

impl Default for SleepAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepAdapter {
    pub fn new() -> Self {
        Self {
            armed_secs: None,
            #[cfg(not(target_os = "espidf"))]
            cause: ResetCause::PowerOn,
            #[cfg(not(target_os = "espidf"))]
            slept_secs: 0,
        }
    }

    pub fn armed_secs(&self) -> Option<u32> {
        self.armed_secs
    }

    /// Total simulated sleep and wait time (host only).
    #[cfg(not(target_os = "espidf"))]
    pub fn slept_secs(&self) -> u64 {
        self.slept_secs
    }
}

#[cfg(target_os = "espidf")]
#[allow(non_upper_case_globals)]
fn map_reset_reason(reason: esp_reset_reason_t) -> ResetCause {
    match reason {
        esp_reset_reason_t_ESP_RST_POWERON => ResetCause::PowerOn,
        esp_reset_reason_t_ESP_RST_DEEPSLEEP => ResetCause::SleepWake,
        esp_reset_reason_t_ESP_RST_TASK_WDT
        | esp_reset_reason_t_ESP_RST_INT_WDT
        | esp_reset_reason_t_ESP_RST_WDT => ResetCause::Watchdog,
        _ => ResetCause::Other,
    }
}

impl SleepPort for SleepAdapter {
    #[cfg(target_os = "espidf")]
    fn reset_cause(&self) -> ResetCause {
        // SAFETY: read-only query of a value latched at boot.
        map_reset_reason(unsafe { esp_reset_reason() })
    }

    #[cfg(not(target_os = "espidf"))]
    fn reset_cause(&self) -> ResetCause {
        self.cause
    }

    fn arm_alarm(&mut self, secs: u32) {
        #[cfg(target_os = "espidf")]
        unsafe {
            esp_sleep_enable_timer_wakeup(u64::from(secs) * 1_000_000);
        }
        self.armed_secs = Some(secs);
        info!("Sleep: RTC alarm armed for {secs}s");
    }

    #[cfg(target_os = "espidf")]
    fn enter_low_power(&mut self) {
        info!("Sleep: entering deep sleep");
        // SAFETY: does not return; the chip restarts from reset on wake.
        unsafe { esp_deep_sleep_start() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn enter_low_power(&mut self) {
        match self.armed_secs.take() {
            Some(secs) => {
                info!("Sleep(sim): deep sleep {secs}s");
                self.slept_secs += u64::from(secs);
                self.cause = ResetCause::SleepWake;
            }
            None => info!("Sleep(sim): halted without alarm"),
        }
    }

    #[cfg(target_os = "espidf")]
    fn busy_wait(&mut self, secs: u32) {
        FreeRtos::delay_ms(secs.saturating_mul(1000));
    }

    #[cfg(not(target_os = "espidf"))]
    fn busy_wait(&mut self, secs: u32) {
        self.slept_secs += u64::from(secs);
    }
}
