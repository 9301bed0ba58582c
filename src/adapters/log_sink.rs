//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART in production, stderr on the host).  Each line
//! starts with a short tag so a serial capture can be grepped per phase.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::power::SleepPlan;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Booted { reset, first_boot } => {
                info!("BOOT | reset={reset:?} first_boot={first_boot}");
            }
            AppEvent::Measured(set) => {
                for (kind, reading) in set.iter() {
                    info!(
                        "MEASURE | {}={} {}",
                        kind.slug(),
                        reading.state_payload(),
                        kind.unit().unwrap_or("")
                    );
                }
            }
            AppEvent::SensorFailed(fault) => {
                warn!("FAULT | sensor: {fault}");
            }
            AppEvent::Decided(decision) => {
                info!(
                    "DECIDE | report={} reasons={:?}",
                    decision.report(),
                    decision.reasons()
                );
            }
            AppEvent::NetworkAttemptFailed { attempt, error } => {
                warn!("PUBLISH | wifi attempt {attempt} failed: {error}");
            }
            AppEvent::NetworkUp(info) => {
                info!("PUBLISH | network up, ip={}", info.ip);
            }
            AppEvent::WillRejected { kind } => {
                warn!("PUBLISH | last will for {} not registered", kind.slug());
            }
            AppEvent::PublishFailed { topic, fault } => {
                warn!("PUBLISH | {topic}: {fault}");
            }
            AppEvent::CapabilityPublished(kind) => {
                info!("PUBLISH | {} done", kind.slug());
            }
            AppEvent::PublishAborted(error) => {
                warn!("FAULT | publish aborted: {error}");
            }
            AppEvent::PersistenceFault(error) => {
                warn!("FAULT | snapshot storage: {error}");
            }
            AppEvent::SnapshotSaved { reported_at } => {
                info!("PUBLISH | snapshot saved at t={reported_at}");
            }
            AppEvent::Sleeping(plan) => match plan {
                SleepPlan::DeepSleep { secs } => info!("SLEEP | deep sleep {secs}s"),
                SleepPlan::BusyWait { secs } => info!("SLEEP | dev mode, waiting {secs}s"),
                SleepPlan::Halt => warn!("SLEEP | halted until reset"),
            },
        }
    }
}
