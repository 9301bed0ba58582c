//! Power-cycle controller: snapshot persistence and sleep scheduling.
//!
//! The controller is the only component that touches the persisted
//! snapshot and the wake alarm, and it does so only before the sensor is
//! read (restore) or after the publish sequence has finished (persist,
//! schedule).

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, LivenessPort, SleepPort, StoragePort};
use crate::config::{MAX_BUSY_WAIT_SECS, NodeConfig};
use crate::error::StorageError;
use crate::policy::LastReportedSnapshot;

/// Storage key of the last reported snapshot.
pub const SNAPSHOT_KEY: &str = "last_report";

/// Decode a stored snapshot blob.
pub fn decode_snapshot(bytes: &[u8]) -> Result<LastReportedSnapshot, StorageError> {
    postcard::from_bytes(bytes).map_err(|_| StorageError::Corrupted)
}

pub fn encode_snapshot(snapshot: &LastReportedSnapshot) -> Result<Vec<u8>, StorageError> {
    postcard::to_allocvec(snapshot).map_err(|_| StorageError::IoError)
}

/// What the node does between two cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepPlan {
    /// Arm the RTC alarm and power down.
    DeepSleep { secs: u32 },
    /// Development mode: stay awake, feeding the watchdog.
    BusyWait { secs: u32 },
    /// Power down with no wake source; only a reset recovers.
    Halt,
}

#[derive(Debug, Clone, Copy)]
pub struct PowerCycleController {
    sleep_time_secs: i32,
    retry_sleep_secs: u32,
}

impl PowerCycleController {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            sleep_time_secs: config.sleep_time_secs,
            retry_sleep_secs: config.retry_sleep_secs,
        }
    }

    /// Load the last snapshot.  Missing or unreadable data is
    /// `NeverReported`; unreadable data is also reported as a fault.
    pub fn restore(
        &self,
        storage: &impl StoragePort,
        sink: &mut impl EventSink,
    ) -> LastReportedSnapshot {
        let loaded = storage
            .load(SNAPSHOT_KEY)
            .and_then(|blob| blob.map(|b| decode_snapshot(&b)).transpose());
        match loaded {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => LastReportedSnapshot::NeverReported,
            Err(e) => {
                sink.emit(&AppEvent::PersistenceFault(e));
                LastReportedSnapshot::NeverReported
            }
        }
    }

    /// Replace the stored snapshot.  Call only after a complete publish.
    pub fn persist(
        &self,
        storage: &mut impl StoragePort,
        snapshot: &LastReportedSnapshot,
    ) -> Result<(), StorageError> {
        let blob = encode_snapshot(snapshot)?;
        storage.save(SNAPSHOT_KEY, &blob)
    }

    /// Choose the next sleep.  `retry` shortens a deep sleep to the retry
    /// interval after a connectivity failure.
    pub fn schedule_next_wake(&self, retry: bool) -> SleepPlan {
        if self.sleep_time_secs > 0 {
            let secs = if retry {
                self.retry_sleep_secs
            } else {
                self.sleep_time_secs.unsigned_abs()
            };
            SleepPlan::DeepSleep { secs }
        } else {
            SleepPlan::BusyWait {
                secs: self.sleep_time_secs.unsigned_abs().min(MAX_BUSY_WAIT_SECS),
            }
        }
    }

    /// Plan after a boot-time hardware fault: a deep sleep of the retry
    /// interval, also in development mode, since no cycle can run.
    pub fn schedule_after_init_fault(&self) -> SleepPlan {
        SleepPlan::DeepSleep {
            secs: self.retry_sleep_secs,
        }
    }

    /// Carry out a plan.  Deep sleep does not return on hardware.
    pub fn enter(
        &self,
        plan: SleepPlan,
        sleep: &mut impl SleepPort,
        liveness: &mut impl LivenessPort,
    ) {
        match plan {
            SleepPlan::DeepSleep { secs } => {
                sleep.arm_alarm(secs);
                sleep.enter_low_power();
            }
            SleepPlan::BusyWait { secs } => {
                for _ in 0..secs {
                    liveness.feed();
                    sleep.busy_wait(1);
                }
                liveness.feed();
            }
            SleepPlan::Halt => sleep.enter_low_power(),
        }
    }
}
