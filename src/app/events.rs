//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) and the components it
//! drives emit these through the [`EventSink`](super::ports::EventSink)
//! port.  Adapters on the other side decide what to do with them: the
//! serial log in production, a recording vector in tests.

use crate::app::ports::{NetworkInfo, ResetCause};
use crate::capability::{CapabilityKind, MeasurementSet};
use crate::error::{ConnectivityError, Error, SensorFault, StorageError, TransportFault};
use crate::policy::ReportDecision;
use crate::power::SleepPlan;

/// Structured events emitted during one wake cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A cycle started.
    Booted { reset: ResetCause, first_boot: bool },

    /// The sensor produced a measurement set.
    Measured(MeasurementSet),

    /// The sensor read failed; the cycle skips reporting.
    SensorFailed(SensorFault),

    /// The change-detection policy ran.
    Decided(ReportDecision),

    /// One network association attempt failed.
    NetworkAttemptFailed { attempt: u8, error: ConnectivityError },

    /// The network is up.
    NetworkUp(NetworkInfo),

    /// The client refused a last will; the session still opens.
    WillRejected { kind: CapabilityKind },

    /// A single publish was rejected; the remaining ones are still sent.
    PublishFailed { topic: String, fault: TransportFault },

    /// All messages of one capability were handed to the client.
    CapabilityPublished(CapabilityKind),

    /// The publish sequence stopped before any message was sent.
    PublishAborted(Error),

    /// The persisted snapshot could not be read or written.
    PersistenceFault(StorageError),

    /// The snapshot now reflects what the hub has seen.
    SnapshotSaved { reported_at: u64 },

    /// The cycle is over; the node is about to sleep.
    Sleeping(SleepPlan),
}
