//! Node service: the hexagonal core of one wake cycle.
//!
//! [`NodeService`] owns the boot-time context and the power-cycle
//! controller.  All I/O flows through the port traits bundled in
//! [`NodePorts`], so a full cycle runs on the host against fakes.
//!
//! ```text
//!  SensorBus ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                │          NodeService          │
//!  Storage  ◀──▶ │ measure · decide · publish ·  │ ──▶ NetworkPort / PubSubPort
//!                │            sleep              │ ──▶ SleepPort / LivenessPort
//!                └──────────────────────────────┘
//! ```

use log::info;

use crate::capability::MeasurementSet;
use crate::error::{Error, SensorFault, TransportFault};
use crate::policy::{LastReportedSnapshot, ReportDecision, should_report};
use crate::power::{PowerCycleController, SleepPlan};
use crate::sequencer::{PublishOutcome, PublishSequencer};

use super::context::NodeContext;
use super::events::AppEvent;
use super::ports::{
    ClockPort, EventSink, LivenessPort, NetworkPort, PubSubPort, SensorBus, SleepPort, StoragePort,
};

// ───────────────────────────────────────────────────────────────
// Port bundle
// ───────────────────────────────────────────────────────────────

/// Every adapter a cycle needs, owned in one place so `main` builds it
/// once and tests can inspect the fakes afterwards.
pub struct NodePorts<B, N, M, S, Z, L, C> {
    pub bus: B,
    pub network: N,
    pub pubsub: M,
    pub storage: S,
    pub sleep: Z,
    pub liveness: L,
    pub clock: C,
}

// ───────────────────────────────────────────────────────────────
// Cycle report
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Everything was published and the snapshot updated.
    Reported,
    /// Nothing changed enough to wake the radio.
    Unchanged,
    SensorFailed(SensorFault),
    /// The network or the session never came up.
    PublishAborted(Error),
    /// Some publishes failed; the snapshot was kept.
    PublishIncomplete { failed: usize },
}

/// What happened during one cycle, for tests and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub first_boot: bool,
    pub measurements: Option<MeasurementSet>,
    pub decision: Option<ReportDecision>,
    pub outcome: CycleOutcome,
    pub snapshot_saved: bool,
    pub plan: SleepPlan,
}

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService {
    ctx: NodeContext,
    power: PowerCycleController,
    cycles: u64,
}

impl NodeService {
    pub fn new(ctx: NodeContext) -> Self {
        let power = PowerCycleController::new(&ctx.config);
        Self {
            ctx,
            power,
            cycles: 0,
        }
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one wake cycle: restore → measure → decide → publish →
    /// persist → sleep.  Returns only when the sleep returns (host fakes,
    /// dev-mode busy wait).
    pub fn run_cycle<B, N, M, S, Z, L, C>(
        &mut self,
        ports: &mut NodePorts<B, N, M, S, Z, L, C>,
        sink: &mut impl EventSink,
    ) -> CycleReport
    where
        B: SensorBus,
        N: NetworkPort,
        M: PubSubPort,
        S: StoragePort,
        Z: SleepPort,
        L: LivenessPort,
        C: ClockPort,
    {
        let reset = ports.sleep.reset_cause();
        // Busy-wait cycles share one boot; only the first sees the reset.
        let first_boot = self.cycles == 0 && reset.is_first_boot();
        self.cycles += 1;
        sink.emit(&AppEvent::Booted { reset, first_boot });
        ports.liveness.feed();

        let mut report = CycleReport {
            first_boot,
            measurements: None,
            decision: None,
            outcome: CycleOutcome::Unchanged,
            snapshot_saved: false,
            plan: SleepPlan::Halt,
        };

        let last = self.power.restore(&ports.storage, sink);
        let now = ports.clock.now_secs();
        let mut retry = false;

        match self.ctx.registry.measure(&mut ports.bus, now) {
            Err(fault) => {
                sink.emit(&AppEvent::SensorFailed(fault));
                report.outcome = CycleOutcome::SensorFailed(fault);
            }
            Ok(measurements) => {
                sink.emit(&AppEvent::Measured(measurements));
                report.measurements = Some(measurements);

                let decision = should_report(
                    &last,
                    &measurements,
                    now,
                    &self.ctx.tolerances,
                    self.ctx.time_budget_secs(),
                    first_boot,
                );
                sink.emit(&AppEvent::Decided(decision.clone()));
                let wanted = decision.report();
                report.decision = Some(decision);

                if wanted {
                    ports.liveness.feed();
                    let outcome = PublishSequencer::new(&self.ctx).run(
                        &mut ports.network,
                        &mut ports.pubsub,
                        &mut ports.liveness,
                        sink,
                        &measurements,
                        ports.clock.uptime_secs(),
                    );
                    report.outcome = match outcome {
                        PublishOutcome::Complete => {
                            report.snapshot_saved =
                                self.save_snapshot(&mut ports.storage, sink, measurements, now);
                            CycleOutcome::Reported
                        }
                        PublishOutcome::Incomplete { failed } => {
                            CycleOutcome::PublishIncomplete { failed }
                        }
                        PublishOutcome::Aborted(error) => {
                            retry = matches!(
                                error,
                                Error::Connectivity(_)
                                    | Error::Transport(TransportFault::ConnectFailed)
                            );
                            CycleOutcome::PublishAborted(error)
                        }
                    };
                }
            }
        }

        let plan = self.power.schedule_next_wake(retry);
        report.plan = plan;
        sink.emit(&AppEvent::Sleeping(plan));
        info!("cycle {} done: {:?}", self.cycles, report.outcome);
        self.power.enter(plan, &mut ports.sleep, &mut ports.liveness);
        report
    }

    fn save_snapshot<S: StoragePort>(
        &self,
        storage: &mut S,
        sink: &mut impl EventSink,
        measurements: MeasurementSet,
        now: u64,
    ) -> bool {
        let snapshot = LastReportedSnapshot::reported(measurements, now);
        match self.power.persist(storage, &snapshot) {
            Ok(()) => {
                sink.emit(&AppEvent::SnapshotSaved { reported_at: now });
                true
            }
            Err(e) => {
                sink.emit(&AppEvent::PersistenceFault(e));
                false
            }
        }
    }
}
