//! Change-detection policy: does this wake cycle need the radio?
//!
//! [`should_report`] is a pure function of the last reported snapshot, the
//! fresh measurements, the clock and the configured limits.  It never
//! touches hardware, so every branch is covered by host tests.

use serde::{Deserialize, Serialize};

use crate::capability::{CapabilityKind, MeasurementSet, Reading};

// ---------------------------------------------------------------------------
// Tolerances
// ---------------------------------------------------------------------------

/// Per-kind tolerance bands.  A kind without a band uses 0 (any change
/// reports).  Binary kinds ignore their band.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tolerances([Option<f32>; CapabilityKind::COUNT]);

impl Tolerances {
    pub const fn none() -> Self {
        Self([None; CapabilityKind::COUNT])
    }

    #[must_use]
    pub fn with(mut self, kind: CapabilityKind, band: f32) -> Self {
        self.0[kind.index()] = Some(band);
        self
    }

    pub fn get(&self, kind: CapabilityKind) -> f32 {
        self.0[kind.index()].unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The last set of values the hub has seen, as persisted across sleep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LastReportedSnapshot {
    /// Nothing was ever confirmed as published (or the record was lost).
    NeverReported,
    Reported {
        measurements: MeasurementSet,
        /// Wall-clock seconds of the confirmed publish.
        reported_at: u64,
    },
}

impl LastReportedSnapshot {
    pub fn reported(measurements: MeasurementSet, reported_at: u64) -> Self {
        Self::Reported {
            measurements,
            reported_at,
        }
    }

    pub fn is_never_reported(&self) -> bool {
        matches!(self, Self::NeverReported)
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportReason {
    /// Non-sleep reset, or no snapshot to compare against.
    FirstBoot,
    /// The periodic report interval elapsed (or the clock went backwards).
    TimeBudgetExceeded,
    /// A value left its tolerance band, flipped, or is new.
    ThresholdExceeded(CapabilityKind),
}

/// Outcome of [`should_report`].  The reasons are diagnostic only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportDecision {
    reasons: heapless::Vec<ReportReason, { CapabilityKind::COUNT + 2 }>,
}

impl ReportDecision {
    pub fn report(&self) -> bool {
        !self.reasons.is_empty()
    }

    pub fn reasons(&self) -> &[ReportReason] {
        &self.reasons
    }

    fn push(&mut self, reason: ReportReason) {
        // Capacity covers every distinct reason once.
        let _ = self.reasons.push(reason);
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Slack added to every band so a decimal boundary such as `15.1` vs
/// `14.9 ± 0.2` is not pushed outside by f32 rounding.  Far below any
/// sensor resolution.
const BAND_EPSILON: f64 = 1e-4;

/// Inclusive band check: values within `reference ± band` are unchanged.
fn within_band(current: f32, reference: f32, band: f32) -> bool {
    (f64::from(current) - f64::from(reference)).abs() <= f64::from(band) + BAND_EPSILON
}

/// Decide whether the fresh measurements must be reported.
///
/// Reports when any of the following holds:
/// - `is_first_boot`, or `last` is [`LastReportedSnapshot::NeverReported`];
/// - `now - reported_at >= time_budget_secs`, or `now < reported_at`;
/// - a numeric value is outside `last ± tolerance` (the boundary itself
///   counts as unchanged), a contact flipped, or a kind has no previous value.
pub fn should_report(
    last: &LastReportedSnapshot,
    current: &MeasurementSet,
    now: u64,
    thresholds: &Tolerances,
    time_budget_secs: u64,
    is_first_boot: bool,
) -> ReportDecision {
    let mut decision = ReportDecision::default();

    let LastReportedSnapshot::Reported {
        measurements: previous,
        reported_at,
    } = last
    else {
        decision.push(ReportReason::FirstBoot);
        return decision;
    };

    if is_first_boot {
        decision.push(ReportReason::FirstBoot);
    }

    match now.checked_sub(*reported_at) {
        Some(elapsed) if elapsed < time_budget_secs => {}
        _ => decision.push(ReportReason::TimeBudgetExceeded),
    }

    for (kind, reading) in current.iter() {
        let changed = match (reading, previous.get(kind)) {
            (Reading::Numeric(now_v), Some(Reading::Numeric(prev_v))) => {
                !within_band(now_v, prev_v, thresholds.get(kind))
            }
            (Reading::Binary(now_v), Some(Reading::Binary(prev_v))) => now_v != prev_v,
            // New kind, or the kind changed representation.
            _ => true,
        };
        if changed {
            decision.push(ReportReason::ThresholdExceeded(kind));
        }
    }

    decision
}
