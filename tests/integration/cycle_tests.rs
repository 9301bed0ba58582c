//! Full wake cycles through `NodeService` against the recording fakes.

use crate::mock_hw::{
    BrokerCall, LogSink, MockBroker, MockClock, MockNetwork, MockSleep, MockWatchdog, ScriptedBus,
    SleepCall, ports,
};

use sensornode::adapters::nvs::NvsAdapter;
use sensornode::app::context::NodeContext;
use sensornode::app::events::AppEvent;
use sensornode::app::ports::{QoS, ResetCause};
use sensornode::app::service::{CycleOutcome, NodePorts, NodeService};
use sensornode::capability::{CapabilityKind, MeasurementSet, Reading};
use sensornode::config::NodeConfig;
use sensornode::error::{BusError, ConnectivityError, Error, SensorFault, StorageError};
use sensornode::policy::{LastReportedSnapshot, ReportReason};
use sensornode::power::{SNAPSHOT_KEY, SleepPlan, decode_snapshot, encode_snapshot};

const ID: &str = "a1b2c3d4e5f6";

fn config() -> NodeConfig {
    NodeConfig {
        device_name: "porch".into(),
        wifi_ssid: "HomeWiFi".into(),
        wifi_password: "mysecret8".into(),
        mqtt_host: "broker.lan".into(),
        time_threshold_secs: 300,
        ..NodeConfig::default()
    }
}

fn service(cfg: NodeConfig) -> NodeService {
    NodeService::new(NodeContext::new(cfg, ID).unwrap())
}

fn last_reported(t: f32, h: f32, at: u64) -> Vec<u8> {
    let set = MeasurementSet::from_readings(
        at,
        [
            (CapabilityKind::Temperature, Reading::Numeric(t)),
            (CapabilityKind::Humidity, Reading::Numeric(h)),
        ],
    );
    encode_snapshot(&LastReportedSnapshot::reported(set, at)).unwrap()
}

// ── Publish order ─────────────────────────────────────────────

#[test]
fn first_boot_publishes_eight_messages_in_order() {
    let mut svc = service(config());
    let mut p = ports(ScriptedBus::climate(21.5, 48.0), ResetCause::PowerOn, 1_000);
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    assert!(report.first_boot);
    assert_eq!(report.outcome, CycleOutcome::Reported);
    let t = "homeassistant/sensor/a1b2c3d4e5f6/porch_temperature";
    let h = "homeassistant/sensor/a1b2c3d4e5f6/porch_humidity";
    let expected_topics = [
        format!("{t}/availability"),
        format!("{t}/config"),
        format!("{t}/state"),
        "homeassistant/a1b2c3d4e5f6/porch_temperature/attributes".to_owned(),
        format!("{h}/availability"),
        format!("{h}/config"),
        format!("{h}/state"),
        "homeassistant/a1b2c3d4e5f6/porch_humidity/attributes".to_owned(),
    ];
    let publishes = p.pubsub.publishes();
    let topics: Vec<&str> = publishes.iter().map(|(t, _)| *t).collect();
    assert_eq!(topics, expected_topics);

    assert_eq!(publishes[0].1, "online");
    assert_eq!(publishes[2].1, "21.5");
    assert_eq!(publishes[6].1, "48");
    assert_eq!(
        publishes[3].1,
        r#"{"uptime":"1 days, 02:03:04","ip_address":"192.168.1.42"}"#
    );
    assert!(p.pubsub.calls.iter().all(|c| match c {
        BrokerCall::Publish { retain, qos, .. } => *retain && *qos == QoS::AtMostOnce,
        _ => true,
    }));
}

#[test]
fn session_opens_with_wills_and_closes_cleanly() {
    let mut svc = service(config());
    let mut p = ports(ScriptedBus::climate(21.5, 48.0), ResetCause::PowerOn, 1_000);
    let mut sink = LogSink::new();

    svc.run_cycle(&mut p, &mut sink);

    let calls = &p.pubsub.calls;
    assert_eq!(
        p.pubsub.wills(),
        [
            "homeassistant/sensor/a1b2c3d4e5f6/porch_temperature/availability",
            "homeassistant/sensor/a1b2c3d4e5f6/porch_humidity/availability",
        ]
    );
    assert!(matches!(&calls[0], BrokerCall::Will { payload, .. } if payload == "offline"));
    assert_eq!(
        calls[2],
        BrokerCall::Connect {
            client_id: ID.into(),
            user: None
        }
    );
    assert_eq!(calls.last(), Some(&BrokerCall::Disconnect));
    assert_eq!(p.network.disconnects, 1);
    assert!(!p.network.up);
}

// ── Change detection through a whole cycle ────────────────────

#[test]
fn small_change_within_tolerance_stays_quiet() {
    let mut svc = service(config());
    let mut p = ports(ScriptedBus::climate(20.4, 40.0), ResetCause::SleepWake, 100);
    p.storage.data.insert(SNAPSHOT_KEY.into(), last_reported(20.0, 40.0, 0));
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    assert!(!report.first_boot);
    assert_eq!(report.outcome, CycleOutcome::Unchanged);
    assert!(p.pubsub.calls.is_empty());
    assert_eq!(p.network.attempts, 0);
    assert_eq!(p.storage.writes, 0);
    assert_eq!(p.sleep.calls, [SleepCall::Arm(600), SleepCall::LowPower]);
}

#[test]
fn tighter_tolerance_reports_the_same_change() {
    let cfg = NodeConfig {
        temp_threshold: 0.3,
        ..config()
    };
    let mut svc = service(cfg);
    let mut p = ports(ScriptedBus::climate(20.4, 40.0), ResetCause::SleepWake, 100);
    p.storage.data.insert(SNAPSHOT_KEY.into(), last_reported(20.0, 40.0, 0));
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    let decision = report.decision.unwrap();
    assert_eq!(
        decision.reasons(),
        [ReportReason::ThresholdExceeded(CapabilityKind::Temperature)]
    );
    assert_eq!(report.outcome, CycleOutcome::Reported);
    assert_eq!(p.pubsub.publishes().len(), 8);
}

#[test]
fn stale_report_is_refreshed_regardless_of_values() {
    let mut svc = service(config());
    let mut p = ports(ScriptedBus::climate(20.0, 40.0), ResetCause::SleepWake, 301);
    p.storage.data.insert(SNAPSHOT_KEY.into(), last_reported(20.0, 40.0, 0));
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    assert_eq!(
        report.decision.unwrap().reasons(),
        [ReportReason::TimeBudgetExceeded]
    );
    assert_eq!(report.outcome, CycleOutcome::Reported);
}

#[test]
fn missing_snapshot_reports_even_after_timer_wake() {
    let mut svc = service(config());
    let mut p = ports(ScriptedBus::climate(20.0, 40.0), ResetCause::SleepWake, 100);
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    assert!(!report.first_boot);
    assert!(report.decision.unwrap().report());
    assert!(report.snapshot_saved);
}

#[test]
fn corrupt_snapshot_is_treated_as_never_reported() {
    let mut svc = service(config());
    let mut p = ports(ScriptedBus::climate(20.0, 40.0), ResetCause::SleepWake, 100);
    p.storage.data.insert(SNAPSHOT_KEY.into(), vec![0xFF; 3]);
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    assert!(sink.has(|e| matches!(e, AppEvent::PersistenceFault(_))));
    assert_eq!(report.outcome, CycleOutcome::Reported);
}

// ── Snapshot handling ─────────────────────────────────────────

#[test]
fn snapshot_records_what_was_published() {
    let mut svc = service(config());
    let mut p = ports(ScriptedBus::climate(22.25, 51.0), ResetCause::PowerOn, 5_000);
    let mut sink = LogSink::new();

    svc.run_cycle(&mut p, &mut sink);

    let stored = decode_snapshot(&p.storage.data[SNAPSHOT_KEY]).unwrap();
    let LastReportedSnapshot::Reported {
        measurements,
        reported_at,
    } = stored
    else {
        panic!("snapshot not written");
    };
    assert_eq!(reported_at, 5_000);
    assert_eq!(
        measurements.get(CapabilityKind::Temperature),
        Some(Reading::Numeric(22.25))
    );
    assert!(sink.has(|e| matches!(e, AppEvent::SnapshotSaved { reported_at: 5_000 })));
}

#[test]
fn network_failure_keeps_snapshot_and_sleeps_short() {
    let mut svc = service(config());
    let mut p = ports(ScriptedBus::climate(25.0, 40.0), ResetCause::SleepWake, 1_000);
    let old = last_reported(20.0, 40.0, 900);
    p.storage.data.insert(SNAPSHOT_KEY.into(), old.clone());
    p.network = MockNetwork::always_failing(ConnectivityError::ApNotInRange);
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    assert_eq!(
        report.outcome,
        CycleOutcome::PublishAborted(Error::Connectivity(ConnectivityError::ApNotInRange))
    );
    assert_eq!(p.network.attempts, 3);
    assert!(p.pubsub.calls.is_empty());
    assert_eq!(p.storage.data[SNAPSHOT_KEY], old);
    assert_eq!(report.plan, SleepPlan::DeepSleep { secs: 30 });
    assert_eq!(p.sleep.armed(), Some(30));
}

#[test]
fn broker_refusal_aborts_and_retries_soon() {
    let mut svc = service(config());
    let mut p = ports(ScriptedBus::climate(25.0, 40.0), ResetCause::PowerOn, 1_000);
    p.pubsub.refuse_connect = true;
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    assert!(matches!(report.outcome, CycleOutcome::PublishAborted(Error::Transport(_))));
    assert!(p.pubsub.publishes().is_empty());
    assert_eq!(p.network.disconnects, 1);
    assert!(!report.snapshot_saved);
    assert_eq!(report.plan, SleepPlan::DeepSleep { secs: 30 });
}

#[test]
fn partial_publish_failure_keeps_snapshot() {
    let mut svc = service(config());
    let mut p = ports(ScriptedBus::climate(25.0, 40.0), ResetCause::PowerOn, 1_000);
    p.pubsub
        .reject_topics
        .push("homeassistant/sensor/a1b2c3d4e5f6/porch_temperature/state".into());
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    assert_eq!(report.outcome, CycleOutcome::PublishIncomplete { failed: 1 });
    // The remaining seven still go out.
    assert_eq!(p.pubsub.publishes().len(), 7);
    assert!(p.storage.data.get(SNAPSHOT_KEY).is_none());
    assert_eq!(report.plan, SleepPlan::DeepSleep { secs: 600 });
    assert!(sink.has(|e| matches!(e, AppEvent::CapabilityPublished(CapabilityKind::Humidity))));
    assert!(!sink.has(|e| matches!(
        e,
        AppEvent::CapabilityPublished(CapabilityKind::Temperature)
    )));
}

#[test]
fn failed_snapshot_write_still_sleeps_normally() {
    let mut svc = service(config());
    let mut p = ports(ScriptedBus::climate(25.0, 40.0), ResetCause::PowerOn, 1_000);
    p.storage.fail_writes = true;
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    assert_eq!(report.outcome, CycleOutcome::Reported);
    assert_eq!(p.pubsub.publishes().len(), 8);
    assert!(!report.snapshot_saved);
    assert!(p.storage.data.is_empty());
    assert!(sink.has(|e| matches!(e, AppEvent::PersistenceFault(StorageError::IoError))));
    assert_eq!(report.plan, SleepPlan::DeepSleep { secs: 600 });
    assert_eq!(p.sleep.calls, [SleepCall::Arm(600), SleepCall::LowPower]);
}

#[test]
fn unavailable_flash_reports_every_cycle_and_keeps_sleeping() {
    let mut svc = service(config());
    let mut p = NodePorts {
        bus: ScriptedBus::climate(21.0, 45.0),
        network: MockNetwork::up(),
        pubsub: MockBroker::new(),
        storage: NvsAdapter::unavailable(),
        sleep: MockSleep::woken_by(ResetCause::PowerOn),
        liveness: MockWatchdog::default(),
        clock: MockClock::at(1_000),
    };
    let mut sink = LogSink::new();

    let first = svc.run_cycle(&mut p, &mut sink);
    p.clock.advance(600);
    let second = svc.run_cycle(&mut p, &mut sink);

    for report in [&first, &second] {
        assert_eq!(report.outcome, CycleOutcome::Reported);
        assert!(!report.snapshot_saved);
        assert_eq!(report.plan, SleepPlan::DeepSleep { secs: 600 });
    }
    // Unchanged values on a timer wake still report: nothing was persisted.
    assert!(!second.first_boot);
    assert_eq!(second.decision.unwrap().reasons(), [ReportReason::FirstBoot]);
    assert_eq!(p.pubsub.publishes().len(), 16);
}

// ── Faults and sleep modes ────────────────────────────────────

#[test]
fn sensor_failure_skips_reporting() {
    let mut svc = service(config());
    let mut p = ports(
        ScriptedBus::new(vec![Err(BusError::Checksum)]),
        ResetCause::PowerOn,
        1_000,
    );
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    assert_eq!(
        report.outcome,
        CycleOutcome::SensorFailed(SensorFault::Bus(BusError::Checksum))
    );
    assert!(report.decision.is_none());
    assert_eq!(p.network.attempts, 0);
    assert_eq!(report.plan, SleepPlan::DeepSleep { secs: 600 });
}

#[test]
fn dev_mode_busy_waits_and_feeds_watchdog() {
    let cfg = NodeConfig {
        sleep_time_secs: -3,
        ..config()
    };
    let mut svc = service(cfg);
    let mut p = ports(ScriptedBus::climate(21.0, 45.0), ResetCause::PowerOn, 1_000);
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    assert_eq!(report.plan, SleepPlan::BusyWait { secs: 3 });
    assert_eq!(p.sleep.calls, vec![SleepCall::Wait(1); 3]);
    assert!(p.liveness.feeds >= 4);
}

#[test]
fn only_the_first_dev_cycle_is_a_first_boot() {
    let cfg = NodeConfig {
        sleep_time_secs: -1,
        ..config()
    };
    let mut svc = service(cfg);
    let mut p = ports(ScriptedBus::climate(21.0, 45.0), ResetCause::PowerOn, 1_000);
    let mut sink = LogSink::new();

    assert!(svc.run_cycle(&mut p, &mut sink).first_boot);
    p.clock.advance(10);
    let second = svc.run_cycle(&mut p, &mut sink);

    assert!(!second.first_boot);
    assert_eq!(second.outcome, CycleOutcome::Unchanged);
    assert_eq!(svc.cycles(), 2);
}

#[test]
fn watchdog_reset_counts_as_first_boot() {
    let mut svc = service(config());
    let mut p = ports(ScriptedBus::climate(20.0, 40.0), ResetCause::Watchdog, 100);
    p.storage.data.insert(SNAPSHOT_KEY.into(), last_reported(20.0, 40.0, 50));
    let mut sink = LogSink::new();

    let report = svc.run_cycle(&mut p, &mut sink);

    assert!(report.first_boot);
    assert_eq!(
        report.decision.unwrap().reasons(),
        [ReportReason::FirstBoot]
    );
}
