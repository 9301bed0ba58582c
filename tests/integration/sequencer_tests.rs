//! Publish sequencer against the mock network and broker.

use crate::mock_hw::{BrokerCall, LogSink, MockBroker, MockNetwork, MockWatchdog};

use sensornode::app::context::NodeContext;
use sensornode::app::events::AppEvent;
use sensornode::capability::{CapabilityKind, MeasurementSet, Reading};
use sensornode::config::NodeConfig;
use sensornode::error::{ConnectivityError, Error};
use sensornode::sequencer::{PublishOutcome, PublishSequencer};

fn context(cfg: NodeConfig) -> NodeContext {
    NodeContext::new(cfg, "0011aabbccdd").unwrap()
}

fn climate_config() -> NodeConfig {
    NodeConfig {
        device_name: "attic".into(),
        wifi_ssid: "HomeWiFi".into(),
        mqtt_host: "broker.lan".into(),
        ..NodeConfig::default()
    }
}

fn climate(t: f32, h: f32) -> MeasurementSet {
    MeasurementSet::from_readings(
        10,
        [
            (CapabilityKind::Temperature, Reading::Numeric(t)),
            (CapabilityKind::Humidity, Reading::Numeric(h)),
        ],
    )
}

struct Rig {
    network: MockNetwork,
    broker: MockBroker,
    watchdog: MockWatchdog,
    sink: LogSink,
}

impl Rig {
    fn new() -> Self {
        Self {
            network: MockNetwork::up(),
            broker: MockBroker::new(),
            watchdog: MockWatchdog::default(),
            sink: LogSink::new(),
        }
    }

    fn run(&mut self, ctx: &NodeContext, m: &MeasurementSet) -> PublishOutcome {
        PublishSequencer::new(ctx).run(
            &mut self.network,
            &mut self.broker,
            &mut self.watchdog,
            &mut self.sink,
            m,
            3_600,
        )
    }
}

#[test]
fn watchdog_is_fed_before_every_publish() {
    let ctx = context(climate_config());
    let mut rig = Rig::new();

    assert!(rig.run(&ctx, &climate(20.0, 40.0)).is_complete());

    // One per attempt, one before connect, one per message, one at teardown.
    assert!(rig.watchdog.feeds >= 1 + 1 + 8 + 1);
}

#[test]
fn credentials_are_sent_only_when_configured() {
    let ctx = context(NodeConfig {
        mqtt_user: "node".into(),
        mqtt_password: "hunter22".into(),
        ..climate_config()
    });
    let mut rig = Rig::new();
    rig.run(&ctx, &climate(20.0, 40.0));
    assert!(rig.broker.calls.contains(&BrokerCall::Connect {
        client_id: "0011aabbccdd".into(),
        user: Some("node".into()),
    }));
}

#[test]
fn transient_wifi_failure_is_retried() {
    let ctx = context(climate_config());
    let mut rig = Rig::new();
    rig.network.failures = vec![ConnectivityError::Timeout];

    assert!(rig.run(&ctx, &climate(20.0, 40.0)).is_complete());
    assert_eq!(rig.network.attempts, 2);
    assert!(rig.sink.has(|e| matches!(
        e,
        AppEvent::NetworkAttemptFailed {
            attempt: 1,
            error: ConnectivityError::Timeout
        }
    )));
}

#[test]
fn bad_password_is_not_retried() {
    let ctx = context(climate_config());
    let mut rig = Rig::new();
    rig.network = MockNetwork::always_failing(ConnectivityError::InvalidPassword);

    let outcome = rig.run(&ctx, &climate(20.0, 40.0));

    assert_eq!(
        outcome,
        PublishOutcome::Aborted(Error::Connectivity(ConnectivityError::InvalidPassword))
    );
    assert_eq!(rig.network.attempts, 1);
}

#[test]
fn empty_ssid_never_touches_the_radio() {
    let ctx = context(NodeConfig {
        wifi_ssid: String::new(),
        ..climate_config()
    });
    let mut rig = Rig::new();

    let outcome = rig.run(&ctx, &climate(20.0, 40.0));

    assert_eq!(
        outcome,
        PublishOutcome::Aborted(Error::Connectivity(ConnectivityError::NoCredentials))
    );
    assert_eq!(rig.network.attempts, 0);
}

#[test]
fn rejected_wills_do_not_block_the_session() {
    let ctx = context(climate_config());
    let mut rig = Rig::new();
    rig.broker.reject_wills = true;

    assert!(rig.run(&ctx, &climate(20.0, 40.0)).is_complete());
    let rejected = rig
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::WillRejected { .. }))
        .count();
    assert_eq!(rejected, 2);
    assert_eq!(rig.broker.publishes().len(), 8);
}

#[test]
fn contact_sensor_announces_on_off_payloads() {
    let ctx = context(NodeConfig {
        device_name: "front_door".into(),
        sensor_model: "switch".into(),
        capabilities: vec!["door".into()],
        ..climate_config()
    });
    let open = MeasurementSet::from_readings(
        10,
        [(CapabilityKind::BinaryContact, Reading::Binary(true))],
    );
    let mut rig = Rig::new();

    assert!(rig.run(&ctx, &open).is_complete());

    let base = "homeassistant/sensor/0011aabbccdd/front_door_contact";
    assert_eq!(rig.broker.payload_of(&format!("{base}/state")), Some("ON"));
    let config = rig.broker.payload_of(&format!("{base}/config")).unwrap();
    assert!(config.contains(r#""device_class":"door""#));
    assert!(config.contains(r#""payload_on":"ON","payload_off":"OFF""#));
    assert!(!config.contains("unit_of_measurement"));
}

#[test]
fn missing_reading_counts_all_four_messages() {
    let ctx = context(climate_config());
    let only_temperature = MeasurementSet::from_readings(
        10,
        [(CapabilityKind::Temperature, Reading::Numeric(20.0))],
    );
    let mut rig = Rig::new();

    let outcome = rig.run(&ctx, &only_temperature);

    assert_eq!(outcome, PublishOutcome::Incomplete { failed: 4 });
    assert_eq!(rig.broker.publishes().len(), 4);
}
