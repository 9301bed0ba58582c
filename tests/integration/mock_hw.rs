//! Mock adapters for integration tests.
//!
//! Every fake records what it was asked to do so tests can assert on the
//! full call history of a wake cycle without radio, flash or GPIO.

use std::cell::Cell;
use std::collections::HashMap;
use std::net::Ipv4Addr;

use sensornode::app::events::AppEvent;
use sensornode::app::ports::{
    BrokerAddress, ClockPort, Credentials, EventSink, LivenessPort, NetworkInfo, NetworkPort,
    PubSubPort, QoS, RawReading, ResetCause, SensorBus, SleepPort, StoragePort,
};
use sensornode::app::service::NodePorts;
use sensornode::config::StaticIpConfig;
use sensornode::error::{BusError, ConnectivityError, StorageError, TransportFault};

// ── Sensor bus ────────────────────────────────────────────────

/// Returns queued readings in order, then repeats the last one.
pub struct ScriptedBus {
    script: Vec<Result<RawReading, BusError>>,
    next: usize,
}

#[allow(dead_code)]
impl ScriptedBus {
    pub fn new(script: Vec<Result<RawReading, BusError>>) -> Self {
        Self { script, next: 0 }
    }

    pub fn climate(temperature: f32, humidity: f32) -> Self {
        Self::new(vec![Ok(climate(temperature, humidity))])
    }

    pub fn push(&mut self, reading: Result<RawReading, BusError>) {
        self.script.push(reading);
    }
}

pub fn climate(temperature: f32, humidity: f32) -> RawReading {
    RawReading {
        temperature: Some(temperature),
        humidity: Some(humidity),
        contact: None,
    }
}

impl SensorBus for ScriptedBus {
    fn measure(&mut self) -> Result<RawReading, BusError> {
        let idx = self.next.min(self.script.len().saturating_sub(1));
        self.next += 1;
        self.script.get(idx).copied().unwrap_or(Err(BusError::NoDevice))
    }
}

// ── Network ───────────────────────────────────────────────────

pub struct MockNetwork {
    /// Results for successive `connect` calls; empty means success.
    pub failures: Vec<ConnectivityError>,
    pub attempts: u32,
    pub disconnects: u32,
    pub up: bool,
}

#[allow(dead_code)]
impl MockNetwork {
    pub fn up() -> Self {
        Self {
            failures: Vec::new(),
            attempts: 0,
            disconnects: 0,
            up: false,
        }
    }

    pub fn always_failing(error: ConnectivityError) -> Self {
        Self {
            failures: vec![error; 16],
            ..Self::up()
        }
    }
}

impl NetworkPort for MockNetwork {
    fn connect(
        &mut self,
        _ssid: &str,
        _password: &str,
        _static_ip: Option<&StaticIpConfig>,
        _timeout_secs: u32,
    ) -> Result<NetworkInfo, ConnectivityError> {
        self.attempts += 1;
        if !self.failures.is_empty() {
            return Err(self.failures.remove(0));
        }
        self.up = true;
        Ok(NetworkInfo {
            ip: Ipv4Addr::new(192, 168, 1, 42),
        })
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.up = false;
    }
}

// ── MQTT ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCall {
    Will { topic: String, payload: String },
    Connect { client_id: String, user: Option<String> },
    Publish { topic: String, payload: String, retain: bool, qos: QoS },
    Disconnect,
}

#[derive(Default)]
pub struct MockBroker {
    pub calls: Vec<BrokerCall>,
    pub refuse_connect: bool,
    /// Topics whose publish is rejected.
    pub reject_topics: Vec<String>,
    pub reject_wills: bool,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publishes(&self) -> Vec<(&str, &str)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BrokerCall::Publish { topic, payload, .. } => {
                    Some((topic.as_str(), payload.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn wills(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BrokerCall::Will { topic, .. } => Some(topic.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn payload_of(&self, topic: &str) -> Option<&str> {
        self.publishes()
            .into_iter()
            .find(|(t, _)| *t == topic)
            .map(|(_, p)| p)
    }
}

impl PubSubPort for MockBroker {
    fn set_last_will(
        &mut self,
        topic: &str,
        payload: &[u8],
        _retain: bool,
    ) -> Result<(), TransportFault> {
        if self.reject_wills {
            return Err(TransportFault::WillRejected);
        }
        self.calls.push(BrokerCall::Will {
            topic: topic.to_owned(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        });
        Ok(())
    }

    fn connect(
        &mut self,
        client_id: &str,
        _broker: BrokerAddress<'_>,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), TransportFault> {
        if self.refuse_connect {
            return Err(TransportFault::ConnectFailed);
        }
        self.calls.push(BrokerCall::Connect {
            client_id: client_id.to_owned(),
            user: credentials.map(|c| c.user.to_owned()),
        });
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), TransportFault> {
        if self.reject_topics.iter().any(|t| t == topic) {
            return Err(TransportFault::PublishFailed);
        }
        self.calls.push(BrokerCall::Publish {
            topic: topic.to_owned(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retain,
            qos,
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        self.calls.push(BrokerCall::Disconnect);
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    pub data: HashMap<String, Vec<u8>>,
    pub fail_writes: bool,
    pub writes: u32,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoragePort for MockNvs {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.get(key).cloned())
    }

    fn save(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.writes += 1;
        self.data.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

// ── Sleep, watchdog, clock ────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SleepCall {
    Arm(u32),
    LowPower,
    Wait(u32),
}

pub struct MockSleep {
    pub cause: ResetCause,
    pub calls: Vec<SleepCall>,
}

#[allow(dead_code)]
impl MockSleep {
    pub fn woken_by(cause: ResetCause) -> Self {
        Self {
            cause,
            calls: Vec::new(),
        }
    }

    pub fn armed(&self) -> Option<u32> {
        self.calls.iter().rev().find_map(|c| match c {
            SleepCall::Arm(secs) => Some(*secs),
            _ => None,
        })
    }
}

impl SleepPort for MockSleep {
    fn reset_cause(&self) -> ResetCause {
        self.cause
    }

    fn arm_alarm(&mut self, secs: u32) {
        self.calls.push(SleepCall::Arm(secs));
    }

    fn enter_low_power(&mut self) {
        self.calls.push(SleepCall::LowPower);
        // The next cycle starts from a timer wake.
        self.cause = ResetCause::SleepWake;
    }

    fn busy_wait(&mut self, secs: u32) {
        self.calls.push(SleepCall::Wait(secs));
    }
}

#[derive(Default)]
pub struct MockWatchdog {
    pub feeds: u32,
}

impl LivenessPort for MockWatchdog {
    fn feed(&mut self) {
        self.feeds += 1;
    }
}

/// Manually advanced clock.
pub struct MockClock {
    pub now: Cell<u64>,
    pub uptime: u64,
}

#[allow(dead_code)]
impl MockClock {
    pub fn at(now: u64) -> Self {
        Self {
            now: Cell::new(now),
            uptime: 93_784,
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.set(self.now.get() + secs);
    }
}

impl ClockPort for MockClock {
    fn now_secs(&self) -> u64 {
        self.now.get()
    }

    fn uptime_secs(&self) -> u64 {
        self.uptime
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, pred: impl Fn(&AppEvent) -> bool) -> bool {
        self.events.iter().any(pred)
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Port bundle ───────────────────────────────────────────────

pub type MockPorts =
    NodePorts<ScriptedBus, MockNetwork, MockBroker, MockNvs, MockSleep, MockWatchdog, MockClock>;

#[allow(dead_code)]
pub fn ports(bus: ScriptedBus, cause: ResetCause, now: u64) -> MockPorts {
    NodePorts {
        bus,
        network: MockNetwork::up(),
        pubsub: MockBroker::new(),
        storage: MockNvs::new(),
        sleep: MockSleep::woken_by(cause),
        liveness: MockWatchdog::default(),
        clock: MockClock::at(now),
    }
}
