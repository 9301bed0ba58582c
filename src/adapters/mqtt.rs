//! MQTT client adapter.
//!
//! Implements [`PubSubPort`] for one short-lived session per wake cycle.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//!   The client connects in the background; `connect` waits for the
//!   `Connected` event with a bounded poll.  ESP-MQTT carries exactly one
//!   last will per session, so the first registered will is used and any
//!   further ones are rejected.
//! - **all other targets**: an in-memory recorder so host runs can print
//!   what would have gone out.

use log::{info, warn};

use crate::app::ports::{BrokerAddress, Credentials, PubSubPort, QoS};
use crate::error::TransportFault;

#[cfg(target_os = "espidf")]
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    handle::RawHandle,
    hal::delay::FreeRtos,
    sys::{ESP_OK, esp_mqtt_client_disconnect},
    mqtt::client::{
        EspMqttClient, EventPayload, LwtConfiguration, MqttClientConfiguration,
        QoS as EspQoS,
    },
};

/// Upper bound on the broker handshake.
pub const CONNECT_TIMEOUT_SECS: u32 = 10;

/// Upper bound on waiting for the DISCONNECT to be flushed.
#[cfg(target_os = "espidf")]
const DISCONNECT_TIMEOUT_MS: u32 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// A message the host backend accepted.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

pub struct MqttAdapter {
    will: Option<Will>,
    connected: bool,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    /// Set by the event callback while the broker link is up.
    #[cfg(target_os = "espidf")]
    link_up: Arc<AtomicBool>,
    #[cfg(not(target_os = "espidf"))]
    sent: Vec<SentMessage>,
}

impl MqttAdapter {
    pub fn new() -> Self {
        Self {
            will: None,
            connected: false,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            link_up: Arc::new(AtomicBool::new(false)),
            #[cfg(not(target_os = "espidf"))]
            sent: Vec::new(),
        }
    }

    pub fn will(&self) -> Option<&Will> {
        self.will.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sent(&self) -> &[SentMessage] {
        &self.sent
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(
        &mut self,
        client_id: &str,
        broker: BrokerAddress<'_>,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), TransportFault> {
        let url = format!("mqtt://{}:{}", broker.host, broker.port);
        let lwt = self.will.as_ref().map(|w| LwtConfiguration {
            topic: &w.topic,
            payload: &w.payload,
            qos: EspQoS::AtMostOnce,
            retain: w.retain,
        });
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username: credentials.map(|c| c.user),
            password: credentials
                .map(|c| c.password)
                .filter(|p| !p.is_empty()),
            lwt,
            ..Default::default()
        };

        let up = self.link_up.clone();
        up.store(false, Ordering::Release);
        let flag = up.clone();
        let client = EspMqttClient::new_cb(&url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => flag.store(true, Ordering::Release),
            EventPayload::Disconnected => flag.store(false, Ordering::Release),
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client init failed: {e}");
            TransportFault::ConnectFailed
        })?;

        let mut waited_ms = 0;
        while !up.load(Ordering::Acquire) {
            if waited_ms >= CONNECT_TIMEOUT_SECS * 1000 {
                return Err(TransportFault::ConnectFailed);
            }
            FreeRtos::delay_ms(100);
            waited_ms += 100;
        }
        self.client = Some(client);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(
        &mut self,
        client_id: &str,
        broker: BrokerAddress<'_>,
        _credentials: Option<Credentials<'_>>,
    ) -> Result<(), TransportFault> {
        if broker.host.is_empty() {
            return Err(TransportFault::ConnectFailed);
        }
        info!(
            "MQTT(sim): '{client_id}' session on {}:{}",
            broker.host, broker.port
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), TransportFault> {
        let client = self.client.as_mut().ok_or(TransportFault::PublishFailed)?;
        let qos = match qos {
            QoS::AtMostOnce => EspQoS::AtMostOnce,
            QoS::AtLeastOnce => EspQoS::AtLeastOnce,
        };
        client
            .publish(topic, qos, retain, payload)
            .map(|_| ())
            .map_err(|_| TransportFault::PublishFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        _qos: QoS,
    ) -> Result<(), TransportFault> {
        self.sent.push(SentMessage {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }

    /// Sends an MQTT DISCONNECT and waits for the link to drop before the
    /// client is destroyed, so the broker never fires the will.
    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        // SAFETY: the handle is live until `client` is dropped below.
        let ret = unsafe { esp_mqtt_client_disconnect(client.handle()) };
        if ret != ESP_OK {
            warn!("MQTT: disconnect request failed ({ret})");
        } else {
            let mut waited_ms = 0;
            while self.link_up.load(Ordering::Acquire) && waited_ms < DISCONNECT_TIMEOUT_MS {
                FreeRtos::delay_ms(50);
                waited_ms += 50;
            }
            if self.link_up.load(Ordering::Acquire) {
                warn!("MQTT: link still up after DISCONNECT, destroying client");
            }
        }
        // Drop stops the ESP-MQTT task and frees the handle.
        drop(client);
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {}
}

impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// PubSubPort
// ───────────────────────────────────────────────────────────────

impl PubSubPort for MqttAdapter {
    fn set_last_will(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), TransportFault> {
        if self.connected {
            return Err(TransportFault::WillRejected);
        }
        if let Some(existing) = &self.will {
            if existing.topic != topic {
                warn!("MQTT: one will per session, '{topic}' not registered");
                return Err(TransportFault::WillRejected);
            }
        }
        self.will = Some(Will {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }

    fn connect(
        &mut self,
        client_id: &str,
        broker: BrokerAddress<'_>,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), TransportFault> {
        match self.platform_connect(client_id, broker, credentials) {
            Ok(()) => {
                self.connected = true;
                info!("MQTT: connected as '{client_id}'");
                Ok(())
            }
            Err(e) => {
                warn!("MQTT: connect to {}:{} failed: {e}", broker.host, broker.port);
                self.will = None;
                Err(e)
            }
        }
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), TransportFault> {
        if !self.connected {
            return Err(TransportFault::PublishFailed);
        }
        self.platform_publish(topic, payload, retain, qos)
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.connected = false;
        self.will = None;
        info!("MQTT: disconnected");
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
