//! Publish sequencer: network up, session open, retained messages out,
//! everything down again.
//!
//! ```text
//!   connect (≤ attempts × timeout)
//!     └─ last wills (availability → offline)
//!          └─ MQTT session
//!               └─ per kind: availability → config → state → attributes
//!                    └─ MQTT disconnect → network disconnect
//! ```
//!
//! The watchdog is fed before every step that can block.

use log::{debug, info, warn};

use crate::app::context::NodeContext;
use crate::app::events::AppEvent;
use crate::app::ports::{
    BrokerAddress, Credentials, EventSink, LivenessPort, NetworkInfo, NetworkPort, PubSubPort, QoS,
};
use crate::capability::MeasurementSet;
use crate::discovery::{self, AVAILABILITY_OFFLINE, NodeAttributes};
use crate::error::{ConnectivityError, Error, TransportFault};

/// Every message of the hub protocol is sent this way.
const RETAIN: bool = true;
const QOS: QoS = QoS::AtMostOnce;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Every message was accepted by the client.
    Complete,
    /// The session was open but `failed` messages were rejected.
    Incomplete { failed: usize },
    /// Nothing was published: the network or the session never came up.
    Aborted(Error),
}

impl PublishOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

pub struct PublishSequencer<'a> {
    ctx: &'a NodeContext,
}

impl<'a> PublishSequencer<'a> {
    pub fn new(ctx: &'a NodeContext) -> Self {
        Self { ctx }
    }

    pub fn run(
        &self,
        network: &mut impl NetworkPort,
        pubsub: &mut impl PubSubPort,
        liveness: &mut impl LivenessPort,
        sink: &mut impl EventSink,
        measurements: &MeasurementSet,
        uptime_secs: u64,
    ) -> PublishOutcome {
        let info = match self.bring_up(network, liveness, sink) {
            Ok(info) => info,
            Err(e) => return self.abort(sink, e.into()),
        };
        sink.emit(&AppEvent::NetworkUp(info));

        if let Err(fault) = self.open_session(pubsub, liveness, sink) {
            network.disconnect();
            return self.abort(sink, fault.into());
        }

        let attributes = NodeAttributes {
            uptime_secs,
            ip: info.ip,
        };
        let failed = self.publish_all(pubsub, liveness, sink, measurements, &attributes);

        liveness.feed();
        pubsub.disconnect();
        network.disconnect();

        if failed == 0 {
            PublishOutcome::Complete
        } else {
            warn!("{failed} publish(es) failed, snapshot kept");
            PublishOutcome::Incomplete { failed }
        }
    }

    fn abort(&self, sink: &mut impl EventSink, error: Error) -> PublishOutcome {
        sink.emit(&AppEvent::PublishAborted(error));
        PublishOutcome::Aborted(error)
    }

    fn bring_up(
        &self,
        network: &mut impl NetworkPort,
        liveness: &mut impl LivenessPort,
        sink: &mut impl EventSink,
    ) -> Result<NetworkInfo, ConnectivityError> {
        let cfg = &self.ctx.config;
        if cfg.wifi_ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }

        let mut last = ConnectivityError::ConnectionFailed;
        for attempt in 1..=cfg.wifi_attempts {
            liveness.feed();
            match network.connect(
                &cfg.wifi_ssid,
                &cfg.wifi_password,
                cfg.static_ip.as_ref(),
                cfg.wifi_timeout_secs,
            ) {
                Ok(info) => return Ok(info),
                Err(error) => {
                    sink.emit(&AppEvent::NetworkAttemptFailed { attempt, error });
                    last = error;
                    // Retrying cannot fix bad credentials.
                    if matches!(
                        error,
                        ConnectivityError::InvalidSsid | ConnectivityError::InvalidPassword
                    ) {
                        break;
                    }
                }
            }
        }
        network.disconnect();
        Err(last)
    }

    fn open_session(
        &self,
        pubsub: &mut impl PubSubPort,
        liveness: &mut impl LivenessPort,
        sink: &mut impl EventSink,
    ) -> Result<(), TransportFault> {
        let cfg = &self.ctx.config;
        for descriptor in self.ctx.registry.descriptors() {
            let Some(topics) = self.ctx.topics(descriptor.kind) else {
                continue;
            };
            if pubsub
                .set_last_will(&topics.availability, AVAILABILITY_OFFLINE.as_bytes(), RETAIN)
                .is_err()
            {
                sink.emit(&AppEvent::WillRejected {
                    kind: descriptor.kind,
                });
            }
        }

        let credentials = (!cfg.mqtt_user.is_empty()).then(|| Credentials {
            user: &cfg.mqtt_user,
            password: &cfg.mqtt_password,
        });
        liveness.feed();
        info!("MQTT connect {}:{}", cfg.mqtt_host, cfg.mqtt_port);
        pubsub.connect(
            &self.ctx.identity.id,
            BrokerAddress {
                host: &cfg.mqtt_host,
                port: cfg.mqtt_port,
            },
            credentials,
        )
    }

    /// Returns the number of messages that were not delivered.
    fn publish_all(
        &self,
        pubsub: &mut impl PubSubPort,
        liveness: &mut impl LivenessPort,
        sink: &mut impl EventSink,
        measurements: &MeasurementSet,
        attributes: &NodeAttributes,
    ) -> usize {
        let mut failed = 0;
        for descriptor in self.ctx.registry.descriptors() {
            let kind = descriptor.kind;
            let (Some(topics), Some(reading)) = (self.ctx.topics(kind), measurements.get(kind))
            else {
                failed += 4;
                continue;
            };
            let docs = match discovery::build(
                &self.ctx.identity,
                descriptor,
                topics,
                reading,
                attributes,
            ) {
                Ok(docs) => docs,
                Err(fault) => {
                    sink.emit(&AppEvent::PublishFailed {
                        topic: topics.config.clone(),
                        fault,
                    });
                    failed += 4;
                    continue;
                }
            };

            let mut kind_failed = false;
            for msg in docs.in_publish_order() {
                liveness.feed();
                debug!("publish {} <- {}", msg.topic, msg.payload);
                if let Err(fault) = pubsub.publish(&msg.topic, msg.payload.as_bytes(), RETAIN, QOS)
                {
                    sink.emit(&AppEvent::PublishFailed {
                        topic: msg.topic.clone(),
                        fault,
                    });
                    failed += 1;
                    kind_failed = true;
                }
            }
            if !kind_failed {
                sink.emit(&AppEvent::CapabilityPublished(kind));
            }
        }
        failed
    }
}
