//! Hub discovery documents.
//!
//! For every capability the node announces four retained messages:
//!
//! | Message      | Payload                                  |
//! |--------------|------------------------------------------|
//! | availability | `online` (the last will carries `offline`) |
//! | config       | discovery JSON describing the entity     |
//! | state        | the rendered reading                     |
//! | attributes   | `{"uptime": ..., "ip_address": ...}`     |
//!
//! [`build`] is pure: the same inputs always produce byte-identical output.
//! It knows nothing about the transport.

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::capability::{BINARY_OFF, BINARY_ON, CapabilityDescriptor, Reading};
use crate::config::NodeConfig;
use crate::error::TransportFault;
use crate::topics::{TopicSet, object_id};

pub const AVAILABILITY_ONLINE: &str = "online";
pub const AVAILABILITY_OFFLINE: &str = "offline";

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Who this node is.  Computed once at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Lowercase hex hardware serial.
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl DeviceIdentity {
    /// An empty `device_name` falls back to the hardware id.
    pub fn new(id: impl Into<String>, config: &NodeConfig) -> Self {
        let id = id.into();
        let name = if config.device_name.is_empty() {
            id.clone()
        } else {
            config.device_name.clone()
        };
        Self {
            id,
            name,
            manufacturer: config.manufacturer.clone(),
            model: config.model.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DevicePayload<'a> {
    identifiers: [&'a str; 1],
    manufacturer: &'a str,
    model: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct ConfigPayload<'a> {
    name: String,
    unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'static str>,
    device_class: &'static str,
    expire_after: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_off: Option<&'static str>,
    availability_topic: &'a str,
    state_topic: &'a str,
    json_attributes_topic: &'a str,
    device: DevicePayload<'a>,
}

/// Runtime facts attached to every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttributes {
    pub uptime_secs: u64,
    pub ip: Ipv4Addr,
}

#[derive(Serialize)]
struct AttributesPayload {
    uptime: String,
    ip_address: String,
}

/// `"<d> days, HH:MM:SS"`.
pub fn format_uptime(secs: u64) -> String {
    format!(
        "{} days, {:02}:{:02}:{:02}",
        secs / 86_400,
        secs / 3_600 % 24,
        secs / 60 % 60,
        secs % 60
    )
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
}

/// The four messages of one capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryDocuments {
    pub availability: Message,
    pub config: Message,
    pub state: Message,
    pub attributes: Message,
}

impl DiscoveryDocuments {
    /// availability → config → state → attributes.
    pub fn in_publish_order(&self) -> [&Message; 4] {
        [&self.availability, &self.config, &self.state, &self.attributes]
    }
}

pub fn build(
    identity: &DeviceIdentity,
    descriptor: &CapabilityDescriptor,
    topics: &TopicSet,
    reading: Reading,
    attributes: &NodeAttributes,
) -> Result<DiscoveryDocuments, TransportFault> {
    let kind = descriptor.kind;
    let object = object_id(identity, kind);
    let (payload_on, payload_off) = if kind.is_numeric() {
        (None, None)
    } else {
        (Some(BINARY_ON), Some(BINARY_OFF))
    };

    let config = ConfigPayload {
        unique_id: format!("{}_{}", identity.id, kind.slug()),
        name: object,
        unit_of_measurement: kind.unit(),
        device_class: kind.device_class(),
        expire_after: descriptor.expire_after_secs,
        payload_on,
        payload_off,
        availability_topic: &topics.availability,
        state_topic: &topics.state,
        json_attributes_topic: &topics.attributes,
        device: DevicePayload {
            identifiers: [identity.id.as_str()],
            manufacturer: &identity.manufacturer,
            model: &identity.model,
            name: &identity.name,
        },
    };
    let attrs = AttributesPayload {
        uptime: format_uptime(attributes.uptime_secs),
        ip_address: attributes.ip.to_string(),
    };

    Ok(DiscoveryDocuments {
        availability: Message {
            topic: topics.availability.clone(),
            payload: AVAILABILITY_ONLINE.to_owned(),
        },
        config: Message {
            topic: topics.config.clone(),
            payload: serde_json::to_string(&config).map_err(|_| TransportFault::Encode)?,
        },
        state: Message {
            topic: topics.state.clone(),
            payload: reading.state_payload().as_str().to_owned(),
        },
        attributes: Message {
            topic: topics.attributes.clone(),
            payload: serde_json::to_string(&attrs).map_err(|_| TransportFault::Encode)?,
        },
    })
}
