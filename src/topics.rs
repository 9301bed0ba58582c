//! MQTT topic derivation.
//!
//! ```text
//! {prefix}/sensor/{device_id}/{device_name}_{kind}/config
//! {prefix}/sensor/{device_id}/{device_name}_{kind}/state
//! {prefix}/sensor/{device_id}/{device_name}_{kind}/availability
//! {prefix}/{device_id}/{device_name}_{kind}/attributes
//! ```
//!
//! Every kind, contacts included, is announced under the `sensor` segment.
//! The attributes topic has no such segment; deployed hubs already
//! subscribe to that path.

use crate::capability::CapabilityKind;
use crate::discovery::DeviceIdentity;

/// Component segment shared by every capability topic.
pub const COMPONENT: &str = "sensor";

/// The four topics of one capability.  Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    pub config: String,
    pub state: String,
    pub availability: String,
    pub attributes: String,
}

impl TopicSet {
    pub fn derive(prefix: &str, identity: &DeviceIdentity, kind: CapabilityKind) -> Self {
        let object = object_id(identity, kind);
        let base = format!("{prefix}/{COMPONENT}/{}/{object}", identity.id);
        Self {
            config: format!("{base}/config"),
            state: format!("{base}/state"),
            availability: format!("{base}/availability"),
            attributes: format!("{prefix}/{}/{object}/attributes", identity.id),
        }
    }

    /// All four topics, in publish order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [
            self.availability.as_str(),
            self.config.as_str(),
            self.state.as_str(),
            self.attributes.as_str(),
        ]
        .into_iter()
    }
}

/// `{device_name}_{kind}`: entity name and per-capability topic segment.
pub fn object_id(identity: &DeviceIdentity, kind: CapabilityKind) -> String {
    format!("{}_{}", identity.name, kind.slug())
}
