//! Boot-time context shared by every component of the wake cycle.
//!
//! Built once from the validated configuration and the hardware id, then
//! only borrowed.  Nothing in here changes during a cycle.

use crate::capability::CapabilityKind;
use crate::config::NodeConfig;
use crate::discovery::DeviceIdentity;
use crate::error::ConfigError;
use crate::policy::Tolerances;
use crate::sensors::SensorRegistry;
use crate::topics::TopicSet;

#[derive(Debug, Clone)]
pub struct NodeContext {
    pub config: NodeConfig,
    pub identity: DeviceIdentity,
    pub registry: SensorRegistry,
    pub tolerances: Tolerances,
    topics: [Option<TopicSet>; CapabilityKind::COUNT],
}

impl NodeContext {
    pub fn new(config: NodeConfig, device_id: &str) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = SensorRegistry::from_config(&config)?;
        let identity = DeviceIdentity::new(device_id, &config);
        let mut topics: [Option<TopicSet>; CapabilityKind::COUNT] = Default::default();
        for kind in registry.kinds().iter() {
            topics[kind.index()] = Some(TopicSet::derive(&config.discovery_prefix, &identity, kind));
        }
        Ok(Self {
            tolerances: config.tolerances(),
            config,
            identity,
            registry,
            topics,
        })
    }

    /// Topics of a configured kind.
    pub fn topics(&self, kind: CapabilityKind) -> Option<&TopicSet> {
        self.topics[kind.index()].as_ref()
    }

    pub fn time_budget_secs(&self) -> u64 {
        u64::from(self.config.time_threshold_secs)
    }
}
