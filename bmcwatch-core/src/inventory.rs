//! Server identity and health summary read from the system resource

use serde::Serialize;

use crate::health::{HEALTH_OK, POWER_OFF};
use crate::session::UNKNOWN_VERSION;

pub const DEFAULT_MANUFACTURER: &str = "Custom";
pub const DEFAULT_MODEL: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerIdentity {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub health_code: u8,
    pub power_state_code: u8,
    pub redfish_version: String,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            manufacturer: DEFAULT_MANUFACTURER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            serial: String::new(),
            health_code: HEALTH_OK,
            power_state_code: POWER_OFF,
            redfish_version: UNKNOWN_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessorHealth {
    pub model: String,
    pub count: String,
    pub health_code: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryHealth {
    pub total_system_memory_gb: String,
    pub health_code: u8,
}

/// Rolled-up health of the processor and memory subsystems, each present
/// only when the system resource carries the matching summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub processor: Option<ProcessorHealth>,
    pub memory: Option<MemoryHealth>,
}

/// Metric dimensions shared by every producer for a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Labels {
    pub host: String,
    pub server_manufacturer: Option<String>,
    pub server_model: Option<String>,
    pub server_serial: Option<String>,
}

impl Labels {
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            server_manufacturer: None,
            server_model: None,
            server_serial: None,
        }
    }

    pub fn with_identity(mut self, identity: &ServerIdentity) -> Self {
        self.server_manufacturer = Some(identity.manufacturer.clone());
        self.server_model = Some(identity.model.clone());
        self.server_serial = Some(identity.serial.clone());
        self
    }

    /// `(name, value)` pairs for the labels that are known
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![("host", self.host.as_str())];
        let optional = [
            ("server_manufacturer", &self.server_manufacturer),
            ("server_model", &self.server_model),
            ("server_serial", &self.server_serial),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                pairs.push((name, value.as_str()));
            }
        }
        pairs
    }
}
