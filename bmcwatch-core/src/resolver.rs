//! Hypermedia walk from the Systems collection down to subsystem URLs
//!
//! Each pass only adds to the [`ResourceMap`]. A fetch failure aborts the
//! current pass and leaves whatever was already resolved in place.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::DiscoveryError;
use crate::health::{health_code, power_state_code};
use crate::inventory::{
    HealthSummary, MemoryHealth, ProcessorHealth, ServerIdentity, DEFAULT_MANUFACTURER,
    DEFAULT_MODEL,
};
use crate::model::{decode, first_link, ChassisDocument, Collection, StatusBlock, SystemDocument};
use crate::resources::{Resource, ResourceMap};
use crate::session::SessionManager;
use crate::transport::{AuthMode, Backend, Transport};

pub struct ResourceResolver<'a, B> {
    transport: &'a mut Transport<B>,
    auth: AuthMode,
}

impl<'a, B: Backend> ResourceResolver<'a, B> {
    /// Resolver issuing its reads under the session's auth mode
    pub fn new(transport: &'a mut Transport<B>, session: &SessionManager) -> Self {
        Self {
            transport,
            auth: session.auth_mode(),
        }
    }

    fn host(&self) -> String {
        self.transport.target().host.clone()
    }

    /// Locate the system, read its identity, and record its subsystem links
    pub async fn discover_base(
        &mut self,
        resources: &mut ResourceMap,
        identity: &mut ServerIdentity,
    ) -> Result<HealthSummary, DiscoveryError> {
        let host = self.host();
        let systems_url = resources
            .get(Resource::Systems)
            .map(str::to_string)
            .ok_or_else(|| DiscoveryError::incomplete("no Systems URL resolved"))?;

        let systems: Collection = self.fetch_document(&systems_url, "Systems collection").await?;
        if systems.members.as_ref().map_or(true, Vec::is_empty) {
            return Err(DiscoveryError::incomplete("no system members found under Systems"));
        }
        // A target exposing several logical systems is scraped through its first one
        let system_url = systems
            .first_member()
            .map(str::to_string)
            .ok_or_else(|| DiscoveryError::incomplete("no @odata.id in the first system member"))?;
        resources.set(Resource::System, system_url.as_str());

        let system: SystemDocument = self.fetch_document(&system_url, "system").await?;

        apply_identity(identity, &system);
        if identity.manufacturer == DEFAULT_MANUFACTURER || identity.model == DEFAULT_MODEL {
            debug!("Target {}: incomplete identity on {}, defaults applied", host, system_url);
        }

        let direct = [
            (Resource::Processors, &system.processors),
            (Resource::Memory, &system.memory),
            (Resource::Storage, &system.storage),
            (Resource::Power, &system.power),
            (Resource::Thermal, &system.thermal),
            (Resource::EthernetInterfaces, &system.ethernet_interfaces),
        ];
        for (resource, link) in direct {
            resources.set_link(resource, link.as_ref());
        }

        let links = system.links.clone().unwrap_or_default();
        if let Some(chassis) = first_link(links.chassis.as_deref()) {
            resources.set(Resource::Chassis, chassis);
        }
        if let Some(manager) = first_link(links.managed_by.as_deref()) {
            resources.set(Resource::ManagedBy, manager);
        }

        debug!(
            "Target {}: {} component URLs resolved from {}",
            host,
            resources.advertised_count(),
            system_url
        );
        Ok(summarize_health(&system))
    }

    /// Let chassis-level power/thermal links override the system-level ones
    pub async fn discover_chassis(&mut self, resources: &mut ResourceMap) -> Result<(), DiscoveryError> {
        let host = self.host();
        let Some(chassis_url) = resources.get(Resource::Chassis).map(str::to_string) else {
            debug!("Target {}: no chassis advertised, skipping chassis discovery", host);
            return Ok(());
        };

        let chassis: ChassisDocument = self.fetch_document(&chassis_url, "chassis").await?;
        let scoped = [
            (Resource::PowerSubsystem, &chassis.power_subsystem),
            (Resource::Power, &chassis.power),
            (Resource::ThermalSubsystem, &chassis.thermal_subsystem),
            (Resource::Thermal, &chassis.thermal),
        ];
        for (resource, link) in scoped {
            if resources.set_link(resource, link.as_ref()) {
                debug!("Target {}: {} taken from chassis {}", host, resource, chassis_url);
            }
        }
        Ok(())
    }

    async fn fetch_document<T: DeserializeOwned>(
        &mut self,
        url: &str,
        document: &'static str,
    ) -> Result<T, DiscoveryError> {
        let fetched = self.transport.fetch(url, &self.auth).await?;
        let body: Value = fetched.body.ok_or_else(|| {
            warn!("Target {}: no data received for {} at {}", self.host(), document, url);
            DiscoveryError::incomplete(format!("no data received for {document} at {url}"))
        })?;
        decode(&body).map_err(|reason| DiscoveryError::Malformed { document, reason })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn status_health(status: &Option<StatusBlock>) -> u8 {
    health_code(status.as_ref().and_then(|s| s.health.as_deref()))
}

fn apply_identity(identity: &mut ServerIdentity, system: &SystemDocument) {
    identity.manufacturer =
        non_empty(&system.manufacturer).unwrap_or_else(|| DEFAULT_MANUFACTURER.to_string());
    identity.model = non_empty(&system.model).unwrap_or_else(|| DEFAULT_MODEL.to_string());
    identity.serial = non_empty(&system.serial_number).unwrap_or_default();
    identity.power_state_code = power_state_code(system.power_state.as_deref());
    identity.health_code = status_health(&system.status);
}

fn display_value(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "unknown".to_string(),
    }
}

fn summarize_health(system: &SystemDocument) -> HealthSummary {
    let processor = system.processor_summary.as_ref().map(|summary| ProcessorHealth {
        model: non_empty(&summary.model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        count: display_value(&summary.count),
        health_code: status_health(&summary.status),
    });
    let memory = system.memory_summary.as_ref().map(|summary| MemoryHealth {
        total_system_memory_gb: display_value(&summary.total_system_memory_gib),
        health_code: status_health(&summary.status),
    });
    HealthSummary { processor, memory }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn system(value: Value) -> SystemDocument {
        decode(&value).unwrap()
    }

    #[test]
    fn test_identity_defaults_on_missing_fields() {
        let mut identity = ServerIdentity::default();
        apply_identity(&mut identity, &system(json!({})));
        assert_eq!(identity.manufacturer, "Custom");
        assert_eq!(identity.model, "unknown");
        assert_eq!(identity.serial, "");
        assert_eq!(identity.power_state_code, 0);
        assert_eq!(identity.health_code, 0);
    }

    #[test]
    fn test_identity_defaults_on_malformed_fields() {
        let mut identity = ServerIdentity::default();
        apply_identity(
            &mut identity,
            &system(json!({
                "Manufacturer": "",
                "Model": ["R640"],
                "SerialNumber": {"value": 1},
                "PowerState": 1,
                "Status": {"Health": false}
            })),
        );
        assert_eq!(identity.manufacturer, "Custom");
        assert_eq!(identity.model, "unknown");
        assert_eq!(identity.serial, "");
        assert_eq!(identity.power_state_code, 0);
        assert_eq!(identity.health_code, 0);
    }

    #[test]
    fn test_identity_from_complete_document() {
        let mut identity = ServerIdentity::default();
        apply_identity(
            &mut identity,
            &system(json!({
                "Manufacturer": "Dell Inc.",
                "Model": "PowerEdge R640",
                "SerialNumber": "CN7475178K0043",
                "SKU": "7XK9R32",
                "PowerState": "On",
                "Status": {"Health": "Warning", "State": "Enabled"}
            })),
        );
        assert_eq!(identity.manufacturer, "Dell Inc.");
        assert_eq!(identity.model, "PowerEdge R640");
        assert_eq!(identity.serial, "CN7475178K0043");
        assert_eq!(identity.power_state_code, 1);
        assert_eq!(identity.health_code, 2);
    }

    #[test]
    fn test_health_summary() {
        let summary = summarize_health(&system(json!({
            "ProcessorSummary": {"Model": "Xeon Gold 6130", "Count": 2, "Status": {"Health": "Critical"}},
            "MemorySummary": {"TotalSystemMemoryGiB": 384, "Status": {"HealthRollup": "OK"}}
        })));
        let processor = summary.processor.unwrap();
        assert_eq!(processor.model, "Xeon Gold 6130");
        assert_eq!(processor.count, "2");
        assert_eq!(processor.health_code, 1);
        let memory = summary.memory.unwrap();
        assert_eq!(memory.total_system_memory_gb, "384");
        assert_eq!(memory.health_code, 0);

        let empty = summarize_health(&system(json!({})));
        assert_eq!(empty, HealthSummary::default());
    }
}
