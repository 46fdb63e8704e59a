//! Per-target map from logical Redfish resources to discovered URLs
//!
//! Entries start out "not advertised". During a discovery pass they are only
//! ever set (a later, more specific link may replace an earlier one) and never
//! cleared.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

use crate::model::Link;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Systems,
    /// First member of the Systems collection
    System,
    SessionService,
    Memory,
    Processors,
    Storage,
    Chassis,
    Power,
    Thermal,
    PowerSubsystem,
    ThermalSubsystem,
    EthernetInterfaces,
    ManagedBy,
}

const RESOURCE_COUNT: usize = 13;

impl Resource {
    pub const ALL: [Resource; RESOURCE_COUNT] = [
        Resource::Systems,
        Resource::System,
        Resource::SessionService,
        Resource::Memory,
        Resource::Processors,
        Resource::Storage,
        Resource::Chassis,
        Resource::Power,
        Resource::Thermal,
        Resource::PowerSubsystem,
        Resource::ThermalSubsystem,
        Resource::EthernetInterfaces,
        Resource::ManagedBy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Resource::Systems => "Systems",
            Resource::System => "System",
            Resource::SessionService => "SessionService",
            Resource::Memory => "Memory",
            Resource::Processors => "Processors",
            Resource::Storage => "Storage",
            Resource::Chassis => "Chassis",
            Resource::Power => "Power",
            Resource::Thermal => "Thermal",
            Resource::PowerSubsystem => "PowerSubsystem",
            Resource::ThermalSubsystem => "ThermalSubsystem",
            Resource::EthernetInterfaces => "EthernetInterfaces",
            Resource::ManagedBy => "ManagedBy",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMap {
    urls: [Option<String>; RESOURCE_COUNT],
}

impl ResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL of `resource`, `None` when the server did not advertise it
    pub fn get(&self, resource: Resource) -> Option<&str> {
        self.urls[resource.index()].as_deref()
    }

    /// URL of `resource`, empty string when not advertised
    pub fn url(&self, resource: Resource) -> &str {
        self.get(resource).unwrap_or("")
    }

    pub fn is_advertised(&self, resource: Resource) -> bool {
        self.get(resource).is_some()
    }

    /// Record a URL. Empty URLs are ignored so an entry is never cleared.
    /// Returns whether the entry was set.
    pub fn set(&mut self, resource: Resource, url: impl Into<String>) -> bool {
        let url = url.into();
        if url.is_empty() {
            return false;
        }
        self.urls[resource.index()] = Some(url);
        true
    }

    /// Record the URL carried by an optional link, if any
    pub fn set_link(&mut self, resource: Resource, link: Option<&Link>) -> bool {
        match link.and_then(Link::url) {
            Some(url) => self.set(resource, url),
            None => false,
        }
    }

    /// Advertised entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (Resource, &str)> + '_ {
        Resource::ALL
            .iter()
            .filter_map(move |r| self.get(*r).map(|url| (*r, url)))
    }

    pub fn advertised_count(&self) -> usize {
        self.urls.iter().filter(|u| u.is_some()).count()
    }
}

/// Serialized as a name -> URL object with an empty string for every
/// resource that was not advertised
impl Serialize for ResourceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(RESOURCE_COUNT))?;
        for resource in Resource::ALL {
            map.serialize_entry(resource.name(), self.url(resource))?;
        }
        map.end()
    }
}
