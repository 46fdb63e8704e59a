//! Collection census: member counts of the system's component collections
//!
//! Runs through the scrape view, so it only ever sees an up target and reads
//! with whatever authentication the session settled on.

use bmcwatch_core::model::{decode, Collection};
use bmcwatch_core::{Backend, Resource, ScrapeView};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const CENSUS_RESOURCES: [Resource; 4] = [
    Resource::Processors,
    Resource::Memory,
    Resource::Storage,
    Resource::EthernetInterfaces,
];

pub type Census = BTreeMap<String, u64>;

pub async fn take_census<B: Backend>(view: &mut ScrapeView<'_, B>) -> Census {
    let host = view.labels.host.clone();
    let mut census = Census::new();

    for resource in CENSUS_RESOURCES {
        let fetched = match view.fetch_resource(resource).await {
            Ok(Some(fetched)) => fetched,
            Ok(None) => {
                debug!("Target {}: {} not advertised, not counted", host, resource);
                continue;
            }
            Err(e) => {
                warn!("Target {}: failed to read {}: {}", host, resource, e);
                continue;
            }
        };
        match fetched.body.as_ref().map(decode::<Collection>) {
            Some(Ok(collection)) => {
                census.insert(resource.name().to_string(), collection.member_count());
            }
            Some(Err(reason)) => warn!("Target {}: malformed {} collection: {}", host, resource, reason),
            None => warn!("Target {}: no data received for {}", host, resource),
        }
    }
    census
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmcwatch_devkit::fixtures::{SYSTEM, SYSTEM_COLLECTIONS};
    use bmcwatch_devkit::{MockReply, RedfishFixtures, TestHarness};
    use serde_json::json;

    #[tokio::test]
    async fn test_census_counts_advertised_collections() {
        let harness = TestHarness::healthy();
        let mut scrape = harness.context();
        scrape.discover().await;

        let census = take_census(&mut scrape.view().unwrap()).await;

        assert_eq!(census.get("Processors"), Some(&2));
        assert_eq!(census.get("Memory"), Some(&12));
        assert_eq!(census.get("Storage"), Some(&3));
        assert_eq!(census.get("EthernetInterfaces"), Some(&4));
        scrape.teardown().await;
    }

    #[tokio::test]
    async fn test_census_skips_missing_and_broken_collections() {
        let harness = TestHarness::healthy();
        let mut system = RedfishFixtures::system();
        system.as_object_mut().unwrap().remove("Storage");
        harness.bmc.on_get(SYSTEM, MockReply::json(200, system));
        harness.bmc.on_get(SYSTEM_COLLECTIONS[1].0, MockReply::empty(500));
        harness.bmc.on_get(
            SYSTEM_COLLECTIONS[3].0,
            MockReply::json(200, json!({"Members": [{"@odata.id": "/nic/1"}, {"@odata.id": "/nic/2"}]})),
        );
        let mut scrape = harness.context();
        scrape.discover().await;

        let census = take_census(&mut scrape.view().unwrap()).await;

        assert_eq!(census.len(), 2);
        assert_eq!(census.get("Processors"), Some(&2));
        assert_eq!(census.get("EthernetInterfaces"), Some(&2));
        scrape.teardown().await;
    }

    #[tokio::test]
    async fn test_census_keeps_counts_beyond_u32() {
        let harness = TestHarness::healthy();
        harness.bmc.on_get(
            SYSTEM_COLLECTIONS[1].0,
            MockReply::json(200, json!({"Members@odata.count": 5_000_000_000u64, "Members": []})),
        );
        let mut scrape = harness.context();
        scrape.discover().await;

        let census = take_census(&mut scrape.view().unwrap()).await;

        assert_eq!(census.get("Memory"), Some(&5_000_000_000));
        scrape.teardown().await;
    }

    #[tokio::test]
    async fn test_no_view_when_target_down() {
        let harness = TestHarness::new();
        let mut scrape = harness.context();
        scrape.discover().await;
        assert!(scrape.view().is_none());
        scrape.teardown().await;
    }
}
