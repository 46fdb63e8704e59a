use bmcwatch_core::resolver::ResourceResolver;
use bmcwatch_core::session::SessionManager;
use bmcwatch_core::{Resource, ResourceMap, ServerIdentity, Transport};
use bmcwatch_devkit::fixtures::{CHASSIS, MANAGER, SYSTEM, SYSTEMS, SYSTEM_COLLECTIONS};
use bmcwatch_devkit::{MockBmc, MockReply, RedfishFixtures, TestHarness};
use reqwest::Method;
use serde_json::json;

/// Session plus a resource map seeded the way the scrape seeds it from the root
async fn negotiated(harness: &TestHarness) -> (Transport<MockBmc>, SessionManager, ResourceMap) {
    let mut transport = harness.transport();
    let mut session = SessionManager::new();
    session.establish(&mut transport).await;
    let mut resources = ResourceMap::new();
    resources.set(Resource::Systems, SYSTEMS);
    (transport, session, resources)
}

#[tokio::test]
async fn test_base_discovery_reads_identity_and_links() {
    let harness = TestHarness::healthy();
    let (mut transport, session, mut resources) = negotiated(&harness).await;
    let mut identity = ServerIdentity::default();

    let health = ResourceResolver::new(&mut transport, &session)
        .discover_base(&mut resources, &mut identity)
        .await
        .unwrap();

    assert_eq!(identity.manufacturer, "Dell Inc.");
    assert_eq!(identity.model, "PowerEdge R640");
    assert_eq!(identity.serial, "CN7475178K0043");
    assert_eq!(identity.power_state_code, 1);
    assert_eq!(identity.health_code, 0);

    assert_eq!(resources.url(Resource::System), SYSTEM);
    assert_eq!(resources.url(Resource::Processors), SYSTEM_COLLECTIONS[0].0);
    assert_eq!(resources.url(Resource::Memory), SYSTEM_COLLECTIONS[1].0);
    assert_eq!(resources.url(Resource::Storage), SYSTEM_COLLECTIONS[2].0);
    assert_eq!(resources.url(Resource::EthernetInterfaces), SYSTEM_COLLECTIONS[3].0);
    assert_eq!(resources.url(Resource::Chassis), CHASSIS);
    assert_eq!(resources.url(Resource::ManagedBy), MANAGER);
    assert!(!resources.is_advertised(Resource::Power));

    let processor = health.processor.unwrap();
    assert_eq!(processor.count, "2");
    assert_eq!(health.memory.unwrap().total_system_memory_gb, "384");

    harness.assert_auth(Method::GET, SYSTEMS, "token").unwrap();
    harness.assert_auth(Method::GET, SYSTEM, "token").unwrap();
}

#[tokio::test]
async fn test_chassis_links_override_system_links() {
    let harness = TestHarness::healthy();
    let mut system = RedfishFixtures::system();
    system["Power"] = json!({"@odata.id": "/redfish/v1/Systems/System.Embedded.1/Power"});
    system["Thermal"] = json!({"@odata.id": "/redfish/v1/Systems/System.Embedded.1/Thermal"});
    harness.bmc.on_get(SYSTEM, MockReply::json(200, system));
    harness.bmc.on_get(
        CHASSIS,
        MockReply::json(200, json!({"Thermal": {"@odata.id": "/redfish/v1/Chassis/1/Thermal"}})),
    );
    let (mut transport, session, mut resources) = negotiated(&harness).await;
    let mut identity = ServerIdentity::default();

    let mut resolver = ResourceResolver::new(&mut transport, &session);
    resolver.discover_base(&mut resources, &mut identity).await.unwrap();
    resolver.discover_chassis(&mut resources).await.unwrap();

    assert_eq!(resources.url(Resource::Thermal), "/redfish/v1/Chassis/1/Thermal");
    assert_eq!(
        resources.url(Resource::Power),
        "/redfish/v1/Systems/System.Embedded.1/Power"
    );
    assert!(!resources.is_advertised(Resource::PowerSubsystem));
}

#[tokio::test]
async fn test_chassis_subsystems_recorded() {
    let harness = TestHarness::healthy();
    let (mut transport, session, mut resources) = negotiated(&harness).await;
    let mut identity = ServerIdentity::default();

    let mut resolver = ResourceResolver::new(&mut transport, &session);
    resolver.discover_base(&mut resources, &mut identity).await.unwrap();
    resolver.discover_chassis(&mut resources).await.unwrap();

    assert_eq!(resources.url(Resource::PowerSubsystem), format!("{CHASSIS}/PowerSubsystem"));
    assert_eq!(resources.url(Resource::ThermalSubsystem), format!("{CHASSIS}/ThermalSubsystem"));
    assert_eq!(resources.url(Resource::Power), format!("{CHASSIS}/Power"));
    assert_eq!(resources.url(Resource::Thermal), format!("{CHASSIS}/Thermal"));
}

#[tokio::test]
async fn test_bare_and_object_links_resolve_alike() {
    let harness = TestHarness::healthy();
    harness.bmc.on_get(SYSTEMS, MockReply::json(200, json!({"Members": ["/redfish/v1/Systems/1"]})));
    harness.bmc.on_get(
        "/redfish/v1/Systems/1",
        MockReply::json(
            200,
            json!({
                "Manufacturer": "HPE",
                "Processors": "/redfish/v1/Systems/1/Processors",
                "Memory": {"@odata.id": "/redfish/v1/Systems/1/Memory"},
                "Links": {"Chassis": ["/redfish/v1/Chassis/1"], "ManagedBy": [{"@odata.id": "/redfish/v1/Managers/1"}]}
            }),
        ),
    );
    let (mut transport, session, mut resources) = negotiated(&harness).await;
    let mut identity = ServerIdentity::default();

    ResourceResolver::new(&mut transport, &session)
        .discover_base(&mut resources, &mut identity)
        .await
        .unwrap();

    assert_eq!(resources.url(Resource::System), "/redfish/v1/Systems/1");
    assert_eq!(resources.url(Resource::Processors), "/redfish/v1/Systems/1/Processors");
    assert_eq!(resources.url(Resource::Memory), "/redfish/v1/Systems/1/Memory");
    assert_eq!(resources.url(Resource::Chassis), "/redfish/v1/Chassis/1");
    assert_eq!(resources.url(Resource::ManagedBy), "/redfish/v1/Managers/1");
    assert_eq!(identity.manufacturer, "HPE");
    assert_eq!(identity.model, "unknown");
}

#[tokio::test]
async fn test_empty_systems_collection_is_incomplete() {
    let harness = TestHarness::healthy();
    harness.bmc.on_get(SYSTEMS, MockReply::json(200, json!({"Members": []})));
    let (mut transport, session, mut resources) = negotiated(&harness).await;
    let mut identity = ServerIdentity::default();

    let result = ResourceResolver::new(&mut transport, &session)
        .discover_base(&mut resources, &mut identity)
        .await;

    assert!(result.is_err());
    assert!(!resources.is_advertised(Resource::System));
    assert_eq!(identity, ServerIdentity::default());
    harness.assert_request_count(Method::GET, SYSTEM, 0).unwrap();
}

#[tokio::test]
async fn test_no_chassis_link_skips_chassis_discovery() {
    let harness = TestHarness::healthy();
    let mut system = RedfishFixtures::system();
    system["Links"] = json!({});
    harness.bmc.on_get(SYSTEM, MockReply::json(200, system));
    let (mut transport, session, mut resources) = negotiated(&harness).await;
    let mut identity = ServerIdentity::default();

    let mut resolver = ResourceResolver::new(&mut transport, &session);
    resolver.discover_base(&mut resources, &mut identity).await.unwrap();
    resolver.discover_chassis(&mut resources).await.unwrap();

    assert!(!resources.is_advertised(Resource::Chassis));
    assert!(!resources.is_advertised(Resource::ManagedBy));
    harness.assert_request_count(Method::GET, CHASSIS, 0).unwrap();
}

#[tokio::test]
async fn test_failed_chassis_fetch_keeps_earlier_entries() {
    let harness = TestHarness::healthy();
    harness.bmc.on_get(
        CHASSIS,
        RedfishFixtures::redfish_error(500, "Internal error", "The chassis is unavailable."),
    );
    let (mut transport, session, mut resources) = negotiated(&harness).await;
    let mut identity = ServerIdentity::default();

    let mut resolver = ResourceResolver::new(&mut transport, &session);
    resolver.discover_base(&mut resources, &mut identity).await.unwrap();
    let before = resources.clone();
    let result = resolver.discover_chassis(&mut resources).await;

    assert!(result.is_err());
    assert_eq!(resources, before);
    assert_eq!(resources.url(Resource::Chassis), CHASSIS);
    assert_eq!(transport.last_status(), 500);
}

#[tokio::test]
async fn test_non_json_system_document_is_incomplete() {
    let harness = TestHarness::healthy();
    harness.bmc.on_get(SYSTEM, MockReply::raw(200, "<html>Service Unavailable</html>"));
    let (mut transport, session, mut resources) = negotiated(&harness).await;
    let mut identity = ServerIdentity::default();

    let result = ResourceResolver::new(&mut transport, &session)
        .discover_base(&mut resources, &mut identity)
        .await;

    assert!(result.is_err());
    // The system URL was already learned from the collection
    assert_eq!(resources.url(Resource::System), SYSTEM);
    assert!(!resources.is_advertised(Resource::Processors));
}
