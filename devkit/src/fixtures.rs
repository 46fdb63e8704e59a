/*!
Redfish document builders

Documents shaped like what a Dell iDRAC 9 serves, with every link a scrape
follows. `RedfishFixtures::healthy_bmc()` wires them into a [`MockBmc`] that
accepts token sessions.
*/

use crate::mock_bmc::{MockBmc, MockReply};
use serde_json::{json, Value};

pub const ROOT: &str = "/redfish/v1";
pub const SESSION_SERVICE: &str = "/redfish/v1/SessionService";
pub const SESSIONS: &str = "/redfish/v1/SessionService/Sessions";
pub const SESSION: &str = "/redfish/v1/SessionService/Sessions/1";
pub const SYSTEMS: &str = "/redfish/v1/Systems";
pub const SYSTEM: &str = "/redfish/v1/Systems/System.Embedded.1";
pub const CHASSIS: &str = "/redfish/v1/Chassis/System.Embedded.1";
pub const MANAGER: &str = "/redfish/v1/Managers/iDRAC.Embedded.1";

pub const TOKEN: &str = "9f3c1b7e2d";

/// Collections the system links to, with their member counts
pub const SYSTEM_COLLECTIONS: [(&str, u64); 4] = [
    ("/redfish/v1/Systems/System.Embedded.1/Processors", 2),
    ("/redfish/v1/Systems/System.Embedded.1/Memory", 12),
    ("/redfish/v1/Systems/System.Embedded.1/Storage", 3),
    ("/redfish/v1/Systems/System.Embedded.1/EthernetInterfaces", 4),
];

pub struct RedfishFixtures;

impl RedfishFixtures {
    pub fn odata(url: &str) -> Value {
        json!({ "@odata.id": url })
    }

    pub fn service_root() -> Value {
        json!({
            "@odata.id": ROOT,
            "Id": "RootService",
            "RedfishVersion": "1.6.0",
            "Systems": Self::odata(SYSTEMS),
            "Chassis": Self::odata("/redfish/v1/Chassis"),
            "Managers": Self::odata("/redfish/v1/Managers"),
            "SessionService": Self::odata(SESSION_SERVICE)
        })
    }

    pub fn session_service() -> Value {
        json!({
            "@odata.id": SESSION_SERVICE,
            "ServiceEnabled": true,
            "SessionTimeout": 1800,
            "Sessions": Self::odata(SESSIONS)
        })
    }

    pub fn collection(members: &[&str]) -> Value {
        let members: Vec<Value> = members.iter().map(|m| Self::odata(m)).collect();
        json!({
            "Members@odata.count": members.len(),
            "Members": members
        })
    }

    /// Collection advertising `count` members through `Members@odata.count` only
    pub fn counted_collection(url: &str, count: u64) -> Value {
        json!({
            "@odata.id": url,
            "Members@odata.count": count,
            "Members": []
        })
    }

    pub fn system() -> Value {
        json!({
            "@odata.id": SYSTEM,
            "Id": "System.Embedded.1",
            "Manufacturer": "Dell Inc.",
            "Model": "PowerEdge R640",
            "SerialNumber": "CN7475178K0043",
            "SKU": "7XK9R32",
            "PowerState": "On",
            "Status": {"Health": "OK", "HealthRollup": "OK", "State": "Enabled"},
            "ProcessorSummary": {
                "Count": 2,
                "Model": "Intel(R) Xeon(R) Gold 6130 CPU @ 2.10GHz",
                "Status": {"Health": "OK", "State": "Enabled"}
            },
            "MemorySummary": {
                "TotalSystemMemoryGiB": 384,
                "Status": {"Health": "OK", "State": "Enabled"}
            },
            "Processors": Self::odata(SYSTEM_COLLECTIONS[0].0),
            "Memory": Self::odata(SYSTEM_COLLECTIONS[1].0),
            "Storage": Self::odata(SYSTEM_COLLECTIONS[2].0),
            "EthernetInterfaces": Self::odata(SYSTEM_COLLECTIONS[3].0),
            "Links": {
                "Chassis": [Self::odata(CHASSIS)],
                "ManagedBy": [Self::odata(MANAGER)]
            }
        })
    }

    pub fn chassis() -> Value {
        json!({
            "@odata.id": CHASSIS,
            "Id": "System.Embedded.1",
            "Power": Self::odata(&format!("{CHASSIS}/Power")),
            "Thermal": Self::odata(&format!("{CHASSIS}/Thermal")),
            "PowerSubsystem": Self::odata(&format!("{CHASSIS}/PowerSubsystem")),
            "ThermalSubsystem": Self::odata(&format!("{CHASSIS}/ThermalSubsystem"))
        })
    }

    /// `201 Created` carrying the token and the session location
    pub fn session_created(token: &str, location: &str) -> MockReply {
        MockReply::json(
            201,
            json!({
                "@odata.id": location,
                "Id": "1",
                "UserName": "root"
            }),
        )
        .with_header("X-Auth-Token", token)
        .with_header("Location", location)
    }

    /// Redfish error document as returned with a 4xx/5xx status
    pub fn redfish_error(status: u16, message: &str, extended: &str) -> MockReply {
        MockReply::json(
            status,
            json!({
                "error": {
                    "code": "Base.1.7.GeneralError",
                    "message": message,
                    "@Message.ExtendedInfo": [{"Message": extended, "Severity": "Critical"}]
                }
            }),
        )
    }

    /// A controller that creates token sessions and serves every document
    pub fn healthy_bmc() -> MockBmc {
        let bmc = MockBmc::new();
        bmc.on_get(ROOT, MockReply::json(200, Self::service_root()))
            .on_get(SESSION_SERVICE, MockReply::json(200, Self::session_service()))
            .on_post(SESSIONS, Self::session_created(TOKEN, SESSION))
            .on_delete(SESSION, MockReply::empty(204))
            .on_get(SYSTEMS, MockReply::json(200, Self::collection(&[SYSTEM])))
            .on_get(SYSTEM, MockReply::json(200, Self::system()))
            .on_get(CHASSIS, MockReply::json(200, Self::chassis()));
        for (url, count) in SYSTEM_COLLECTIONS {
            bmc.on_get(url, MockReply::json(200, Self::counted_collection(url, count)));
        }
        log::info!("[MOCK BMC] healthy controller scripted");
        bmc
    }
}
