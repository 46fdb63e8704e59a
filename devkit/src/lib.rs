/*!
# bmcwatch DevKit - test doubles for Redfish scrapes

- `mock_bmc`: scripted [`Backend`](bmcwatch_core::Backend) standing in for a controller
- `fixtures`: Redfish documents and a ready-made healthy controller
- `test_utils`: harness with request-log assertions
*/

pub mod fixtures;
pub mod mock_bmc;
pub mod test_utils;

pub use fixtures::RedfishFixtures;
pub use mock_bmc::{MockBmc, MockReply, RecordedRequest};
pub use test_utils::TestHarness;
