/*!
# bmcwatch-core - Redfish session negotiation and resource discovery

Everything needed to get from a BMC host name to an authenticated session and
a map of the Redfish resources that server advertises:
- `transport`: HTTPS/JSON requests with per-request auth and failure classes
- `session`: token session negotiation with basic-auth fallback, and teardown
- `resolver`: hypermedia walk root -> Systems -> system -> chassis
- `context`: one scrape of one target, tying the above together

```no_run
# async fn run() {
use bmcwatch_core::{ReqwestBackend, ScrapeContext, Target};

let target = Target::new("10.0.0.5", "root", "calvin");
let mut scrape = ScrapeContext::new(target, ReqwestBackend::new());
scrape.discover().await;
println!("{:?}", scrape.resources());
scrape.teardown().await;
# }
```
*/

pub mod context;
pub mod error;
pub mod health;
pub mod inventory;
pub mod model;
pub mod resolver;
pub mod resources;
pub mod session;
pub mod transport;

pub use context::{ScrapeContext, ScrapeCounters, ScrapeReport, ScrapeStatus, ScrapeView};
pub use error::{DiscoveryError, TimeoutPhase, TransportError};
pub use inventory::{HealthSummary, Labels, ServerIdentity};
pub use resources::{Resource, ResourceMap};
pub use session::{SessionManager, SessionMode, SessionState};
pub use transport::{AuthMode, Backend, Credentials, Fetched, RawResponse, ReqwestBackend, Request, Target, Transport};
