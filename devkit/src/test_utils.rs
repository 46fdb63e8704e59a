/*!
Test harness for scrape tests

Bundles a scripted [`MockBmc`] with a target and provides assertions on the
traffic the code under test produced.
*/

use crate::fixtures::RedfishFixtures;
use crate::mock_bmc::{MockBmc, RecordedRequest};
use anyhow::Result;
use bmcwatch_core::{Credentials, ScrapeContext, Target, Transport};
use reqwest::Method;
use std::collections::BTreeMap;
use std::time::Duration;

pub const HOST: &str = "bmc.test";
pub const USERNAME: &str = "root";
pub const PASSWORD: &str = "calvin";

pub struct TestHarness {
    pub bmc: MockBmc,
    pub target: Target,
}

impl TestHarness {
    /// Harness around an unscripted controller
    pub fn new() -> Self {
        Self::with_bmc(MockBmc::new())
    }

    /// Harness around a controller that behaves like a healthy iDRAC
    pub fn healthy() -> Self {
        Self::with_bmc(RedfishFixtures::healthy_bmc())
    }

    pub fn with_bmc(bmc: MockBmc) -> Self {
        env_logger::builder().is_test(true).try_init().ok();
        Self {
            bmc,
            target: Target::new(HOST, USERNAME, PASSWORD).with_timeout(Duration::from_secs(2)),
        }
    }

    pub fn transport(&self) -> Transport<MockBmc> {
        Transport::new(self.target.clone(), self.bmc.clone())
    }

    pub fn context(&self) -> ScrapeContext<MockBmc> {
        ScrapeContext::new(self.target.clone(), self.bmc.clone())
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.bmc.requests_to(method, path)
    }

    /// Assert a route was hit exactly `count` times
    pub fn assert_request_count(&self, method: Method, path: &str, count: usize) -> Result<()> {
        let actual = self.bmc.requests_to(method.clone(), path).len();
        if actual != count {
            anyhow::bail!("{} {}: expected {} requests, got {}", method, path, count, actual);
        }
        Ok(())
    }

    /// Assert every request to a route carried credentials of the given mode
    /// (`"none"`, `"basic"` or `"token"`)
    pub fn assert_auth(&self, method: Method, path: &str, mode: &str) -> Result<()> {
        let requests = self.bmc.requests_to(method.clone(), path);
        if requests.is_empty() {
            anyhow::bail!("{} {}: no request received", method, path);
        }
        for request in requests {
            if request.credentials.mode() != mode {
                anyhow::bail!(
                    "{} {}: expected {} auth, got {}",
                    method,
                    path,
                    mode,
                    request.credentials.mode()
                );
            }
        }
        Ok(())
    }

    /// Assert the request carried exactly this token
    pub fn assert_token(&self, request: &RecordedRequest, token: &str) -> Result<()> {
        match &request.credentials {
            Credentials::Token(sent) if sent == token => Ok(()),
            other => anyhow::bail!("{}: expected token auth, got {:?}", request.path, other),
        }
    }

    /// Requests received, grouped by "METHOD path"
    pub fn get_stats(&self) -> BTreeMap<String, usize> {
        let mut stats = BTreeMap::new();
        for request in self.bmc.requests() {
            *stats
                .entry(format!("{} {}", request.method, request.path))
                .or_insert(0) += 1;
        }
        stats
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ROOT, SESSION_SERVICE};
    use bmcwatch_core::AuthMode;

    #[tokio::test]
    async fn test_harness_assertions() {
        let harness = TestHarness::healthy();
        let mut transport = harness.transport();
        transport.fetch(ROOT, &AuthMode::None).await.unwrap();
        transport.fetch(SESSION_SERVICE, &AuthMode::Basic).await.unwrap();

        harness.assert_request_count(Method::GET, ROOT, 1).unwrap();
        harness.assert_auth(Method::GET, ROOT, "none").unwrap();
        harness.assert_auth(Method::GET, SESSION_SERVICE, "basic").unwrap();
        assert!(harness.assert_auth(Method::GET, ROOT, "token").is_err());
        assert_eq!(harness.get_stats().get("GET /redfish/v1"), Some(&1));
    }
}
