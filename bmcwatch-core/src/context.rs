//! Per-target scrape aggregate
//!
//! A [`ScrapeContext`] lives for exactly one scrape of one target:
//! 1. `discover()` negotiates the session and walks root -> systems -> chassis
//! 2. downstream producers read it through `view()` (only when the target is up)
//! 3. `teardown()` releases the session and the connection
//!
//! `discover()` never fails; it reports how far it got with a [`ScrapeStatus`].
//! The owner must call `teardown()` on every path, including after a `Down`
//! discovery.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::TransportError;
use crate::inventory::{HealthSummary, Labels, ServerIdentity};
use crate::resolver::ResourceResolver;
use crate::resources::{Resource, ResourceMap};
use crate::session::{SessionManager, SessionMode};
use crate::transport::{AuthMode, Backend, Fetched, Target, Transport};

/// Outcome of a discovery pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    /// No usable session; downstream producers must not run
    Down,
    /// Up, but a discovery step could not complete
    Partial,
    Complete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScrapeCounters {
    /// Elapsed time of the first request, rounded to hundredths
    pub response_time_seconds: f64,
    pub last_http_status: u16,
    pub up: u8,
}

/// Everything a scrape found out, ready to serialize
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub host: String,
    pub status: ScrapeStatus,
    pub up: u8,
    pub session_mode: SessionMode,
    pub redfish_version: String,
    pub response_time_seconds: f64,
    pub last_http_status: u16,
    pub scrape_duration_seconds: f64,
    pub labels: Labels,
    pub identity: ServerIdentity,
    pub health_summary: HealthSummary,
    pub resources: ResourceMap,
}

fn round_hundredths(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 100.0).round() / 100.0
}

pub struct ScrapeContext<B: Backend> {
    transport: Transport<B>,
    session: SessionManager,
    resources: ResourceMap,
    identity: ServerIdentity,
    health: HealthSummary,
    labels: Labels,
    counters: ScrapeCounters,
    status: ScrapeStatus,
    started: Instant,
    torn_down: bool,
}

impl<B: Backend> ScrapeContext<B> {
    pub fn new(target: Target, backend: B) -> Self {
        let labels = Labels::for_host(target.host.clone());
        Self {
            transport: Transport::new(target, backend),
            session: SessionManager::new(),
            resources: ResourceMap::new(),
            identity: ServerIdentity::default(),
            health: HealthSummary::default(),
            labels,
            counters: ScrapeCounters::default(),
            status: ScrapeStatus::Down,
            started: Instant::now(),
            torn_down: false,
        }
    }

    pub fn host(&self) -> &str {
        &self.transport.target().host
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn resources(&self) -> &ResourceMap {
        &self.resources
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    pub fn health_summary(&self) -> &HealthSummary {
        &self.health
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn counters(&self) -> ScrapeCounters {
        self.counters
    }

    pub fn status(&self) -> ScrapeStatus {
        self.status
    }

    pub fn is_up(&self) -> bool {
        self.counters.up == 1
    }

    pub fn transport(&self) -> &Transport<B> {
        &self.transport
    }

    /// Establish the session and resolve the resource map
    pub async fn discover(&mut self) -> ScrapeStatus {
        let host = self.host().to_string();

        self.session.establish(&mut self.transport).await;
        if let Some(first) = self.transport.first_response_time() {
            self.counters.response_time_seconds = round_hundredths(first);
            info!(
                "Target {}: response time: {} seconds",
                host, self.counters.response_time_seconds
            );
        }
        if let Some(root) = self.session.root() {
            self.identity.redfish_version = root.redfish_version.clone();
            if let Some(systems) = &root.systems {
                self.resources.set(Resource::Systems, systems.as_str());
            }
            if let Some(service) = &root.session_service {
                self.resources.set(Resource::SessionService, service.as_str());
            }
        }

        self.status = self.resolve(&host).await;
        self.counters.last_http_status = self.transport.last_status();
        self.status
    }

    async fn resolve(&mut self, host: &str) -> ScrapeStatus {
        if self.session.is_failed() {
            warn!("Target {}: no usable session, target marked down", host);
            return ScrapeStatus::Down;
        }
        self.set_up(self.session.is_up());

        let base = ResourceResolver::new(&mut self.transport, &self.session)
            .discover_base(&mut self.resources, &mut self.identity)
            .await;
        match base {
            Ok(health) => {
                self.health = health;
                self.labels = Labels::for_host(host).with_identity(&self.identity);
                // Basic credentials just proved usable
                if self.session.mode() == SessionMode::BasicAuth {
                    self.set_up(true);
                }
            }
            Err(err) => {
                warn!("Target {}: base discovery incomplete: {}", host, err);
                // Systems was read with basic credentials before the step failed
                if self.session.mode() == SessionMode::BasicAuth
                    && self.resources.is_advertised(Resource::System)
                {
                    self.set_up(true);
                }
                return if self.is_up() {
                    ScrapeStatus::Partial
                } else {
                    ScrapeStatus::Down
                };
            }
        }

        let chassis = ResourceResolver::new(&mut self.transport, &self.session)
            .discover_chassis(&mut self.resources)
            .await;
        match chassis {
            Ok(()) => ScrapeStatus::Complete,
            Err(err) => {
                warn!("Target {}: chassis discovery incomplete: {}", host, err);
                ScrapeStatus::Partial
            }
        }
    }

    fn set_up(&mut self, up: bool) {
        // up implies an authenticated mode and a Systems entry
        let valid = up
            && self.session.mode() != SessionMode::Unauthenticated
            && self.resources.is_advertised(Resource::Systems);
        self.counters.up = u8::from(valid);
    }

    /// Read access for downstream producers; `None` while the target is down
    pub fn view(&mut self) -> Option<ScrapeView<'_, B>> {
        if !self.is_up() || self.torn_down {
            return None;
        }
        Some(ScrapeView {
            labels: &self.labels,
            resources: &self.resources,
            identity: &self.identity,
            health: &self.health,
            auth: self.session.auth_mode(),
            transport: &mut self.transport,
        })
    }

    pub fn report(&self) -> ScrapeReport {
        ScrapeReport {
            host: self.host().to_string(),
            status: self.status,
            up: self.counters.up,
            session_mode: self.session.mode(),
            redfish_version: self.identity.redfish_version.clone(),
            response_time_seconds: self.counters.response_time_seconds,
            last_http_status: self.counters.last_http_status,
            scrape_duration_seconds: round_hundredths(self.started.elapsed()),
            labels: self.labels.clone(),
            identity: self.identity.clone(),
            health_summary: self.health.clone(),
            resources: self.resources.clone(),
        }
    }

    /// Delete the session (if any) and release the connection. Idempotent.
    pub async fn teardown(&mut self) {
        self.session.teardown(&mut self.transport).await;
        self.torn_down = true;
        info!(
            "Target {}: scrape finished in {} seconds",
            self.host(),
            round_hundredths(self.started.elapsed())
        );
    }
}

impl<B: Backend> Drop for ScrapeContext<B> {
    fn drop(&mut self) {
        if !self.torn_down {
            warn!(
                "Target {}: scrape context dropped without teardown, session may leak",
                self.host()
            );
            self.transport.close();
        }
    }
}

/// What a downstream producer gets: labels, the resource map, and a fetch
/// operation bound to the established auth mode
pub struct ScrapeView<'a, B: Backend> {
    pub labels: &'a Labels,
    pub resources: &'a ResourceMap,
    pub identity: &'a ServerIdentity,
    pub health: &'a HealthSummary,
    auth: AuthMode,
    transport: &'a mut Transport<B>,
}

impl<B: Backend> ScrapeView<'_, B> {
    pub async fn fetch(&mut self, path: &str) -> Result<Fetched, TransportError> {
        self.transport.fetch(path, &self.auth).await
    }

    /// Fetch an advertised resource; `Ok(None)` when it is not advertised
    pub async fn fetch_resource(
        &mut self,
        resource: Resource,
    ) -> Result<Option<Fetched>, TransportError> {
        let Some(url) = self.resources.get(resource) else {
            return Ok(None);
        };
        self.transport.fetch(url, &self.auth).await.map(Some)
    }
}
