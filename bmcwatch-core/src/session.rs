//! Authentication lifecycle for one BMC
//!
//! ```text
//! Unestablished --root ok, SessionService 200--> TokenPending --token + session URL--> TokenAuth
//!       |                          |                     |
//!       |                          +--> BasicAuth <------+ (POST failed twice / HTTP error / timeout)
//!       +--> Failed (no root, missing links, session without token or URL)
//! any state --teardown--> Closed
//! ```

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::error::DiscoveryError;
use crate::model::{decode, ODataId, ServiceRoot, SessionServiceDocument};
use crate::transport::{resource_path, AuthMode, Backend, Fetched, Transport, AUTH_TOKEN_HEADER};

/// Entry point of every Redfish service
pub const SERVICE_ROOT: &str = "/redfish/v1";

/// Reported when the root document carries no `RedfishVersion`
pub const UNKNOWN_VERSION: &str = "not available";

/// Session creation is tried once more after a connection-level failure
const MAX_SESSION_ATTEMPTS: u32 = 2;

/// Links read from the service root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootLinks {
    pub redfish_version: String,
    pub systems: Option<String>,
    pub session_service: Option<String>,
}

/// A session created on the controller
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSession {
    pub token: String,
    pub resource_url: String,
}

impl std::fmt::Debug for TokenSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSession")
            .field("token", &"<redacted>")
            .field("resource_url", &self.resource_url)
            .finish()
    }
}

#[derive(Debug)]
pub enum SessionState {
    Unestablished,
    TokenPending,
    TokenAuth(TokenSession),
    BasicAuth,
    Failed(DiscoveryError),
    Closed,
}

/// Authentication mode in effect, as seen by the rest of the scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SessionMode {
    Unauthenticated,
    TokenAuth,
    BasicAuth,
}

/// How a session creation attempt ended
enum SessionAttempt {
    Created(Fetched),
    Fallback(String),
}

#[derive(Debug)]
pub struct SessionManager {
    state: SessionState,
    root: Option<RootLinks>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unestablished,
            root: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Links read from the service root, once it has been fetched
    pub fn root(&self) -> Option<&RootLinks> {
        self.root.as_ref()
    }

    pub fn mode(&self) -> SessionMode {
        match self.state {
            SessionState::TokenAuth(_) => SessionMode::TokenAuth,
            SessionState::BasicAuth => SessionMode::BasicAuth,
            _ => SessionMode::Unauthenticated,
        }
    }

    /// Auth mode subsequent requests must use
    pub fn auth_mode(&self) -> AuthMode {
        match &self.state {
            SessionState::TokenAuth(session) => AuthMode::Token(session.token.clone()),
            SessionState::BasicAuth => AuthMode::Basic,
            _ => AuthMode::None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match &self.state {
            SessionState::TokenAuth(session) => Some(&session.token),
            _ => None,
        }
    }

    /// Reachable in the session sense: a token session is in place.
    /// A basic-auth fallback only counts once discovery proves the
    /// credentials work, which is the caller's call.
    pub fn is_up(&self) -> bool {
        matches!(self.state, SessionState::TokenAuth(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, SessionState::Failed(_))
    }

    /// Negotiate how to authenticate against the target.
    ///
    /// Ends in `TokenAuth`, `BasicAuth` or `Failed`; never returns an error.
    pub async fn establish<B: Backend>(&mut self, transport: &mut Transport<B>) -> &SessionState {
        let host = transport.target().host.clone();
        info!("Target {}: connecting to server {}", host, host);

        self.state = match self.negotiate(transport, &host).await {
            Ok(state) => state,
            Err(err) => {
                warn!("Target {}: session negotiation failed: {}", host, err);
                SessionState::Failed(err)
            }
        };
        &self.state
    }

    async fn negotiate<B: Backend>(
        &mut self,
        transport: &mut Transport<B>,
        host: &str,
    ) -> Result<SessionState, DiscoveryError> {
        let root_body = transport
            .fetch(SERVICE_ROOT, &AuthMode::None)
            .await?
            .body
            .ok_or_else(|| DiscoveryError::incomplete("no data received for the service root"))?;
        debug!("Target {}: service root received", host);

        let root: ServiceRoot = decode(&root_body).map_err(|reason| DiscoveryError::Malformed {
            document: "service root",
            reason,
        })?;
        let links = RootLinks {
            redfish_version: root
                .redfish_version
                .unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            systems: root.systems.as_ref().and_then(|l| l.url()).map(str::to_string),
            session_service: root
                .session_service
                .as_ref()
                .and_then(|l| l.url())
                .map(str::to_string),
        };
        self.root = Some(links.clone());

        if links.systems.is_none() {
            return Err(DiscoveryError::incomplete("no Systems URL in the service root"));
        }
        let Some(session_service) = links.session_service else {
            return Err(DiscoveryError::incomplete(
                "no SessionService URL in the service root",
            ));
        };

        // Learning the session endpoint needs an authenticated read
        let service = match transport.fetch(&session_service, &AuthMode::Basic).await {
            Ok(fetched) if fetched.status == 200 => fetched,
            Ok(fetched) => {
                warn!(
                    "Target {}: SessionService answered HTTP {}, switching to basic authentication",
                    host, fetched.status
                );
                return Ok(SessionState::BasicAuth);
            }
            Err(err) => {
                warn!(
                    "Target {}: failed to read the SessionService ({}), switching to basic authentication",
                    host, err
                );
                return Ok(SessionState::BasicAuth);
            }
        };

        let sessions_url = service
            .body
            .as_ref()
            .and_then(|body| decode::<SessionServiceDocument>(body).ok())
            .and_then(|doc| doc.sessions)
            .and_then(|link| link.url().map(str::to_string));
        let Some(sessions_url) = sessions_url else {
            warn!(
                "Target {}: SessionService advertises no Sessions collection, switching to basic authentication",
                host
            );
            return Ok(SessionState::BasicAuth);
        };

        self.state = SessionState::TokenPending;
        let created = match self.create_session(transport, host, &sessions_url).await {
            SessionAttempt::Created(created) => created,
            SessionAttempt::Fallback(reason) => {
                warn!("Target {}: no session received ({}), switching to basic authentication", host, reason);
                return Ok(SessionState::BasicAuth);
            }
        };

        let Some(token) = created.header(AUTH_TOKEN_HEADER).map(str::to_string) else {
            return Err(DiscoveryError::incomplete("no X-Auth-Token in the session response"));
        };

        let resource_url = created
            .header("Location")
            .map(resource_path)
            .or_else(|| {
                created
                    .body
                    .as_ref()
                    .and_then(|body| decode::<ODataId>(body).ok())
                    .and_then(|id| id.odata_id)
                    .filter(|url| !url.is_empty())
            });
        let Some(resource_url) = resource_url else {
            return Err(DiscoveryError::incomplete(
                "session URL found in neither the Location header nor the JSON body",
            ));
        };

        info!("Target {}: got an auth token from server {}", host, host);
        Ok(SessionState::TokenAuth(TokenSession {
            token,
            resource_url,
        }))
    }

    /// POST the credentials, retrying once after a connection-level failure
    async fn create_session<B: Backend>(
        &self,
        transport: &mut Transport<B>,
        host: &str,
        sessions_url: &str,
    ) -> SessionAttempt {
        let payload: Value = json!({
            "UserName": transport.target().username,
            "Password": transport.target().password,
        });

        let mut attempt = 0;
        loop {
            attempt += 1;
            match transport.post_json(sessions_url, &payload, &AuthMode::None).await {
                Ok(created) if matches!(created.status, 200 | 201) => {
                    return SessionAttempt::Created(created)
                }
                Ok(other) => {
                    return SessionAttempt::Fallback(format!(
                        "unexpected HTTP {} from session creation",
                        other.status
                    ))
                }
                Err(err) if err.is_connection_level() && attempt < MAX_SESSION_ATTEMPTS => {
                    warn!(
                        "Target {}: failed to get an auth token from server {} ({}), retrying",
                        host, host, err
                    );
                }
                Err(err) => {
                    if err.is_connection_level() {
                        error!(
                            "Target {}: error getting an auth token after {} attempts: {}",
                            host, attempt, err
                        );
                    }
                    return SessionAttempt::Fallback(err.to_string());
                }
            }
        }
    }

    /// Release the session and the connection.
    ///
    /// Deletes the remote session when one was created, ignoring failures.
    /// Always closes the transport. Safe to call more than once.
    pub async fn teardown<B: Backend>(&mut self, transport: &mut Transport<B>) {
        let host = transport.target().host.clone();
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::TokenAuth(session) => {
                debug!("Target {}: deleting Redfish session {}", host, session.resource_url);
                let auth = AuthMode::Token(session.token);
                match transport.delete(&session.resource_url, &auth).await {
                    Ok(_) => info!("Target {}: Redfish session deleted", host),
                    Err(err) => warn!(
                        "Target {}: failed to delete session {}: {}",
                        host, session.resource_url, err
                    ),
                }
            }
            _ => debug!("Target {}: no Redfish session to delete", host),
        }
        transport.close();
    }
}
