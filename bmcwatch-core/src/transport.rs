//! HTTPS/JSON transport to a single BMC
//!
//! Handles:
//! - URL building against `https://{host}` (port 443 unless the host says otherwise)
//! - Auth headers per request (none, basic credentials, session token)
//! - Failure classification into [`TransportError`]
//! - Defensive JSON decoding (an undecodable body is simply absent)
//! - Timing and last-status bookkeeping for the scrape counters
//!
//! The network itself sits behind the [`Backend`] trait. [`ReqwestBackend`]
//! is the real one; tests plug in a scripted mock.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::error::{TimeoutPhase, TransportError};
use crate::model::ErrorHint;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the session token
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// One BMC to scrape. Immutable for the duration of a scrape.
#[derive(Clone)]
pub struct Target {
    pub host: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl Target {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Absolute URL for a path relative to the target root.
    /// Paths that already are absolute URLs are kept as they are.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("https://{}{}", self.host, path)
        } else {
            format!("https://{}/{}", self.host, path)
        }
    }
}

/// Debug output omits the password
impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Reduce a `Location` style value to a path on the target.
/// `https://bmc/redfish/v1/SessionService/Sessions/3` -> `/redfish/v1/SessionService/Sessions/3`
pub fn resource_path(location: &str) -> String {
    match Url::parse(location) {
        Ok(url) => url.path().to_string(),
        Err(_) => location.to_string(),
    }
}

/// How a request authenticates, chosen by the caller
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    None,
    Basic,
    Token(String),
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthMode::None => "None",
            AuthMode::Basic => "Basic",
            AuthMode::Token(_) => "Token(<redacted>)",
        })
    }
}

/// Credentials attached to one outgoing request
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    None,
    Basic { username: String, password: String },
    Token(String),
}

impl Credentials {
    pub fn mode(&self) -> &'static str {
        match self {
            Credentials::None => "none",
            Credentials::Basic { .. } => "basic",
            Credentials::Token(_) => "token",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::None => f.write_str("None"),
            Credentials::Basic { username, .. } => {
                f.debug_struct("Basic").field("username", username).finish()
            }
            Credentials::Token(_) => f.write_str("Token(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub credentials: Credentials,
    pub body: Option<Value>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Sends requests to the controller.
///
/// The connection is acquired lazily by the first `send` and released by
/// `close`; `close` must be safe to call repeatedly.
pub trait Backend: Send {
    fn send(
        &mut self,
        request: Request,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;

    fn close(&mut self);
}

/// HTTPS backend on a reused `reqwest` client, certificate checks disabled
/// since BMCs ship self-signed certificates
#[derive(Debug, Default)]
pub struct ReqwestBackend {
    client: Option<reqwest::Client>,
}

impl ReqwestBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn client(&mut self, connect_timeout: Duration) -> Result<reqwest::Client, TransportError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Connection(format!("failed to build HTTPS client: {e}")))?;
        Ok(self.client.insert(client).clone())
    }
}

impl Backend for ReqwestBackend {
    async fn send(&mut self, request: Request) -> Result<RawResponse, TransportError> {
        let client = self.client(request.timeout)?;

        let mut builder = client
            .request(request.method, &request.url)
            .timeout(request.timeout)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header("charset", HeaderValue::from_static("utf-8"));

        builder = match request.credentials {
            Credentials::None => builder,
            Credentials::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Credentials::Token(token) => builder.header(AUTH_TOKEN_HEADER, token),
        };

        if let Some(body) = &request.body {
            let payload = serde_json::to_vec(body)
                .map_err(|e| TransportError::Protocol(format!("unencodable request body: {e}")))?;
            builder = builder.body(payload);
        }

        let response = builder.send().await.map_err(|e| classify(&e))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| classify(&e))?;

        Ok(RawResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }

    fn close(&mut self) {
        self.client = None;
    }
}

fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        let phase = if err.is_connect() {
            TimeoutPhase::Connect
        } else {
            TimeoutPhase::Read
        };
        TransportError::Timeout(phase)
    } else if err.is_connect() || err.is_request() {
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Protocol(err.to_string())
    }
}

/// Successful response, body decoded when it was JSON
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl Fetched {
    /// Non-empty header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
    }
}

pub struct Transport<B> {
    target: Target,
    backend: B,
    first_response_time: Option<Duration>,
    last_status: u16,
    request_count: u32,
}

impl<B: Backend> Transport<B> {
    pub fn new(target: Target, backend: B) -> Self {
        Self {
            target,
            backend,
            first_response_time: None,
            last_status: 0,
            request_count: 0,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Status of the most recent request, or the failure sentinel
    pub fn last_status(&self) -> u16 {
        self.last_status
    }

    /// Elapsed time of the first request made through this transport
    pub fn first_response_time(&self) -> Option<Duration> {
        self.first_response_time
    }

    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    pub async fn fetch(&mut self, path: &str, auth: &AuthMode) -> Result<Fetched, TransportError> {
        self.execute(Method::GET, path, auth, None).await
    }

    pub async fn post_json(
        &mut self,
        path: &str,
        payload: &Value,
        auth: &AuthMode,
    ) -> Result<Fetched, TransportError> {
        self.execute(Method::POST, path, auth, Some(payload)).await
    }

    pub async fn delete(&mut self, path: &str, auth: &AuthMode) -> Result<Fetched, TransportError> {
        self.execute(Method::DELETE, path, auth, None).await
    }

    /// Release the underlying connection
    pub fn close(&mut self) {
        self.backend.close();
    }

    fn credentials(&self, auth: &AuthMode) -> Credentials {
        match auth {
            AuthMode::None => Credentials::None,
            AuthMode::Basic => Credentials::Basic {
                username: self.target.username.clone(),
                password: self.target.password.clone(),
            },
            AuthMode::Token(token) => Credentials::Token(token.clone()),
        }
    }

    async fn execute(
        &mut self,
        method: Method,
        path: &str,
        auth: &AuthMode,
        payload: Option<&Value>,
    ) -> Result<Fetched, TransportError> {
        let host = self.target.host.clone();
        let url = self.target.url_for(path);
        let credentials = self.credentials(auth);
        debug!("Target {}: {} {} (auth: {})", host, method, url, credentials.mode());

        let request = Request {
            method,
            url: url.clone(),
            credentials,
            body: payload.cloned(),
            timeout: self.target.timeout,
        };

        let started = Instant::now();
        let result = self.backend.send(request).await;
        let elapsed = started.elapsed();
        self.request_count += 1;
        self.first_response_time.get_or_insert(elapsed);
        debug!("Target {}: request duration {:.2}s", host, elapsed.as_secs_f64());

        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                self.last_status = err.status();
                match &err {
                    TransportError::Timeout(phase) => {
                        error!("Target {}: timeout while {} {}", host, phase, url)
                    }
                    TransportError::Connection(reason) => {
                        error!("Target {}: unable to connect to {}: {}", host, url, reason)
                    }
                    other => error!("Target {}: unexpected error on {}: {}", host, url, other),
                }
                return Err(err);
            }
        };

        self.last_status = raw.status;
        let body = decode_body(&host, &raw.body);

        let status = StatusCode::from_u16(raw.status).map_err(|_| {
            TransportError::Protocol(format!("invalid HTTP status {}", raw.status))
        })?;
        if status.is_success() || status.is_redirection() {
            return Ok(Fetched {
                status: raw.status,
                headers: raw.headers,
                body,
            });
        }

        let hint = body.as_ref().and_then(ErrorHint::from_body);
        if let Some(hint) = &hint {
            debug!(
                "Target {}: {}: {}",
                host,
                hint.code.as_deref().unwrap_or("-"),
                hint.message.as_deref().unwrap_or("-")
            );
            if let Some(extended) = &hint.extended {
                debug!("Target {}: {}", host, extended);
            }
        }

        let err = match raw.status {
            401 | 403 => {
                error!(
                    "Target {}: authorization error on {} (HTTP {}), check the configured credentials",
                    host, url, raw.status
                );
                TransportError::Auth { status: raw.status }
            }
            status => {
                error!("Target {}: HTTP error {} on {}", host, status, url);
                TransportError::Http {
                    status,
                    message: hint.and_then(|h| h.summary()),
                }
            }
        };
        Err(err)
    }
}

fn decode_body(host: &str, bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Target {}: no JSON data received ({})", host, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let target = Target::new("10.0.0.5", "root", "calvin");
        assert_eq!(target.url_for("/redfish/v1"), "https://10.0.0.5/redfish/v1");
        assert_eq!(target.url_for("redfish/v1"), "https://10.0.0.5/redfish/v1");
        assert_eq!(
            target.url_for("https://10.0.0.5/redfish/v1/Systems"),
            "https://10.0.0.5/redfish/v1/Systems"
        );

        let with_port = Target::new("bmc.lab:8443", "root", "calvin");
        assert_eq!(with_port.url_for("/redfish/v1"), "https://bmc.lab:8443/redfish/v1");
    }

    #[test]
    fn test_reqwest_backend_connects_lazily() {
        let mut backend = ReqwestBackend::new();
        assert!(!backend.is_connected());
        backend.client(DEFAULT_TIMEOUT).unwrap();
        assert!(backend.is_connected());
        backend.close();
        backend.close();
        assert!(!backend.is_connected());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let target = Target::new("bmc", "admin", "hunter2");
        assert!(!format!("{target:?}").contains("hunter2"));
        assert!(!format!("{:?}", AuthMode::Token("tok-123".into())).contains("tok-123"));
        let basic = Credentials::Basic {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{basic:?}").contains("hunter2"));
    }

    #[test]
    fn test_resource_path_from_location() {
        assert_eq!(
            resource_path("https://10.0.0.5/redfish/v1/SessionService/Sessions/7"),
            "/redfish/v1/SessionService/Sessions/7"
        );
        assert_eq!(
            resource_path("/redfish/v1/SessionService/Sessions/7"),
            "/redfish/v1/SessionService/Sessions/7"
        );
    }

    #[test]
    fn test_decode_body_is_defensive() {
        assert_eq!(decode_body("bmc", b""), None);
        assert_eq!(decode_body("bmc", b"  \n"), None);
        assert_eq!(decode_body("bmc", b"<html>Bad Gateway</html>"), None);
        assert_eq!(
            decode_body("bmc", br#"{"Id":"1"}"#),
            Some(serde_json::json!({"Id": "1"}))
        );
    }

    #[test]
    fn test_fetched_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("x-auth-token", HeaderValue::from_static("abc"));
        headers.insert("location", HeaderValue::from_static(" "));
        let fetched = Fetched {
            status: 201,
            headers,
            body: None,
        };
        assert_eq!(fetched.header(AUTH_TOKEN_HEADER), Some("abc"));
        assert_eq!(fetched.header("Location"), None);
    }
}
