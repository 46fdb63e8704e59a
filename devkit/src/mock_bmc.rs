/*!
Scripted BMC backend for tests without a controller

Answers requests from a per-route script and records everything it receives,
credentials included, so tests can assert on how a scrape authenticated.

A route holds a queue of replies. Each request consumes the head of the queue;
the last reply stays in place and answers every later request. Requests to an
unscripted route get a `404` with an empty body.
*/

use bmcwatch_core::{Backend, Credentials, RawResponse, Request, TransportError};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// One request as the mock BMC saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub credentials: Credentials,
    pub body: Option<Value>,
}

/// What the mock answers on a route
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(RawResponse),
    Failure(TransportError),
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        MockReply::Response(RawResponse {
            status,
            headers,
            body: serde_json::to_vec(&body).unwrap_or_default(),
        })
    }

    /// Response with no body
    pub fn empty(status: u16) -> Self {
        MockReply::Response(RawResponse {
            status,
            ..RawResponse::default()
        })
    }

    /// Response with a raw, possibly non-JSON body
    pub fn raw(status: u16, body: impl Into<Vec<u8>>) -> Self {
        MockReply::Response(RawResponse {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        })
    }

    pub fn failure(error: TransportError) -> Self {
        MockReply::Failure(error)
    }

    /// Add a response header; no effect on failures
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let MockReply::Response(response) = &mut self {
            let name = HeaderName::try_from(name).expect("valid header name");
            let value = HeaderValue::try_from(value).expect("valid header value");
            response.headers.insert(name, value);
        }
        self
    }
}

#[derive(Default)]
struct MockState {
    routes: HashMap<(Method, String), VecDeque<MockReply>>,
    requests: Vec<RecordedRequest>,
    closes: usize,
    connected: bool,
}

impl MockState {
    fn next_reply(&mut self, method: &Method, path: &str) -> MockReply {
        match self.routes.get_mut(&(method.clone(), path.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| MockReply::empty(404)),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| MockReply::empty(404)),
            None => MockReply::empty(404),
        }
    }
}

/// Mock controller implementing [`Backend`]. Clones share the same script and log.
#[derive(Clone, Default)]
pub struct MockBmc {
    state: Arc<Mutex<MockState>>,
}

impl MockBmc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the script of a route with a sequence of replies
    pub fn script(&self, method: Method, path: &str, replies: Vec<MockReply>) -> &Self {
        self.state
            .lock()
            .routes
            .insert((method, path.to_string()), replies.into());
        self
    }

    pub fn on_get(&self, path: &str, reply: MockReply) -> &Self {
        self.script(Method::GET, path, vec![reply])
    }

    pub fn on_post(&self, path: &str, reply: MockReply) -> &Self {
        self.script(Method::POST, path, vec![reply])
    }

    pub fn on_delete(&self, path: &str, reply: MockReply) -> &Self {
        self.script(Method::DELETE, path, vec![reply])
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests received on one route
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// How many times the connection was released
    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }
}

fn path_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(url) => url.path().to_string(),
        Err(_) => url.to_string(),
    }
}

impl Backend for MockBmc {
    async fn send(&mut self, request: Request) -> Result<RawResponse, TransportError> {
        let path = path_of(&request.url);
        let reply = {
            let mut state = self.state.lock();
            state.connected = true;
            state.requests.push(RecordedRequest {
                method: request.method.clone(),
                path: path.clone(),
                credentials: request.credentials,
                body: request.body,
            });
            state.next_reply(&request.method, &path)
        };

        match reply {
            MockReply::Response(response) => {
                log::debug!("[MOCK BMC] {} {} -> {}", request.method, path, response.status);
                Ok(response)
            }
            MockReply::Failure(error) => {
                log::debug!("[MOCK BMC] {} {} -> {}", request.method, path, error);
                Err(error)
            }
        }
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        state.closes += 1;
        state.connected = false;
    }
}
