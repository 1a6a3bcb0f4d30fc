//! Transports
//!
//! The seam between the fetch client and the network. `MemoryTransport`
//! serves fragments from a route table, for headless hosts and tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;

use crate::{PageRequest, RawResponse, TransportError};

/// Sends one fragment request
pub trait Transport {
    fn send(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>>;
}

/// Injected failure for the next request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Transport error with message
    Network(String),
    /// Respond with this status
    Status(u16),
    /// Never respond
    Hang,
}

/// In-memory transport
#[derive(Debug, Default)]
pub struct MemoryTransport {
    routes: RefCell<HashMap<String, RawResponse>>,
    failures: RefCell<VecDeque<Failure>>,
    latency: Cell<Duration>,
    requests: RefCell<Vec<PageRequest>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with 200 for `path`
    pub fn route(self, path: &str, body: &str) -> Self {
        self.set_route(path, RawResponse::ok(body));
        self
    }

    pub fn set_route(&self, path: &str, response: RawResponse) {
        self.routes.borrow_mut().insert(path.to_string(), response);
    }

    /// Delay every response
    pub fn set_latency(&self, latency: Duration) {
        self.latency.set(latency);
    }

    /// Queue a failure, consumed by the next request
    pub fn fail_next(&self, failure: Failure) {
        self.failures.borrow_mut().push_back(failure);
    }

    /// Every request seen so far
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Requests seen for one path
    pub fn requests_for(&self, path: &str) -> usize {
        self.requests.borrow().iter().filter(|r| r.path == path).count()
    }

    fn respond(&self, path: &str) -> RawResponse {
        let key = match path.find(['?', '#']) {
            Some(i) => &path[..i],
            None => path,
        };
        self.routes.borrow().get(key).cloned().unwrap_or_else(|| RawResponse {
            status: 404,
            status_text: "Not Found".into(),
            body: String::new(),
        })
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, request: PageRequest) -> Result<RawResponse, TransportError> {
        let path = request.path.clone();
        self.requests.borrow_mut().push(request);
        let failure = self.failures.borrow_mut().pop_front();

        let latency = self.latency.get();
        if !latency.is_zero() {
            smol::Timer::after(latency).await;
        }

        match failure {
            None => Ok(self.respond(&path)),
            Some(Failure::Network(message)) => Err(TransportError::Network(message)),
            Some(Failure::Status(status)) => Ok(RawResponse {
                status,
                status_text: format!("Injected {}", status),
                body: String::new(),
            }),
            Some(Failure::Hang) => smol::future::pending().await,
        }
    }
}
