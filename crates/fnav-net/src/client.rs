//! Fetch client
//!
//! Issues one transport request per logical fetch. `fetch` is
//! single-flight: starting a new one cancels the request in flight.
//! `fetch_detached` is for background work and never cancels or is
//! cancelled by `fetch`.
//!
//! All state is in `Cell`/`RefCell`; no borrow is held across an await.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use smol::future;

use crate::{with_retry, CancelToken, FetchError, PageRequest, RetryPolicy, Transport};

/// Fetch client configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Abandon a request after this long
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// The request currently owned by the single-flight slot
#[derive(Debug)]
struct InFlightRequest {
    id: u64,
    path: String,
    token: CancelToken,
}

/// Fragment fetch client
pub struct FetchClient<T: Transport> {
    transport: T,
    config: FetchConfig,
    online: Cell<bool>,
    next_id: Cell<u64>,
    in_flight: RefCell<Option<InFlightRequest>>,
    detached: RefCell<Vec<(u64, CancelToken)>>,
}

impl<T: Transport> FetchClient<T> {
    pub fn new(transport: T, config: FetchConfig) -> Self {
        Self {
            transport,
            config,
            online: Cell::new(true),
            next_id: Cell::new(0),
            in_flight: RefCell::new(None),
            detached: RefCell::new(Vec::new()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    // === Connectivity ===

    pub fn is_online(&self) -> bool {
        self.online.get()
    }

    /// Record the last-known connectivity state
    pub fn set_online(&self, online: bool) {
        self.online.set(online);
    }

    // === Fetching ===

    /// Fetch `path`, superseding any fetch in flight
    pub async fn fetch(&self, path: &str) -> Result<String, FetchError> {
        if !self.is_online() {
            return Err(FetchError::Offline { path: path.to_string() });
        }

        let token = CancelToken::new();
        let id = self.issue_id();
        let previous = self.in_flight.borrow_mut().replace(InFlightRequest {
            id,
            path: path.to_string(),
            token: token.clone(),
        });
        if let Some(previous) = previous {
            tracing::debug!("superseding fetch for {}", previous.path);
            previous.token.cancel();
        }

        let result = self.run(path, &token).await;

        let mut slot = self.in_flight.borrow_mut();
        if slot.as_ref().is_some_and(|req| req.id == id) {
            *slot = None;
        }
        result
    }

    /// `fetch` wrapped in the configured retry policy
    pub async fn fetch_with_retry(&self, path: &str) -> Result<String, FetchError> {
        with_retry(&self.config.retry, |_| self.fetch(path)).await
    }

    /// Bare fetch outside the single-flight slot, no retry
    pub async fn fetch_detached(&self, path: &str) -> Result<String, FetchError> {
        if !self.is_online() {
            return Err(FetchError::Offline { path: path.to_string() });
        }

        let token = CancelToken::new();
        let id = self.issue_id();
        self.detached.borrow_mut().push((id, token.clone()));

        let result = self.run(path, &token).await;

        self.detached.borrow_mut().retain(|(other, _)| *other != id);
        result
    }

    /// Path of the single-flight request, if any
    pub fn in_flight_path(&self) -> Option<String> {
        self.in_flight.borrow().as_ref().map(|req| req.path.clone())
    }

    /// Cancel the single-flight request
    pub fn cancel_in_flight(&self) {
        if let Some(req) = self.in_flight.borrow_mut().take() {
            req.token.cancel();
        }
    }

    /// Cancel every outstanding request, detached ones included
    pub fn cancel_all(&self) {
        self.cancel_in_flight();
        for (_, token) in self.detached.borrow_mut().drain(..) {
            token.cancel();
        }
    }

    fn issue_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// One request raced against cancellation and the timeout
    async fn run(&self, path: &str, token: &CancelToken) -> Result<String, FetchError> {
        let timeout = self.config.timeout;
        let request = PageRequest::for_path(path);

        let send = async {
            self.transport
                .send(request)
                .await
                .map_err(FetchError::from)
        };
        let cancelled = async {
            token.cancelled().await;
            Err(FetchError::Cancelled { path: path.to_string() })
        };
        let timed_out = async {
            smol::Timer::after(timeout).await;
            Err(FetchError::Timeout { path: path.to_string(), after: timeout })
        };

        let response = future::or(send, future::or(cancelled, timed_out)).await;
        if matches!(response, Err(FetchError::Timeout { .. })) {
            token.cancel();
            tracing::warn!("fetch for {} timed out after {:?}", path, timeout);
        }
        response?.into_markup()
    }
}
