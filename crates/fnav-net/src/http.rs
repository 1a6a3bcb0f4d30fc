//! HTTP transport
//!
//! Blocking reqwest client run on smol's blocking pool. Requests are
//! resolved against a fixed origin; a path that would leave the origin is
//! refused so credentials stay same-origin.

use std::future::Future;
use std::time::Duration;

use url::Url;

use crate::{PageRequest, RawResponse, Transport, TransportError};

/// HTTP transport bound to one origin
#[derive(Debug, Clone)]
pub struct HttpTransport {
    origin: Url,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport for `origin` (e.g. `https://example.com`)
    pub fn new(origin: &str) -> Result<Self, TransportError> {
        Self::with_timeout(origin, Duration::from_secs(30))
    }

    /// Create with a socket-level timeout
    pub fn with_timeout(origin: &str, timeout: Duration) -> Result<Self, TransportError> {
        let origin = Url::parse(origin).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if !matches!(origin.scheme(), "http" | "https") {
            let reason = format!("unsupported scheme: {}", origin.scheme());
            return Err(TransportError::InvalidUrl(reason));
        }

        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("fnav/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self { origin, client })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Absolute URL for a request, refusing cross-origin targets
    pub fn resolve(&self, request: &PageRequest) -> Result<Url, TransportError> {
        let url = self
            .origin
            .join(&request.target())
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if url.origin() != self.origin.origin() {
            return Err(TransportError::InvalidUrl(format!("cross-origin target: {}", url)));
        }
        Ok(url)
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> {
        let client = self.client.clone();
        let url = self.resolve(&request);

        async move {
            let url = url?;
            tracing::info!("HTTP GET {}", url);

            smol::unblock(move || {
                let mut builder = client.get(url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }

                let response = builder
                    .send()
                    .map_err(|e| TransportError::Network(e.to_string()))?;
                let status = response.status();
                let body = response
                    .text()
                    .map_err(|e| TransportError::Network(e.to_string()))?;

                Ok(RawResponse {
                    status: status.as_u16(),
                    status_text: status.canonical_reason().unwrap_or_default().to_string(),
                    body,
                })
            })
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_same_origin() {
        let transport = HttpTransport::new("https://example.com").unwrap();
        let url = transport.resolve(&PageRequest::with_cache_buster("/docs/intro", "7")).unwrap();
        assert_eq!(url.as_str(), "https://example.com/docs/intro?_ts=7");
    }

    #[test]
    fn test_resolve_refuses_cross_origin() {
        let transport = HttpTransport::new("https://example.com").unwrap();
        assert!(transport.resolve(&PageRequest::with_cache_buster("//evil.test/x", "7")).is_err());
    }

    #[test]
    fn test_rejects_non_http_origin() {
        assert!(HttpTransport::new("ftp://example.com").is_err());
        assert!(HttpTransport::new("not a url").is_err());
    }
}
