//! Fragment requests and raw responses

use std::time::{SystemTime, UNIX_EPOCH};

use crate::FetchError;

/// Query parameter carrying the cache buster
pub const CACHE_BUST_PARAM: &str = "_ts";

/// A GET request for a page fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Path as requested by the navigator
    pub path: String,
    /// Value of the cache-busting parameter
    pub cache_buster: String,
    pub headers: Vec<(String, String)>,
}

impl PageRequest {
    /// Request for `path` with the SPA headers and a timestamp cache buster
    pub fn for_path(path: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self::with_cache_buster(path, millis.to_string())
    }

    pub fn with_cache_buster(path: &str, cache_buster: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            cache_buster: cache_buster.into(),
            headers: vec![
                ("X-Requested-With".into(), "XMLHttpRequest".into()),
                ("Accept".into(), "text/html, application/xhtml+xml".into()),
                ("X-SPA-Request".into(), "true".into()),
            ],
        }
    }

    /// Path plus cache-busting query, fragment dropped
    pub fn target(&self) -> String {
        let path = match self.path.find('#') {
            Some(i) => &self.path[..i],
            None => self.path.as_str(),
        };
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{}{}{}={}", path, separator, CACHE_BUST_PARAM, self.cache_buster)
    }

    /// Get header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response as delivered by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            status_text: "OK".into(),
            body: body.into(),
        }
    }

    /// Check if response is successful
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body for a 2xx response, a status error otherwise
    pub fn into_markup(self) -> Result<String, FetchError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(FetchError::Status {
                status: self.status,
                status_text: self.status_text,
            })
        }
    }
}
