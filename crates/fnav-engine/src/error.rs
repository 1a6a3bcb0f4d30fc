//! Navigation errors

use std::fmt;

use fnav_net::FetchError;
use serde::Serialize;

/// Category of a fatal navigation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "OfflineError")]
    Offline,
    #[serde(rename = "NetworkError")]
    Network,
    ContainerMissing,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Offline => "OfflineError",
            ErrorKind::Network => "NetworkError",
            ErrorKind::ContainerMissing => "ContainerMissing",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure that ends an in-page navigation attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("Offline: cannot fetch {path}")]
    Offline { path: String },

    #[error("Network error for {path}: {error}")]
    Network {
        path: String,
        #[source]
        error: FetchError,
    },

    #[error("Content region {selector} missing for {path}")]
    ContainerMissing { path: String, selector: String },
}

impl NavigationError {
    /// Classify a fetch failure for `path`
    pub fn from_fetch(path: &str, error: FetchError) -> Self {
        match error {
            FetchError::Offline { .. } => NavigationError::Offline { path: path.to_string() },
            error => NavigationError::Network { path: path.to_string(), error },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NavigationError::Offline { .. } => ErrorKind::Offline,
            NavigationError::Network { .. } => ErrorKind::Network,
            NavigationError::ContainerMissing { .. } => ErrorKind::ContainerMissing,
        }
    }

    /// Step that failed
    pub fn action(&self) -> &'static str {
        match self {
            NavigationError::Offline { .. } | NavigationError::Network { .. } => "fetch",
            NavigationError::ContainerMissing { .. } => "render",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            NavigationError::Offline { path }
            | NavigationError::Network { path, .. }
            | NavigationError::ContainerMissing { path, .. } => path,
        }
    }

    /// HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            NavigationError::Network { error, .. } => error.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_classification() {
        let offline = NavigationError::from_fetch("/a", FetchError::Offline { path: "/a".into() });
        assert_eq!(offline.kind(), ErrorKind::Offline);

        let status = NavigationError::from_fetch(
            "/a",
            FetchError::Status { status: 502, status_text: "Bad Gateway".into() },
        );
        assert_eq!(status.kind(), ErrorKind::Network);
        assert_eq!(status.status(), Some(502));
        assert_eq!(status.action(), "fetch");
    }

    #[test]
    fn test_container_missing() {
        let err = NavigationError::ContainerMissing {
            path: "/x".into(),
            selector: "#spa-content".into(),
        };
        assert_eq!(err.kind().to_string(), "ContainerMissing");
        assert_eq!(err.action(), "render");
        assert_eq!(err.to_string(), "Content region #spa-content missing for /x");
    }
}
