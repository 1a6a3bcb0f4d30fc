//! Navigation metrics

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::{ErrorKind, NavigationError};

/// Number of error records kept
pub const RECENT_ERRORS: usize = 50;

/// One fatal navigation error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub path: String,
    pub action: &'static str,
    /// Unix time in milliseconds
    pub timestamp_ms: u64,
}

impl ErrorRecord {
    pub fn new(error: &NavigationError) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            kind: error.kind(),
            message: error.to_string(),
            path: error.path().to_string(),
            action: error.action(),
            timestamp_ms,
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    /// Completed in-page navigations
    pub navigations: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub prefetches: u64,
    pub errors: u64,
    pub total_load_time_ms: f64,
    pub average_load_time_ms: f64,
    /// Oldest first
    pub recent_errors: VecDeque<ErrorRecord>,
}

impl Metrics {
    pub(crate) fn record_navigation(&mut self, load_time: Duration) {
        self.navigations += 1;
        self.total_load_time_ms += load_time.as_secs_f64() * 1000.0;
        self.average_load_time_ms = self.total_load_time_ms / self.navigations as f64;
    }

    pub(crate) fn record_error(&mut self, error: &NavigationError) {
        self.errors += 1;
        if self.recent_errors.len() == RECENT_ERRORS {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(ErrorRecord::new(error));
    }

    /// Share of lookups answered from the cache
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(path: &str) -> NavigationError {
        NavigationError::ContainerMissing { path: path.into(), selector: "#spa-content".into() }
    }

    #[test]
    fn test_average_from_running_sum() {
        let mut m = Metrics::default();
        m.record_navigation(Duration::from_millis(100));
        m.record_navigation(Duration::from_millis(300));

        assert_eq!(m.navigations, 2);
        assert!((m.total_load_time_ms - 400.0).abs() < 1e-6);
        assert!((m.average_load_time_ms - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_recent_errors_bounded() {
        let mut m = Metrics::default();
        for i in 0..(RECENT_ERRORS + 5) {
            m.record_error(&missing(&format!("/p{}", i)));
        }

        assert_eq!(m.errors, (RECENT_ERRORS + 5) as u64);
        assert_eq!(m.recent_errors.len(), RECENT_ERRORS);
        assert_eq!(m.recent_errors.front().unwrap().path, "/p5");
    }

    #[test]
    fn test_json_shape() {
        let mut m = Metrics::default();
        m.record_error(&missing("/x"));
        let json = m.to_json().unwrap();

        assert!(json.contains("\"kind\": \"ContainerMissing\""));
        assert!(json.contains("\"action\": \"render\""));
    }

    #[test]
    fn test_hit_rate() {
        let m = Metrics { cache_hits: 3, cache_misses: 1, ..Default::default() };
        assert!((m.hit_rate() - 0.75).abs() < 1e-9);
        assert_eq!(Metrics::default().hit_rate(), 0.0);
    }
}
