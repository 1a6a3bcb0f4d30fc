//! Navigator configuration
//!
//! Every field has a default, so `{}` is a valid configuration. Durations
//! are expressed in milliseconds.

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use fnav_admission::PolicyConfig;
use fnav_html::{Selector, SelectorError};
use fnav_net::{FetchConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache_capacity must be at least 1")]
    ZeroCapacity,

    #[error("Invalid {field}: {error}")]
    InvalidSelector {
        field: &'static str,
        #[source]
        error: SelectorError,
    },
}

/// Navigator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Maximum cached pages
    pub cache_capacity: usize,
    pub cache_ttl_ms: u64,
    /// Hover quiet time before prefetching
    pub prefetch_delay_ms: u64,
    /// Exit animation delay before the region is swapped
    pub animation_duration_ms: u64,
    pub fetch_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Region swapped on navigation
    pub content_selector: String,
    /// Elements whose activation may be intercepted
    pub link_selector: String,
    /// Attribute that opts a link out of interception
    pub opt_out_attribute: String,
    /// Give up waiting for module completion. Unbounded when absent.
    pub module_timeout_ms: Option<u64>,
    pub debug: bool,
    #[serde(flatten)]
    pub links: PolicyConfig,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 50,
            cache_ttl_ms: 5 * 60 * 1000,
            prefetch_delay_ms: 65,
            animation_duration_ms: 150,
            fetch_timeout_ms: 10_000,
            max_retries: 2,
            retry_base_delay_ms: 300,
            retry_max_delay_ms: 10_000,
            content_selector: "#spa-content".to_string(),
            link_selector: "a[href]".to_string(),
            opt_out_attribute: "data-no-spa".to_string(),
            module_timeout_ms: None,
            debug: false,
            links: PolicyConfig::default(),
        }
    }
}

impl NavigatorConfig {
    /// Parse from JSON, filling gaps with defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check values that would make the navigator unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capacity()?;
        self.content_region()?;
        self.navigable_items()?;
        Ok(())
    }

    pub fn capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.cache_capacity).ok_or(ConfigError::ZeroCapacity)
    }

    pub fn content_region(&self) -> Result<Selector, ConfigError> {
        Selector::parse(&self.content_selector)
            .map_err(|error| ConfigError::InvalidSelector { field: "content_selector", error })
    }

    pub fn navigable_items(&self) -> Result<Selector, ConfigError> {
        Selector::parse(&self.link_selector)
            .map_err(|error| ConfigError::InvalidSelector { field: "link_selector", error })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn prefetch_delay(&self) -> Duration {
        Duration::from_millis(self.prefetch_delay_ms)
    }

    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms)
    }

    pub fn module_timeout(&self) -> Option<Duration> {
        self.module_timeout_ms.map(Duration::from_millis)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_millis(self.fetch_timeout_ms),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
            },
        }
    }
}
