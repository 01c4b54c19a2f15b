//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, TurnstileError};
use crate::http::{ClientKeyExtractor, DEFAULT_CLIENT_KEY_HEADERS};
use crate::ratelimit::{LimiterConfig, ReclaimerConfig};

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Requests allowed per client per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Seconds between reclaimer sweeps
    #[serde(default = "default_reclaim_interval")]
    pub reclaim_interval_secs: u64,

    /// Idle seconds after which a client's counter is evicted
    #[serde(default = "default_staleness_horizon")]
    pub staleness_horizon_secs: u64,

    /// Headers consulted for the client key, highest priority first
    #[serde(default = "default_client_key_headers")]
    pub client_key_headers: Vec<String>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            reclaim_interval_secs: default_reclaim_interval(),
            staleness_horizon_secs: default_staleness_horizon(),
            client_key_headers: default_client_key_headers(),
        }
    }
}

fn default_max_requests() -> u64 {
    10
}

fn default_window_secs() -> u64 {
    10
}

fn default_reclaim_interval() -> u64 {
    60
}

fn default_staleness_horizon() -> u64 {
    3600
}

fn default_client_key_headers() -> Vec<String> {
    DEFAULT_CLIENT_KEY_HEADERS.iter().map(|h| h.to_string()).collect()
}

impl RateLimitingConfig {
    /// Build the validated limiter settings.
    pub fn limiter_config(&self) -> Result<LimiterConfig> {
        LimiterConfig::new(self.max_requests, Duration::from_secs(self.window_secs))
    }

    /// Build the validated reclaimer settings.
    ///
    /// The staleness horizon may not be shorter than the window, otherwise a
    /// live counter could be evicted and its client handed a fresh quota.
    pub fn reclaimer_config(&self) -> Result<ReclaimerConfig> {
        if self.staleness_horizon_secs < self.window_secs {
            return Err(TurnstileError::Config(format!(
                "staleness_horizon_secs ({}) must not be shorter than window_secs ({})",
                self.staleness_horizon_secs, self.window_secs
            )));
        }
        ReclaimerConfig::new(
            Duration::from_secs(self.reclaim_interval_secs),
            Duration::from_secs(self.staleness_horizon_secs),
        )
    }

    /// Build the client key extractor.
    pub fn client_key_extractor(&self) -> Result<ClientKeyExtractor> {
        ClientKeyExtractor::new(&self.client_key_headers)
    }
}

impl TurnstileConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML document.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| TurnstileError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TurnstileConfig::default();

        assert_eq!(config.server.http_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.rate_limiting.max_requests, 10);
        assert_eq!(config.rate_limiting.window_secs, 10);
        assert_eq!(config.rate_limiting.reclaim_interval_secs, 60);
        assert_eq!(config.rate_limiting.staleness_horizon_secs, 3600);
        assert_eq!(
            config.rate_limiting.client_key_headers,
            vec!["cf-connecting-ip", "x-forwarded-for", "x-real-ip"]
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
rate_limiting:
  max_requests: 100
  window_secs: 60
"#;
        let config = TurnstileConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.rate_limiting.max_requests, 100);
        assert_eq!(config.rate_limiting.window_secs, 60);
        assert_eq!(config.rate_limiting.staleness_horizon_secs, 3600);
        assert_eq!(config.server.http_addr, default_http_addr());

        let limiter = config.rate_limiting.limiter_config().unwrap();
        assert_eq!(limiter.max_requests(), 100);
        assert_eq!(limiter.window(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = TurnstileConfig::from_yaml("server: [").unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = RateLimitingConfig {
            max_requests: 0,
            ..RateLimitingConfig::default()
        };
        assert!(config.limiter_config().is_err());
    }

    #[test]
    fn test_horizon_shorter_than_window_rejected() {
        let config = RateLimitingConfig {
            window_secs: 120,
            staleness_horizon_secs: 60,
            ..RateLimitingConfig::default()
        };
        assert!(config.reclaimer_config().is_err());
    }

    #[test]
    fn test_overflowing_reclaim_interval_rejected() {
        let config = RateLimitingConfig {
            reclaim_interval_secs: u64::MAX,
            ..RateLimitingConfig::default()
        };
        let err = config.reclaimer_config().unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = TurnstileConfig::from_file("/nonexistent/turnstile.yaml").unwrap_err();
        assert!(matches!(err, TurnstileError::Io(_)));
    }
}
