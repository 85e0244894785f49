//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the API.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the API service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApiConfig {
    /// Deployment environment; drives dev-only behavior.
    pub environment: Environment,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Per-client admission control.
    pub rate_limit: RateLimitConfig,

    /// Credential lifetimes per scope.
    pub tokens: TokenConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Development bootstrap admin login.
    pub admin: AdminConfig,

    /// Request hardening.
    pub security: SecurityConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Qa,
    Staging,
    Production,
}

impl Environment {
    /// Anything that is not staging or production counts as a dev environment.
    pub fn is_dev(self) -> bool {
        !matches!(self, Environment::Staging | Environment::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Qa => "qa",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };
        f.write_str(name)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting. Ignored (treated as off) in dev environments.
    pub enabled: bool,

    /// Sustained refill rate per client, in tokens per second.
    pub requests_per_second: f64,

    /// Burst capacity per client.
    pub burst_size: u32,

    /// How often the eviction sweep runs, in seconds.
    pub sweep_interval_secs: u64,

    /// Idle time after which a client entry is evicted, in seconds.
    pub idle_timeout_secs: u64,

    /// Take the client key from X-Forwarded-For / X-Real-IP when present.
    pub trust_forwarded_headers: bool,
}

impl RateLimitConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2.0,
            burst_size: 4,
            sweep_interval_secs: 60,
            idle_timeout_secs: 180,
            trust_forwarded_headers: false,
        }
    }
}

/// Credential lifetimes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Lifetime of account activation tokens, in seconds.
    pub activation_ttl_secs: u64,

    /// Lifetime of bearer authentication tokens, in seconds.
    pub authentication_ttl_secs: u64,
}

impl TokenConfig {
    pub fn activation_ttl(&self) -> Duration {
        Duration::from_secs(self.activation_ttl_secs)
    }

    pub fn authentication_ttl(&self) -> Duration {
        Duration::from_secs(self.authentication_ttl_secs)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            activation_ttl_secs: 3 * 24 * 60 * 60,
            authentication_ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Deadline for a single storage call, in milliseconds.
    pub store_call_ms: u64,
}

impl TimeoutConfig {
    pub fn store_call(&self) -> Duration {
        Duration::from_millis(self.store_call_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            store_call_ms: 3000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "json" or "pretty".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Bootstrap admin credentials, honored only in dev environments.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub email: String,

    #[serde(skip_serializing)]
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: "admin@hunt.local".to_string(),
            // WARNING: This is a placeholder! Change this outside local development.
            password: "CHANGE_ME_IN_DEVELOPMENT".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,

    /// bcrypt cost used when hashing new passwords.
    pub bcrypt_cost: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
            bcrypt_cost: 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_is_dev() {
        assert!(Environment::Development.is_dev());
        assert!(Environment::Qa.is_dev());
        assert!(!Environment::Staging.is_dev());
        assert!(!Environment::Production.is_dev());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ApiConfig = toml::from_str(
            r#"
            environment = "production"

            [rate_limit]
            burst_size = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.rate_limit.burst_size, 10);
        assert_eq!(config.rate_limit.requests_per_second, 2.0);
        assert_eq!(config.tokens.authentication_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.timeouts.store_call(), Duration::from_secs(3));
    }
}
