//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config and environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` overrides the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Environment, ObservabilityConfig};

/// Build the default filter directive for the configured level.
pub fn default_directive(config: &ObservabilityConfig, environment: Environment) -> String {
    let level = if environment == Environment::Development {
        "debug"
    } else {
        config.log_level.as_str()
    };
    format!("hunt_api={level},tower_http={level}")
}

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(config: &ObservabilityConfig, environment: Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(config, environment).into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.log_format == "pretty" {
        registry.with(tracing_subscriber::fmt::layer().pretty()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_forces_debug() {
        let config = ObservabilityConfig::default();
        assert_eq!(
            default_directive(&config, Environment::Development),
            "hunt_api=debug,tower_http=debug"
        );
        assert_eq!(
            default_directive(&config, Environment::Production),
            "hunt_api=info,tower_http=info"
        );
    }
}
