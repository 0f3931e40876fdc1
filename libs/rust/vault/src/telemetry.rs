//! Tracing subscriber setup for binaries embedding the lease manager.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{VaultError, VaultResult};

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub log_level: String,
    /// Whether to output JSON format
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: "info,vault_lease_manager=debug".to_string(),
            json_output: false,
        }
    }
}

impl TracingConfig {
    /// Set the fallback filter directive.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    fn filter(&self) -> VaultResult<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.log_level).map_err(|e| {
                VaultError::invalid_config(format!("invalid log filter {}: {e}", self.log_level))
            }),
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns [`VaultError::InvalidConfig`] for an unparsable filter or when a
/// global subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> VaultResult<()> {
    let filter = config.filter()?;

    let result = if config.json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    result.map_err(|e| VaultError::invalid_config(format!("tracing already initialized: {e}")))
}
