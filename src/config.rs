//! Activator configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::time::Duration;

use thiserror::Error;

use crate::domain::WaitPolicy;

/// Errors raised while loading [`ActivatorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `DEFAULT_DOMAIN` is not usable as an object-name domain.
    #[error("invalid DEFAULT_DOMAIN {0:?}: must be non-empty and free of '=', ',', ':'")]
    InvalidDomain(String),
}

/// Top-level activator configuration.
///
/// Loaded once at startup via [`ActivatorConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatorConfig {
    /// Milliseconds a losing thread waits for the winner (0 = forever).
    pub resolve_wait_timeout_ms: u64,

    /// Domain reported by the underlying registry.
    pub default_domain: String,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Worker threads the demo binary spawns.
    pub demo_worker_threads: usize,

    /// Pending beans the demo binary declares.
    pub demo_bean_count: usize,
}

impl Default for ActivatorConfig {
    fn default() -> Self {
        Self {
            resolve_wait_timeout_ms: 30_000,
            default_domain: "DefaultDomain".to_string(),
            event_bus_capacity: 1024,
            demo_worker_threads: 8,
            demo_bean_count: 16,
        }
    }
}

impl ActivatorConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or does not
    /// parse. Calls `dotenvy::dotenv().ok()` to optionally load a `.env`
    /// file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDomain`] if `DEFAULT_DOMAIN` is set
    /// to something that cannot prefix an object name.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ActivatorConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let default_domain = lookup("DEFAULT_DOMAIN").unwrap_or(defaults.default_domain);
        if default_domain.is_empty() || default_domain.contains(['=', ',', ':']) {
            return Err(ConfigError::InvalidDomain(default_domain));
        }

        Ok(Self {
            resolve_wait_timeout_ms: parse_var(
                &lookup,
                "RESOLVE_WAIT_TIMEOUT_MS",
                defaults.resolve_wait_timeout_ms,
            ),
            default_domain,
            event_bus_capacity: parse_var(&lookup, "EVENT_BUS_CAPACITY", defaults.event_bus_capacity),
            demo_worker_threads: parse_var(
                &lookup,
                "DEMO_WORKER_THREADS",
                defaults.demo_worker_threads,
            ),
            demo_bean_count: parse_var(&lookup, "DEMO_BEAN_COUNT", defaults.demo_bean_count),
        })
    }

    /// Wait policy for threads that lose an activation race.
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        match self.resolve_wait_timeout_ms {
            0 => WaitPolicy::Indefinite,
            ms => WaitPolicy::Bounded(Duration::from_millis(ms)),
        }
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|raw| raw.trim().parse()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            tracing::warn!(key, "ignoring unparsable configuration value");
            default
        }
        None => default,
    }
}
