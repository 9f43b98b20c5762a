//! Session configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Base address of the production backend during development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

const ENV_BASE_URL: &str = "OYSTER_BASE_URL";
const ENV_PREFERENCES: &str = "OYSTER_PREFERENCES";
const ENV_TIMEOUT_SECS: &str = "OYSTER_TIMEOUT_SECS";

/// Configuration for a `SessionClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Base URL every relative API path is appended to.
    pub base_url: String,
    /// File backing the selected-card preference. `None` keeps it in memory.
    pub preferences_path: Option<PathBuf>,
    /// Whole-request timeout. `None` leaves the HTTP client's default.
    pub timeout: Option<Duration>,
}

impl SessionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            preferences_path: None,
            timeout: None,
        }
    }

    /// Read `OYSTER_BASE_URL`, `OYSTER_PREFERENCES` and `OYSTER_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config =
            Self::new(lookup(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()));
        config.preferences_path = lookup(ENV_PREFERENCES)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.parse::<u64>() {
                Ok(secs) => config.timeout = Some(Duration::from_secs(secs)),
                Err(e) => tracing::warn!("Ignoring {ENV_TIMEOUT_SECS}={raw:?}: {e}"),
            }
        }
        config
    }

    /// Persist the selected card in a JSON file at `path`.
    pub fn with_preferences_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.preferences_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
