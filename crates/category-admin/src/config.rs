//! Runtime configuration, from defaults overridden by `CATEGORY_ADMIN_*` environment variables.

use admin_runtime::http::RetryPolicy;
use admin_runtime::store::DEFAULT_STATE_KEY;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const ENV_API_URL: &str = "CATEGORY_ADMIN_API_URL";
pub const ENV_STATE_DIR: &str = "CATEGORY_ADMIN_STATE_DIR";
pub const ENV_MAX_ATTEMPTS: &str = "CATEGORY_ADMIN_MAX_ATTEMPTS";
pub const ENV_BASE_DELAY_MS: &str = "CATEGORY_ADMIN_BASE_DELAY_MS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "CATEGORY_ADMIN_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub api_url: String,
    /// Where state is persisted. `None` keeps it in memory for the session.
    pub state_dir: Option<PathBuf>,
    pub state_key: String,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub validation_debounce_ms: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".to_string(),
            state_dir: None,
            state_key: DEFAULT_STATE_KEY.to_string(),
            max_attempts: 3,
            base_delay_ms: 1000,
            request_timeout_secs: 30,
            validation_debounce_ms: 300,
        }
    }
}

impl AdminConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            config.api_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(dir) = lookup(ENV_STATE_DIR).filter(|d| !d.trim().is_empty()) {
            config.state_dir = Some(PathBuf::from(dir));
        }
        override_parsed(&lookup, ENV_MAX_ATTEMPTS, &mut config.max_attempts);
        override_parsed(&lookup, ENV_BASE_DELAY_MS, &mut config.base_delay_ms);
        override_parsed(&lookup, ENV_REQUEST_TIMEOUT_SECS, &mut config.request_timeout_secs);
        config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validation_debounce(&self) -> Duration {
        Duration::from_millis(self.validation_debounce_ms)
    }
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else { return };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => warn!(key, value = %raw, "Ignoring invalid configuration value"),
    }
}
