//! Configuration management for scene-mesh.
//!
//! Configuration required to stand up the core (§6): recompute interval,
//! per-cycle timeout, ranking-flag initial value. Loaded from environment
//! variables in the same `env_value`/`env_bool`/`env_u64` style the wider
//! platform's services use, so collaborators sharing a deployment can
//! override via the same environment file.

use std::env;
use std::time::Duration;

/// Coarse deployment environment. Carried on `Config` regardless of which
/// features are enabled — every service in this platform stamps this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl Default for AppEnvironment {
    fn default() -> Self {
        Self::Development
    }
}

/// Configuration for the recompute engine and ranking flag.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_environment: AppEnvironment,

    /// Interval between periodic recompute ticks (default 30s, §4.7).
    pub recompute_interval: Duration,
    /// Per-cycle deadline for draining the dirty set (default 30s, §4.7).
    pub recompute_timeout: Duration,

    /// Initial value of the process-wide ranking flag (safe default: false).
    pub ranking_flag_default: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_environment: AppEnvironment::default(),
            recompute_interval: Duration::from_secs(30),
            recompute_timeout: Duration::from_secs(30),
            ranking_flag_default: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_value("SCENE_APP_ENVIRONMENT") {
            config.app_environment = match v.to_lowercase().as_str() {
                "production" | "prod" => AppEnvironment::Production,
                _ => AppEnvironment::Development,
            };
        }

        config.recompute_interval = Duration::from_secs(env_u64(
            "SCENE_RECOMPUTE_INTERVAL_SECS",
            config.recompute_interval.as_secs(),
        ));
        config.recompute_timeout = Duration::from_secs(env_u64(
            "SCENE_RECOMPUTE_TIMEOUT_SECS",
            config.recompute_timeout.as_secs(),
        ));
        config.ranking_flag_default =
            env_bool("SCENE_RANKING_FLAG_DEFAULT", config.ranking_flag_default);

        config
    }
}

#[cfg(test)]
thread_local! {
    static TEST_ENV_OVERRIDES: std::cell::RefCell<std::collections::HashMap<String, String>> =
        std::cell::RefCell::new(std::collections::HashMap::new());
}

#[cfg(test)]
fn test_env_override_value(key: &str) -> Option<String> {
    TEST_ENV_OVERRIDES.with(|cell| cell.borrow().get(key).cloned())
}

fn env_value(key: &str) -> Option<String> {
    #[cfg(test)]
    if let Some(v) = test_env_override_value(key) {
        return Some(v);
    }
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    env_value(key).map_or(default, |v| match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    })
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_value(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
