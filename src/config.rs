use crate::api::DEFAULT_API_BASE;
use crate::bootstrap::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LOG_FILTER: &str = "council=info";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a positive number of milliseconds, got {value:?}")]
    InvalidDuration { key: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_base: String,
    pub retry: RetryPolicy,
    /// Overrides the platform data directory for the selection store.
    pub state_dir: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            retry: RetryPolicy::default(),
            state_dir: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Reads `COUNCIL_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let retry = RetryPolicy {
            period: millis(&lookup, "COUNCIL_RETRY_PERIOD_MS")?.unwrap_or(defaults.retry.period),
            budget: millis(&lookup, "COUNCIL_RETRY_BUDGET_MS")?.unwrap_or(defaults.retry.budget),
        };

        Ok(Self {
            api_base: non_empty("COUNCIL_API_BASE").unwrap_or(defaults.api_base),
            retry,
            state_dir: non_empty("COUNCIL_STATE_DIR").map(PathBuf::from),
            log_filter: non_empty("COUNCIL_LOG").unwrap_or(defaults.log_filter),
        })
    }
}

fn millis<F>(lookup: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Some(Duration::from_millis(ms))),
        _ => Err(ConfigError::InvalidDuration { key, value: raw }),
    }
}
