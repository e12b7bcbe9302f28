//! Process configuration, read once from the environment at start-up.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/";
const DEFAULT_PAYMENT_API_URL: &str = "http://localhost:3000";
const DEFAULT_CURRENCY: &str = "AUD";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FALLBACK_DELAY_MS: u64 = 1500;
const DEFAULT_SUCCESS_DELAY_MS: u64 = 2000;

/// Directory name appended to the platform data dir when `POS_DATA_DIR` is unset.
const APP_DIR_NAME: &str = "counter-pos";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Base URL of the order-recording backend (`/api/orders`, `/api/checkin/`).
    pub backend_url: String,
    /// Base URL of the payment proxy that fronts the card gateway.
    pub payment_api_url: String,
    pub currency: String,
    /// Holds `counter.db` and the `logs/` directory.
    pub data_dir: PathBuf,
    pub http_timeout: Duration,
    pub fallback_payment_delay: Duration,
    pub success_display_delay: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            payment_api_url: DEFAULT_PAYMENT_API_URL.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            data_dir: default_data_dir(&|key| std::env::var(key).ok()),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            fallback_payment_delay: Duration::from_millis(DEFAULT_FALLBACK_DELAY_MS),
            success_display_delay: Duration::from_millis(DEFAULT_SUCCESS_DELAY_MS),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Blank values fall
    /// back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(v) = get("BACKEND_URL") {
            config.backend_url = v;
        }
        if let Some(v) = get("PAYMENT_API_URL") {
            config.payment_api_url = v;
        }
        if let Some(v) = get("PAYMENT_CURRENCY") {
            config.currency = v.to_ascii_uppercase();
        }
        config.data_dir = match get("POS_DATA_DIR") {
            Some(v) => PathBuf::from(v),
            None => default_data_dir(&lookup),
        };
        if let Some(v) = get("HTTP_TIMEOUT_SECS") {
            let secs = parse_u64("HTTP_TIMEOUT_SECS", &v)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "HTTP_TIMEOUT_SECS",
                    value: v,
                });
            }
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = get("FALLBACK_PAYMENT_DELAY_MS") {
            config.fallback_payment_delay =
                Duration::from_millis(parse_u64("FALLBACK_PAYMENT_DELAY_MS", &v)?);
        }
        if let Some(v) = get("SUCCESS_DISPLAY_DELAY_MS") {
            config.success_display_delay =
                Duration::from_millis(parse_u64("SUCCESS_DISPLAY_DELAY_MS", &v)?);
        }
        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("counter.db")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

/// Where the counter keeps its data when `POS_DATA_DIR` is unset:
/// `%LOCALAPPDATA%` or `$XDG_DATA_HOME` if either is set, otherwise the
/// per-user data folder under the home directory.
fn default_data_dir(lookup: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    ["LOCALAPPDATA", "XDG_DATA_HOME"]
        .iter()
        .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
        .map(PathBuf::from)
        .unwrap_or_else(|| user_data_home(lookup))
        .join(APP_DIR_NAME)
}

#[cfg(target_os = "windows")]
fn user_data_home(lookup: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    let home = lookup("USERPROFILE").unwrap_or_else(|| ".".into());
    PathBuf::from(home).join("AppData").join("Local")
}

#[cfg(not(target_os = "windows"))]
fn user_data_home(lookup: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    let home = lookup("HOME").unwrap_or_else(|| ".".into());
    PathBuf::from(home).join(".local").join("share")
}
