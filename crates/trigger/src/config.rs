//! Process configuration.
//!
//! [`UploaderConfig`] is built once at start-up and passed by reference to
//! the components that need it. Every required value is validated eagerly and
//! all problems are reported together in one [`ConfigError`].

use std::fmt;
use std::time::Duration;

use crate::{ConfigError, DispatchSettings};

pub const AIRFLOW_WEBSERVER: &str = "AIRFLOW_WEBSERVER";
pub const AIRFLOW_USER: &str = "AIRFLOW_USER";
pub const AIRFLOW_PASSWORD: &str = "AIRFLOW_PASSWORD";
pub const LOGS_URL: &str = "LOGS_URL";
pub const STORAGE_EMULATOR_HOST: &str = "STORAGE_EMULATOR_HOST";
pub const STORAGE_TIMEOUT_SECS: &str = "STORAGE_TIMEOUT_SECS";
pub const DISPATCH_TIMEOUT_SECS: &str = "DISPATCH_TIMEOUT_SECS";

/// Request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A credential that never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value. Callers must not log it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

/// Connection settings for the orchestration service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AirflowConfig {
    /// Webserver base URL, without the `/api/v1/...` path.
    pub webserver: String,
    pub user: String,
    pub password: Secret,
    pub timeout: Duration,
}

/// Connection settings for the storage service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Base URL of a storage emulator. When set, requests go there without
    /// credentials.
    pub emulator_host: Option<String>,
    pub timeout: Duration,
}

/// Everything the uploader reads from its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploaderConfig {
    pub airflow: AirflowConfig,
    pub storage: StorageConfig,
    pub dispatch: DispatchSettings,
}

impl UploaderConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] listing every missing or invalid variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`. Empty values count as absent.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] listing every missing or invalid variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut problems = ConfigError {
            missing: Vec::new(),
            invalid: Vec::new(),
        };

        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut required = |key: &'static str| {
            let value = get(key);
            if value.is_none() {
                problems.missing.push(key);
            }
            value
        };

        let webserver = required(AIRFLOW_WEBSERVER);
        let user = required(AIRFLOW_USER);
        let password = required(AIRFLOW_PASSWORD);
        let logs_url = required(LOGS_URL);

        let storage_timeout =
            parse_timeout(get(STORAGE_TIMEOUT_SECS), STORAGE_TIMEOUT_SECS, &mut problems);
        let dispatch_timeout =
            parse_timeout(get(DISPATCH_TIMEOUT_SECS), DISPATCH_TIMEOUT_SECS, &mut problems);
        let emulator_host = get(STORAGE_EMULATOR_HOST);

        match (webserver, user, password, logs_url) {
            (Some(webserver), Some(user), Some(password), Some(logs_url))
                if problems.is_empty() =>
            {
                Ok(Self {
                    airflow: AirflowConfig {
                        webserver,
                        user,
                        password: Secret::new(password),
                        timeout: dispatch_timeout,
                    },
                    storage: StorageConfig {
                        emulator_host,
                        timeout: storage_timeout,
                    },
                    dispatch: DispatchSettings { logs_url },
                })
            }
            _ => Err(problems),
        }
    }
}

fn parse_timeout(raw: Option<String>, key: &'static str, problems: &mut ConfigError) -> Duration {
    let Some(raw) = raw else {
        return DEFAULT_TIMEOUT;
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            problems.invalid.push((
                key,
                format!("expected a positive number of seconds, got '{raw}'"),
            ));
            DEFAULT_TIMEOUT
        }
    }
}
