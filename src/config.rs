use crate::error::{ClientError, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub stash_url: String,
    pub stash_login: String,
    pub stash_password: String,
    pub timeout_ms: u64,
    pub accept_any_ssl: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let stash_url = env::var("STASH_URL")
            .map_err(|_| ClientError::Config("STASH_URL environment variable not set".to_string()))?;

        let stash_login = env::var("STASH_LOGIN").map_err(|_| {
            ClientError::Config("STASH_LOGIN environment variable not set".to_string())
        })?;

        let stash_password = env::var("STASH_PASSWORD").map_err(|_| {
            ClientError::Config("STASH_PASSWORD environment variable not set".to_string())
        })?;

        let timeout_ms = env::var("STASH_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000);

        let accept_any_ssl = env::var("STASH_ACCEPT_ANY_SSL")
            .ok()
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            stash_url,
            stash_login,
            stash_password,
            timeout_ms,
            accept_any_ssl,
        })
    }
}

/// Login and password sent as HTTP basic auth on every call.
#[derive(Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub credentials: Credentials,
    pub timeout: Duration,
    pub verify_tls: bool,
}

impl From<&Config> for ClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.stash_url.clone(),
            credentials: Credentials::new(&config.stash_login, &config.stash_password),
            timeout: Duration::from_millis(config.timeout_ms),
            verify_tls: !config.accept_any_ssl,
        }
    }
}
