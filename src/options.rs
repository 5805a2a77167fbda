use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::retry::RetryState;

/// Default delay before the first retry, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
/// Default number of attempts per request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Configures retry behavior shared by every request of a client.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Delay before the first retry in milliseconds.
    pub retry_delay_ms: u64,
    /// Total attempts allowed per request. `0` retries until success.
    pub max_attempts: u32,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryOptions {
    /// Reads retry defaults from the environment.
    ///
    /// Reads:
    /// - `RETRYING_HTTP_RETRY_DELAY_MS`
    /// - `RETRYING_HTTP_MAX_ATTEMPTS`
    ///
    /// Unset variables keep their defaults; values that do not parse are an
    /// error.
    pub fn from_env() -> Result<Self, String> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = Self::default();
        Ok(Self {
            retry_delay_ms: parse_var(&var, "RETRYING_HTTP_RETRY_DELAY_MS")?
                .unwrap_or(defaults.retry_delay_ms),
            max_attempts: parse_var(&var, "RETRYING_HTTP_MAX_ATTEMPTS")?
                .unwrap_or(defaults.max_attempts),
        })
    }

    /// Builds the starting state for one request.
    ///
    /// A zero delay override counts as unset. A zero attempt override is
    /// kept and means unbounded.
    pub(crate) fn initial_state(
        &self,
        retry_delay_ms: Option<u64>,
        max_attempts: Option<u32>,
    ) -> RetryState {
        let retry_delay_ms = retry_delay_ms
            .filter(|delay| *delay != 0)
            .unwrap_or(self.retry_delay_ms);
        let max_attempts = max_attempts.unwrap_or(self.max_attempts);
        RetryState::new(retry_delay_ms, max_attempts)
    }
}

/// Base options merged into every request sent by
/// [`crate::ReqwestTransport`].
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Prefix for relative request URLs.
    pub base_url: Option<String>,
    /// Headers sent with every request unless the request sets them itself.
    pub default_headers: Vec<(String, String)>,
    /// Bearer token for the `Authorization` header.
    pub bearer_token: Option<String>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Value for the `User-Agent` header. `reqwest` sends none when unset.
    pub user_agent: Option<String>,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "<redacted>"),
            )
            .field("timeout_ms", &self.timeout_ms)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl TransportConfig {
    /// Sets the prefix joined onto relative request URLs.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Sends `Authorization: Bearer <token>`. The prefix is added if missing.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Bounds each attempt. A timed-out attempt counts as a failure and is
    /// retried.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Reads transport options from the environment.
    ///
    /// Reads:
    /// - `RETRYING_HTTP_BASE_URL`
    /// - `RETRYING_HTTP_TOKEN` (Bearer prefix optional)
    /// - `RETRYING_HTTP_TIMEOUT_MS`
    pub fn from_env() -> Result<Self, String> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let non_empty = |key: &str| var(key).filter(|value| !value.trim().is_empty());
        Ok(Self {
            base_url: non_empty("RETRYING_HTTP_BASE_URL"),
            bearer_token: non_empty("RETRYING_HTTP_TOKEN"),
            timeout_ms: parse_var(&var, "RETRYING_HTTP_TIMEOUT_MS")?,
            ..Self::default()
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match var(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| format!("{key} must be a non-negative integer: {err}")),
        _ => Ok(None),
    }
}
