//! Client configuration.
//!
//! # Design
//! `Config` is a plain value passed into constructors. There is no global
//! default instance; `Config::default()` and `Config::from_env()` are the two
//! ways to get one without spelling out every field.

use std::time::Duration;

use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "https://api.moondream.ai/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub const ACCESS_TOKEN_ENV: &str = "MOONDREAM_ACCESS_TOKEN";
pub const BASE_URL_ENV: &str = "MOONDREAM_BASE_URL";
pub const REQUEST_TIMEOUT_ENV: &str = "MOONDREAM_REQUEST_TIMEOUT";

/// Connection settings shared read-only by every call a client makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    base_url: String,
    access_token: Option<String>,
    request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    pub fn new(base_url: &str) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Defaults overridden by `MOONDREAM_*` environment variables.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let mut config = Self::default();
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            config = config.with_base_url(&url);
        }
        if let Some(token) = lookup(ACCESS_TOKEN_ENV).filter(|v| !v.is_empty()) {
            config = config.with_access_token(token);
        }
        if let Some(raw) = lookup(REQUEST_TIMEOUT_ENV).filter(|v| !v.is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ApiError::Configuration(format!("{REQUEST_TIMEOUT_ENV} must be whole seconds, got {raw:?}"))
            })?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Absolute URL for an API path such as `/caption`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert!(config.access_token().is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let config = Config::new("http://localhost:3000/");
        assert_eq!(config.url("/caption"), "http://localhost:3000/caption");
    }

    #[test]
    fn env_overrides_defaults() {
        let config = Config::from_lookup(lookup(&[
            (ACCESS_TOKEN_ENV, "secret"),
            (BASE_URL_ENV, "http://127.0.0.1:9000/v1/"),
            (REQUEST_TIMEOUT_ENV, "5"),
        ]))
        .unwrap();
        assert_eq!(config.access_token(), Some("secret"));
        assert_eq!(config.base_url(), "http://127.0.0.1:9000/v1");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let config = Config::from_lookup(lookup(&[(ACCESS_TOKEN_ENV, "")])).unwrap();
        assert!(config.access_token().is_none());
    }

    #[test]
    fn bad_timeout_is_a_configuration_error() {
        let err = Config::from_lookup(lookup(&[(REQUEST_TIMEOUT_ENV, "soon")])).unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }
}
