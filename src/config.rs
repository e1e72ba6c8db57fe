//! Client configuration.
//!
//! A [`ClientConfig`] is built explicitly and handed to
//! [`Client::new`](crate::client::Client::new); nothing is read from global
//! state after construction.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation::validate_result;

/// Default PagerDuty REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.pagerduty.com";

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "PAGERDUTY_TOKEN";

/// Token variable used by older acceptance-test setups.
pub const LEGACY_TOKEN_ENV: &str = "Token";

/// Environment variable overriding the API base URL.
pub const API_URL_ENV: &str = "PAGERDUTY_API_URL";

/// Environment variable holding the `From` header email.
pub const FROM_ENV: &str = "PAGERDUTY_FROM";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the PagerDuty API.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    /// REST API token.
    pub token: String,
    /// Email sent in the `From` header, required by some account setups.
    pub from: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a configuration with the given token and defaults for everything else.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
            from: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: format!("pagerduty-provider/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the `From` header email.
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] when no token is set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from the host's provider configuration block.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Validation`] when the block does not match
    /// [`provider_config_schema`], or [`ProviderError::Configuration`] when the
    /// token is blank.
    pub fn from_value(config: &Value) -> Result<Self> {
        validate_result(&provider_config_schema(), config).map_err(diagnostics_error)?;

        let field = |name: &str| {
            config
                .get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let token = field("token")
            .ok_or_else(|| ProviderError::Configuration("token must not be blank".to_string()))?;
        let mut cfg = Self::new(token);
        if let Some(url) = field("api_url") {
            cfg = cfg.with_base_url(url);
        }
        if let Some(from) = field("from") {
            cfg = cfg.with_from(from);
        }
        Ok(cfg)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let token = non_blank(TOKEN_ENV)
            .or_else(|| non_blank(LEGACY_TOKEN_ENV))
            .ok_or_else(|| {
                ProviderError::Configuration(format!("{TOKEN_ENV} is not set"))
            })?;

        let mut cfg = Self::new(token);
        if let Some(url) = non_blank(API_URL_ENV) {
            cfg = cfg.with_base_url(url);
        }
        if let Some(from) = non_blank(FROM_ENV) {
            cfg = cfg.with_from(from);
        }
        Ok(cfg)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("from", &self.from)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Schema of the provider configuration block.
pub fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "token",
            Attribute::required_string()
                .sensitive()
                .with_description("PagerDuty REST API token"),
        )
        .with_attribute(
            "api_url",
            Attribute::optional_string().with_description("API base URL"),
        )
        .with_attribute(
            "from",
            Attribute::optional_string().with_description("Email sent in the From header"),
        )
}

pub(crate) fn diagnostics_error(diagnostics: Vec<Diagnostic>) -> ProviderError {
    let summary = diagnostics
        .iter()
        .map(|d| match &d.attribute {
            Some(attr) => format!("{} (at {})", d.summary, attr),
            None => d.summary.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ");
    ProviderError::Validation(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = ClientConfig::new("secret");
        assert_eq!(cfg.base_url, DEFAULT_API_URL);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert!(cfg.from.is_none());
        assert!(cfg.user_agent.starts_with("pagerduty-provider/"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let cfg = ClientConfig::new("secret").with_base_url("http://localhost:8080/");
        assert_eq!(cfg.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_debug_redacts_token() {
        let cfg = ClientConfig::new("super-secret-token");
        let debug = format!("{:?}", cfg);
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_from_lookup_reads_all_variables() {
        let cfg = ClientConfig::from_lookup(lookup(&[
            (TOKEN_ENV, "abc"),
            (API_URL_ENV, "https://api.eu.pagerduty.com"),
            (FROM_ENV, "ops@example.com"),
        ]))
        .unwrap();

        assert_eq!(cfg.token, "abc");
        assert_eq!(cfg.base_url, "https://api.eu.pagerduty.com");
        assert_eq!(cfg.from.as_deref(), Some("ops@example.com"));
    }

    #[test]
    fn test_from_lookup_falls_back_to_legacy_token() {
        let cfg = ClientConfig::from_lookup(lookup(&[(LEGACY_TOKEN_ENV, "legacy")])).unwrap();
        assert_eq!(cfg.token, "legacy");
    }

    #[test]
    fn test_from_lookup_missing_token() {
        let err = ClientConfig::from_lookup(lookup(&[(TOKEN_ENV, "  ")])).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_from_value() {
        let cfg = ClientConfig::from_value(&json!({
            "token": "abc",
            "api_url": "http://127.0.0.1:9000/",
            "from": "ops@example.com"
        }))
        .unwrap();

        assert_eq!(cfg.token, "abc");
        assert_eq!(cfg.base_url, "http://127.0.0.1:9000");
        assert_eq!(cfg.from.as_deref(), Some("ops@example.com"));
    }

    #[test]
    fn test_from_value_rejects_missing_token() {
        let err = ClientConfig::from_value(&json!({"api_url": "http://x"})).unwrap_err();
        match err {
            ProviderError::Validation(msg) => assert!(msg.contains("token"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_value_rejects_blank_token() {
        let err = ClientConfig::from_value(&json!({"token": " "})).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
