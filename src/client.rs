//! PagerDuty user API client.
//!
//! [`UserApi`] is the seam the reconciler depends on: four CRUD calls plus the
//! [`is_retry`](UserApi::is_retry) classifier. [`Client`] implements it over
//! HTTP with reqwest; each call performs exactly one request and maps HTTP
//! failures onto [`ProviderError`] variants by status code.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, FROM};
use reqwest::{RequestBuilder, StatusCode, Url};
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{ProviderError, Result};
use crate::types::{ApiErrorBody, User, UserEnvelope};

const PAGERDUTY_ACCEPT: &str = "application/vnd.pagerduty+json;version=2";

/// CRUD operations for PagerDuty users.
#[async_trait]
pub trait UserApi: Send + Sync {
    /// Create a user and return the remote representation (with id).
    async fn create_user(&self, user: &User) -> Result<User>;

    /// Fetch a user by id. Returns [`ProviderError::NotFound`] when the id is unknown.
    async fn get_user(&self, id: &str) -> Result<User>;

    /// Replace the writable fields of an existing user.
    async fn update_user(&self, user: &User, id: &str) -> Result<User>;

    /// Delete a user.
    async fn delete_user(&self, id: &str) -> Result<()>;

    /// Whether `err` is transient and the call may be retried.
    fn is_retry(&self, err: &ProviderError) -> bool {
        err.is_retryable()
    }
}

/// reqwest-backed [`UserApi`].
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
}

impl Client {
    /// Build a client from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] when the base URL or a header
    /// value is invalid, or [`ProviderError::Transport`] when the reqwest
    /// client cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            ProviderError::Configuration(format!("invalid API URL '{}': {}", config.base_url, err))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::Configuration(format!(
                "API URL '{}' cannot be used as a base",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        let mut auth = header_value(&format!("Token token={}", config.token))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(PAGERDUTY_ACCEPT));
        if let Some(from) = &config.from {
            headers.insert(FROM, header_value(from)?);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    fn users_url(&self, id: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ProviderError::Configuration("API URL cannot be used as a base".to_string())
            })?;
            segments.pop_if_empty().push("users");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        debug!(status = status.as_u16(), "PagerDuty responded");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.map_err(map_transport_error)?;
        Err(map_status_error(status, body.as_ref()))
    }

    async fn execute_user(&self, request: RequestBuilder) -> Result<User> {
        let response = self.execute(request).await?;
        let body = response.bytes().await.map_err(map_transport_error)?;
        let envelope: UserEnvelope = serde_json::from_slice(&body)?;
        Ok(envelope.user)
    }
}

#[async_trait]
impl UserApi for Client {
    #[instrument(skip(self, user), name = "pagerduty.create_user")]
    async fn create_user(&self, user: &User) -> Result<User> {
        let url = self.users_url(None)?;
        let body = UserEnvelope::from(writable(user));
        self.execute_user(self.http.post(url).json(&body)).await
    }

    #[instrument(skip(self), name = "pagerduty.get_user")]
    async fn get_user(&self, id: &str) -> Result<User> {
        let url = self.users_url(Some(id))?;
        self.execute_user(self.http.get(url)).await
    }

    #[instrument(skip(self, user), name = "pagerduty.update_user")]
    async fn update_user(&self, user: &User, id: &str) -> Result<User> {
        let url = self.users_url(Some(id))?;
        let body = UserEnvelope::from(writable(user));
        self.execute_user(self.http.put(url).json(&body)).await
    }

    #[instrument(skip(self), name = "pagerduty.delete_user")]
    async fn delete_user(&self, id: &str) -> Result<()> {
        let url = self.users_url(Some(id))?;
        self.execute(self.http.delete(url)).await?;
        Ok(())
    }
}

// The id travels in the path, never in the body.
fn writable(user: &User) -> User {
    User {
        id: None,
        contact_methods: Vec::new(),
        ..user.clone()
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        ProviderError::Configuration("header value contains invalid characters".to_string())
    })
}

fn map_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::DeadlineExceeded(error.to_string())
    } else if error.is_connect() {
        ProviderError::Unavailable(error.to_string())
    } else {
        ProviderError::Transport(error)
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> ProviderError {
    let detail = serde_json::from_slice::<ApiErrorBody>(body)
        .map(|parsed| parsed.error.describe())
        .ok()
        .filter(|described| !described.is_empty())
        .unwrap_or_else(|| body_preview(body));
    let message = if detail.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), detail)
    };

    match status {
        StatusCode::NOT_FOUND => ProviderError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::PermissionDenied(message)
        },
        StatusCode::CONFLICT => ProviderError::AlreadyExists(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::ResourceExhausted(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ProviderError::DeadlineExceeded(message)
        },
        _ if status.is_server_error() => ProviderError::Unavailable(message),
        _ => ProviderError::InvalidRequest(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
