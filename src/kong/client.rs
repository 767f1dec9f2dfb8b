//! Kong admin API HTTP client.
//!
//! This module provides the reqwest-based [`Transport`] used against a real
//! gateway.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::ClientSettings;
use crate::error::{ApiError, ConfigError, Result};

use super::transport::{ApiRequest, ApiResponse, ResponseBody, Transport};

/// Credentials for HTTP basic auth.
#[derive(Debug, Clone)]
struct BasicAuth {
    user: String,
    password: String,
}

/// Kong admin API client.
#[derive(Debug, Clone)]
pub struct KongClient {
    /// HTTP client.
    client: Client,
    /// Admin API root, without a trailing slash.
    base_url: String,
    /// Per-request timeout.
    timeout: Duration,
    /// Extra time granted to the single retry after a read timeout.
    additional_time: Duration,
    /// Optional basic auth credentials.
    auth: Option<BasicAuth>,
}

impl KongClient {
    /// Creates a client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the server address is not a valid URL or the
    /// HTTP client cannot be created.
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let endpoint = settings.endpoint();
        url::Url::parse(&endpoint).map_err(|e| ConfigError::InvalidSetting {
            field: String::from("server"),
            message: format!("{endpoint}: {e}"),
        })?;

        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        let auth = settings.basic_auth().map(|(user, password)| BasicAuth {
            user: user.to_string(),
            password: password.to_string(),
        });

        debug!("Constructing admin API client for {endpoint}");

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(settings.timeout),
            additional_time: Duration::from_secs(settings.additional_time),
            auth,
        })
    }

    /// Returns the admin API root.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves a request path against the admin API root.
    ///
    /// Absolute URLs (older gateways return them as `next` cursors) are used
    /// unchanged.
    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Sends the request once and reads the whole body.
    async fn attempt(
        &self,
        request: &ApiRequest,
        timeout: Duration,
    ) -> std::result::Result<(u16, String), reqwest::Error> {
        let mut builder = self
            .client
            .request(request.method.into(), self.url_for(&request.path))
            .timeout(timeout);

        if let Some(auth) = &self.auth {
            builder = builder.basic_auth(&auth.user, Some(&auth.password));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok((status, text))
    }

    fn map_error(request: &ApiRequest, timeout: Duration, err: &reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout {
                method: request.method.to_string(),
                path: request.path.clone(),
                timeout_secs: timeout.as_secs(),
            }
        } else {
            ApiError::network(format!("{} {}: {err}", request.method, request.path))
        }
    }
}

#[async_trait]
impl Transport for KongClient {
    async fn send(&self, request: ApiRequest) -> std::result::Result<ApiResponse, ApiError> {
        debug!("Making {} call: {}", request.method, self.url_for(&request.path));
        if let Some(body) = &request.body {
            debug!("Payload: {body}");
        }

        let outcome = match self.attempt(&request, self.timeout).await {
            Err(err) if err.is_timeout() && !err.is_connect() => {
                let extended = self.timeout + self.additional_time;
                warn!(
                    "{} {} timed out, retrying with {}s",
                    request.method,
                    request.path,
                    extended.as_secs()
                );
                self.attempt(&request, extended)
                    .await
                    .map_err(|e| Self::map_error(&request, extended, &e))
            }
            other => other.map_err(|e| Self::map_error(&request, self.timeout, &e)),
        };

        let (status, text) = outcome?;
        let body = ResponseBody::decode(status, text);
        trace!("Received {status}: {body}");

        Ok(ApiResponse { status, body })
    }
}
