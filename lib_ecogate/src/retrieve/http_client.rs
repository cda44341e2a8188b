//! # HTTP API Client
//!
//! Asynchronous JSON client around `reqwest` with `reqwest-middleware`
//! exponential-backoff retries. Construction validates the base URL instead
//! of panicking, and every request is bounded by the configured timeout.

use std::time::Duration;

use reqwest::{
    header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE},
    Method, Url,
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response body: {0}")]
    Decode(String),

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<reqwest_middleware::Error> for RetrieveError {
    fn from(e: reqwest_middleware::Error) -> Self {
        match e {
            reqwest_middleware::Error::Reqwest(inner) if inner.is_timeout() => RetrieveError::Timeout,
            reqwest_middleware::Error::Reqwest(inner) => RetrieveError::Transport(inner.to_string()),
            reqwest_middleware::Error::Middleware(inner) => RetrieveError::Transport(inner.to_string()),
        }
    }
}

/// Deserialized body plus the transaction metadata.
#[derive(Debug)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    /// Raw body returned with a non-2xx status.
    pub error_body: Option<String>,
    pub status: u16,
    pub success: bool,
    pub headers: HeaderMap,
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 2,
        }
    }
}

pub struct ApiClient {
    inner: ClientWithMiddleware,
    base_url: Url,
    auth_token: Option<String>,
}

impl ApiClient {
    /// `base_url` must be absolute. A trailing slash is added so relative
    /// paths join under it rather than replacing its last segment.
    pub fn new(base_url: &str, auth_token: Option<String>, settings: &ClientSettings) -> Result<Self, RetrieveError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let url = Url::parse(&normalized)?;

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(RetrieveError::Build)?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(settings.max_retries);
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner: client,
            base_url: url,
            auth_token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends a request and decodes a JSON body on success. Non-2xx statuses are
    /// returned as `ApiResponse { success: false, .. }`, not as errors.
    pub async fn request<T, B, Q>(
        &self,
        method: Method,
        path: &str,
        query: Option<&Q>,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, RetrieveError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
        Q: Serialize + ?Sized,
    {
        let full_url = self.base_url.join(path.trim_start_matches('/'))?;
        let mut req = self.inner.request(method, full_url);

        if let Some(q) = query {
            req = req.query(q);
        }
        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(b) = body {
            let json_body = serde_json::to_string(b)?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        let response = req.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        if status.is_success() {
            let data = response.json::<T>().await.map_err(|e| {
                if e.is_timeout() {
                    RetrieveError::Timeout
                } else {
                    RetrieveError::Decode(e.to_string())
                }
            })?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers,
            })
        } else {
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
                headers,
            })
        }
    }

    pub async fn get_json<T, Q>(&self, path: &str, query: &Q) -> Result<ApiResponse<T>, RetrieveError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.request::<T, (), Q>(Method::GET, path, Some(query), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_base_url_is_rejected() {
        assert!(matches!(
            ApiClient::new("not a url", None, &ClientSettings::default()),
            Err(RetrieveError::InvalidUrl(_))
        ));
    }

    #[test]
    fn paths_join_under_base() {
        let client = ApiClient::new("https://api.example.com/data/2.5", None, &ClientSettings::default()).unwrap();
        let joined = client.base_url().join("weather").unwrap();
        assert_eq!(joined.as_str(), "https://api.example.com/data/2.5/weather");
    }
}
