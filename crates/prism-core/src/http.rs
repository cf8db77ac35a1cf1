//! JSON-over-HTTP client shared by the snapshot and conversation APIs.
//!
//! Wraps a single `reqwest::Client` (connection pool, timeout, user agent)
//! with the API base URL and optional bearer token, and maps every failure
//! into a [`FetchError`].

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::FetchError;

const USER_AGENT: &str = concat!("prism/", env!("CARGO_PKG_VERSION"));

/// HTTP client bound to one API base URL.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Build a client for `base_url` with the given per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path (`/api/...`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let request = self.authorize(self.client.get(&url));
        Self::decode(request.send().await).await
    }

    /// `POST path` with a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, FetchError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "POST");
        let request = self.authorize(self.client.post(&url).json(body));
        Self::decode(request.send().await).await
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn decode<T: DeserializeOwned>(
        sent: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, FetchError> {
        let response = sent.map_err(|e| FetchError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16(), body));
        }
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
