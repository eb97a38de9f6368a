//! Authenticated JSON request issuer shared by both backends.
//!
//! An [`ApiClient`] owns its [`TokenCache`] and base URL; every call resolves
//! a token first and injects it as a bearer header. JSON bodies are returned
//! even on non-2xx status so callers can interpret the backend's own
//! `{code, status, data}` / `{error}` envelope.

use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Url};
use serde_json::Value;

use crate::DEFAULT_TIMEOUT_SECS;
use crate::auth::TokenCache;
use crate::error::{FleetError, Result};

static HTTP_CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared HTTP client; built once with the default timeout. Per-request
/// timeouts narrow it further.
pub fn http_client() -> Result<&'static Client> {
    HTTP_CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|err| FleetError::Transport(format!("Failed to build HTTP client: {err}")))
    })
}

pub fn build_url(base: &str, path: &str) -> Result<Url> {
    let base_url = Url::parse(base)
        .map_err(|err| FleetError::Transport(format!("Invalid base URL: {err}")))?;
    base_url
        .join(path)
        .map_err(|err| FleetError::Transport(format!("Invalid path '{path}': {err}")))
}

pub fn bearer_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| FleetError::Auth("Invalid auth token".into()))?;
    headers.insert(AUTHORIZATION, value);

    Ok(headers)
}

/// Request issuer bound to one backend. Two independent instances exist, one
/// per backend, each with its own token cache; they never share token state.
pub struct ApiClient {
    base_url: String,
    tokens: TokenCache,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, tokens: TokenCache, timeout: Duration) -> Self {
        Self {
            base_url: base_url.to_string(),
            tokens,
            timeout,
        }
    }

    /// Issue a request against a path relative to the backend's base URL.
    pub async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = build_url(&self.base_url, path)?;
        self.call_url(method, url, body).await
    }

    /// Issue a request against an absolute URL (the bot messaging backend
    /// posts to per-conversation service URLs rather than a fixed base).
    pub async fn call_url(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value> {
        let token = self.tokens.token().await?;
        let headers = bearer_headers(&token)?;

        let mut request = http_client()?
            .request(method, url)
            .headers(headers)
            .timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| FleetError::Transport(format!("HTTP request failed: {err}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| FleetError::Transport(format!("Failed to read response body: {err}")))?;

        serde_json::from_str(&text)
            .map_err(|_| FleetError::Transport(format!("HTTP {status}: {text}")))
    }
}
