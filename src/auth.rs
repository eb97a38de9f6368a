//! Client-credentials token cache shared by the outbound API clients.
//!
//! Each backend owns one [`TokenCache`]; token state is never shared between
//! backends. A cached token is usable while `now < expires_at - skew` with a
//! 3-second skew; past that the cache performs the credential exchange again
//! and replaces value and expiry together under one lock.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::ApiCredentials;
use crate::error::{FleetError, Result};
use crate::http::http_client;

/// Seconds before expiry at which a token is treated as already expired.
pub const RENEWAL_SKEW_SECS: u64 = 3;

/// Successful credential-exchange payload.
#[derive(Clone, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

/// Pluggable credential exchange. One implementation per auth server.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self) -> Result<TokenResponse>;
}

/// OAuth2 client-credentials exchange against a token endpoint.
pub struct ClientCredentialsExchange {
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: Option<String>,
}

impl ClientCredentialsExchange {
    pub fn new(credentials: &ApiCredentials) -> Self {
        Self {
            token_url: credentials.token_url.clone(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            scope: credentials.scope.clone(),
        }
    }
}

#[derive(Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

#[async_trait]
impl CredentialExchange for ClientCredentialsExchange {
    async fn exchange(&self) -> Result<TokenResponse> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        if let Some(scope) = self.scope.as_deref() {
            form.push(("scope", scope));
        }

        let response = http_client()?
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|err| FleetError::Auth(format!("Credential exchange failed: {err}")))?;
        let raw: RawTokenResponse = response
            .json()
            .await
            .map_err(|err| FleetError::Auth(format!("Invalid token response: {err}")))?;

        let access_token = raw
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| FleetError::Auth("Token response missing access_token".into()))?;
        let expires_in = raw
            .expires_in
            .ok_or_else(|| FleetError::Auth("Token response missing expires_in".into()))?;

        Ok(TokenResponse {
            access_token,
            expires_in,
        })
    }
}

struct CachedToken {
    value: String,
    expires_at: u64,
}

/// Bearer-token cache with transparent renewal on expiry.
pub struct TokenCache {
    exchange: Box<dyn CredentialExchange>,
    state: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(exchange: Box<dyn CredentialExchange>) -> Self {
        Self {
            exchange,
            state: Mutex::new(None),
        }
    }

    /// Return a usable token, renewing it first if the cached one expired.
    ///
    /// The lock is held across the exchange, so concurrent callers observing
    /// an expired token share a single in-flight renewal. A failed exchange
    /// caches nothing; the next call retries transparently.
    pub async fn token(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        if let Some(cached) = state.as_ref() {
            if now_ts() + RENEWAL_SKEW_SECS < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let response = self.exchange.exchange().await?;
        let token = CachedToken {
            value: response.access_token.clone(),
            expires_at: now_ts() + response.expires_in,
        };
        *state = Some(token);
        Ok(response.access_token)
    }
}

/// Current unix timestamp in seconds.
pub fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingExchange {
        calls: AtomicU64,
        expires_in: u64,
    }

    #[async_trait]
    impl CredentialExchange for CountingExchange {
        async fn exchange(&self) -> Result<TokenResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TokenResponse {
                access_token: format!("token-{n}"),
                expires_in: self.expires_in,
            })
        }
    }

    fn cache(expires_in: u64) -> TokenCache {
        TokenCache::new(Box::new(CountingExchange {
            calls: AtomicU64::new(0),
            expires_in,
        }))
    }

    #[tokio::test]
    async fn fresh_token_is_reused() {
        let cache = cache(10);
        assert_eq!(cache.token().await.unwrap(), "token-1");
        assert_eq!(cache.token().await.unwrap(), "token-1");
    }

    #[tokio::test]
    async fn token_within_skew_is_renewed() {
        let cache = cache(2);
        assert_eq!(cache.token().await.unwrap(), "token-1");
        assert_eq!(cache.token().await.unwrap(), "token-2");
    }

    struct FailingExchange;

    #[async_trait]
    impl CredentialExchange for FailingExchange {
        async fn exchange(&self) -> Result<TokenResponse> {
            Err(FleetError::Auth("exchange down".into()))
        }
    }

    #[tokio::test]
    async fn failed_exchange_is_not_cached() {
        let cache = TokenCache::new(Box::new(FailingExchange));
        assert!(cache.token().await.is_err());
        assert!(cache.token().await.is_err());
    }
}
