//! Explicit configuration passed into each component's constructor.
//!
//! Nothing here is a global: `FleetConfig::from_env()` is a convenience for
//! binaries, and every component takes the piece of config it needs by value.

use std::env;
use std::time::Duration;

use crate::DEFAULT_TIMEOUT_SECS;

/// Credentials and endpoints for one backend (sandbox admin or bot messaging).
///
/// `base_url` must end with a trailing slash so relative paths join cleanly.
#[derive(Clone, Debug)]
pub struct ApiCredentials {
    pub token_url: String,
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ApiCredentials {
    pub fn new(token_url: &str, base_url: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            token_url: token_url.to_string(),
            base_url: base_url.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scope: None,
            username: None,
            password: None,
        }
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }
}

/// Top-level configuration for the fleet library.
#[derive(Clone, Debug)]
pub struct FleetConfig {
    /// Sandbox admin backend.
    pub admin: ApiCredentials,
    /// Bot messaging backend.
    pub bot: ApiCredentials,
    /// Technical client granted OCAPI/WebDAV access on created sandboxes.
    pub technical_client_id: String,
    /// Realm new sandboxes are created in.
    pub realm: String,
    /// Resource profile for new sandboxes.
    pub resource_profile: String,
    /// Domain used to resolve `<nickname>@<domain>` in the create command.
    pub email_domain: String,
    /// Request timeout for all backend calls.
    pub timeout: Duration,
}

impl FleetConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let admin = ApiCredentials {
            token_url: env_or("SBX_ADMIN_TOKEN_URL", ""),
            base_url: env_or("SBX_ADMIN_BASE_URL", ""),
            client_id: env_or("SBX_ADMIN_CLIENT_ID", ""),
            client_secret: env_or("SBX_ADMIN_CLIENT_SECRET", ""),
            scope: env::var("SBX_ADMIN_SCOPE").ok(),
            username: env::var("SBX_ADMIN_USERNAME").ok(),
            password: env::var("SBX_ADMIN_PASSWORD").ok(),
        };
        let bot = ApiCredentials {
            token_url: env_or("BOT_TOKEN_URL", ""),
            base_url: env_or("BOT_BASE_URL", ""),
            client_id: env_or("BOT_CLIENT_ID", ""),
            client_secret: env_or("BOT_CLIENT_SECRET", ""),
            scope: env::var("BOT_SCOPE").ok(),
            username: None,
            password: None,
        };
        let timeout = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        FleetConfig {
            admin,
            bot,
            technical_client_id: env_or("SBX_TECHNICAL_CLIENT_ID", ""),
            realm: env_or("SBX_REALM", ""),
            resource_profile: env_or("SBX_RESOURCE_PROFILE", "medium"),
            email_domain: env_or("SBX_EMAIL_DOMAIN", ""),
            timeout: Duration::from_secs(timeout),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
