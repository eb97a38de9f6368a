//! Fleet operations for on-demand cloud sandboxes.
//!
//! Library consumed by a thin chat-transport layer:
//! - [`auth`]: client-credentials token cache with transparent renewal
//! - [`http`]: authenticated JSON request issuer, one per backend
//! - [`api`]: sandbox admin wire layer and envelope handling
//! - [`fleet`]: lifecycle ops, bulk fan-out, usage aggregation
//! - [`dispatch`]: role-gated command/invoke dispatcher
//! - [`directory`] / [`messaging`]: collaborator contracts

pub mod api;
pub mod auth;
pub mod commands;
pub mod config;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod fleet;
pub mod http;
pub mod messaging;

pub use api::{Operation, Sandbox, SandboxAdminApi};
pub use auth::{ClientCredentialsExchange, CredentialExchange, TokenCache};
pub use config::{ApiCredentials, FleetConfig};
pub use directory::{AssignedSandbox, LocalUserDirectory, User, UserDirectory};
pub use dispatch::{CommandHandler, Dispatch, Dispatcher, ROLE_ANY, Trigger};
pub use error::{FleetError, Result};
pub use fleet::{CountryUsage, OTHER_COUNTRY, SandboxFleetService, UsageRecord};
pub use http::ApiClient;
pub use messaging::{BotMessenger, MessageContext, MessagingSink};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
