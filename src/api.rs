//! Wire layer for the sandbox admin backend.
//!
//! Thin wrappers around [`ApiClient`] mirroring the admin API:
//! status and lifecycle operations, the fleet list (including soft-deleted
//! entries), per-sandbox usage, and creation with a fixed resource profile
//! and access-control grants. Envelope interpretation lives here too:
//! success is `{code, status: "Success", data}`, failure is
//! `{error: {message}}` with the message preserved verbatim.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::FleetConfig;
use crate::error::{FleetError, Result};
use crate::http::ApiClient;

/// Lifecycle operations accepted by the admin backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    Restart,
    Reset,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Restart => "restart",
            Operation::Reset => "reset",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = FleetError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "start" => Ok(Operation::Start),
            "stop" => Ok(Operation::Stop),
            "restart" => Ok(Operation::Restart),
            "reset" => Ok(Operation::Reset),
            other => Err(FleetError::Validation(format!(
                "Unknown operation '{other}'"
            ))),
        }
    }
}

/// Immutable sandbox snapshot as returned by the admin backend.
///
/// Fetched per query, never cached. Fields are optional because the list
/// endpoint returns partial records for sandboxes mid-provisioning.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sandbox {
    pub id: Option<String>,
    pub realm: Option<String>,
    pub instance: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub eol: Option<DateTime<Utc>>,
    pub state: Option<String>,
    pub links: Option<SandboxLinks>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SandboxLinks {
    /// Business manager URL of the sandbox.
    pub bm: Option<String>,
}

impl Sandbox {
    /// `"{realm}-{instance}"`, the human-facing sandbox name.
    pub fn name(&self) -> String {
        format!(
            "{}-{}",
            self.realm.as_deref().unwrap_or_default(),
            self.instance.as_deref().unwrap_or_default()
        )
    }

    /// `"{realm}-{instance}/{createdBy}"`, the dedup label used by the
    /// usage aggregation.
    pub fn owner_label(&self) -> String {
        format!("{}/{}", self.name(), self.created_by.as_deref().unwrap_or_default())
    }
}

/// Client for the sandbox admin backend.
pub struct SandboxAdminApi {
    client: ApiClient,
    technical_client_id: String,
    realm: String,
    resource_profile: String,
}

impl SandboxAdminApi {
    pub fn new(client: ApiClient, config: &FleetConfig) -> Self {
        Self {
            client,
            technical_client_id: config.technical_client_id.clone(),
            realm: config.realm.clone(),
            resource_profile: config.resource_profile.clone(),
        }
    }

    /// Current state of one sandbox.
    pub async fn get_status(&self, sandbox_id: &str) -> Result<Value> {
        self.client
            .call(Method::GET, &format!("sandboxes/{sandbox_id}/"), None)
            .await
    }

    /// Run one lifecycle operation on one sandbox.
    pub async fn execute_operation(&self, operation: Operation, sandbox_id: &str) -> Result<Value> {
        self.client
            .call(
                Method::POST,
                &format!("sandboxes/{sandbox_id}/operations"),
                Some(json!({ "operation": operation.as_str() })),
            )
            .await
    }

    /// Full fleet list, soft-deleted entries included.
    pub async fn list_sandboxes(&self) -> Result<Vec<Sandbox>> {
        let response = self
            .client
            .call(Method::GET, "sandboxes?include_deleted=true", None)
            .await?;
        let data = response.get("data").cloned().unwrap_or(Value::Array(vec![]));
        serde_json::from_value(data)
            .map_err(|err| FleetError::Transport(format!("Invalid sandbox list: {err}")))
    }

    /// Up/down minutes for one sandbox over a date window (inclusive days).
    pub async fn get_usage(&self, sandbox_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Value> {
        self.client
            .call(
                Method::GET,
                &format!("sandboxes/{sandbox_id}/usage?from={from}&to={to}"),
                None,
            )
            .await
    }

    /// Create a sandbox with the fixed resource profile and access grants:
    /// full REST method access plus read/write on the two deployment
    /// directories, scoped to the configured technical client.
    pub async fn create_sandbox(&self, end_of_life_days: u32) -> Result<Value> {
        let body = json!({
            "realm": self.realm,
            "ttl": end_of_life_days,
            "autoScheduled": false,
            "resourceProfile": self.resource_profile,
            "settings": {
                "ocapi": [
                    {
                        "client_id": self.technical_client_id,
                        "resources": [
                            {
                                "resource_id": "/**",
                                "methods": ["get", "post", "put", "patch", "delete"],
                                "read_attributes": "(**)",
                                "write_attributes": ""
                            }
                        ]
                    }
                ],
                "webdav": [
                    {
                        "client_id": self.technical_client_id,
                        "permissions": [
                            { "path": "/cartridges", "operations": ["read_write"] },
                            { "path": "/impex", "operations": ["read_write"] }
                        ]
                    }
                ]
            }
        });

        self.client.call(Method::POST, "sandboxes", Some(body)).await
    }
}

/// Unwrap a `{code, status, data}` envelope, expecting `expected_code`.
///
/// A `{error: {message}}` envelope becomes [`FleetError::Backend`] with the
/// backend's message untouched; anything else malformed is a transport error.
pub fn expect_success(response: &Value, expected_code: i64) -> Result<Value> {
    if let Some(message) = response
        .get("error")
        .and_then(|err| err.get("message"))
        .and_then(Value::as_str)
    {
        let code = response.get("code").and_then(Value::as_i64).unwrap_or(0);
        return Err(FleetError::Backend {
            code,
            message: message.to_string(),
        });
    }

    let code = response.get("code").and_then(Value::as_i64);
    let status = response.get("status").and_then(Value::as_str);
    let data = response.get("data");

    match (code, status, data) {
        (Some(code), Some("Success"), Some(data)) if code == expected_code => Ok(data.clone()),
        _ => Err(FleetError::Transport(format!(
            "Unexpected backend envelope: {response}"
        ))),
    }
}
