//! Read-mostly user directory consumed by the fleet service and dispatcher.
//!
//! The directory owns user records (roles, country, assigned sandbox). This
//! crate only reads them, except for the create flow which pushes one durable
//! assignment write through [`UserDirectory::assign_sandbox`].

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};

/// Sandbox assignment on a user record.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AssignedSandbox {
    pub name: String,
    pub id: String,
    pub country: String,
    #[serde(default)]
    pub admin_ids: BTreeSet<String>,
}

/// User record as stored by the directory.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub sandbox: Option<AssignedSandbox>,
}

impl User {
    /// Whether this user administers the given sandbox assignment.
    pub fn administers(&self, admin_id: &str) -> bool {
        self.sandbox
            .as_ref()
            .is_some_and(|sandbox| sandbox.admin_ids.contains(admin_id))
    }
}

/// Directory query and write contract.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    fn get_user(&self, id: &str) -> Option<User>;
    fn users(&self) -> Vec<User>;
    /// Every country known to the directory, for usage post-fill.
    fn all_countries(&self) -> BTreeSet<String>;
    /// Administrator id → country index used to group usage.
    fn admin_countries(&self) -> HashMap<String, String>;
    /// Durably record a sandbox assignment on a user. Create-if-absent is the
    /// caller's concern; an existing assignment keeps its admin-id set.
    async fn assign_sandbox(&self, user_id: &str, assignment: AssignedSandbox) -> Result<()>;
}

/// Directory backed by an in-memory map, optionally persisted to a JSON file
/// rewritten on every assignment write.
pub struct LocalUserDirectory {
    users: RwLock<HashMap<String, User>>,
    path: Option<PathBuf>,
}

impl LocalUserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().map(|u| (u.id.clone(), u)).collect()),
            path: None,
        }
    }

    /// Load user records from a JSON file; assignment writes rewrite it.
    pub fn open(path: PathBuf) -> Result<Self> {
        let raw = std::fs::read_to_string(&path)
            .map_err(|err| FleetError::Directory(format!("Failed to read {path:?}: {err}")))?;
        let users: Vec<User> = serde_json::from_str(&raw)
            .map_err(|err| FleetError::Directory(format!("Invalid user file {path:?}: {err}")))?;

        let mut directory = Self::new(users);
        directory.path = Some(path);
        Ok(directory)
    }

    fn snapshot(&self) -> Vec<User> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let serialized = serde_json::to_vec_pretty(&self.snapshot())
            .map_err(|err| FleetError::Directory(format!("Failed to serialize users: {err}")))?;
        tokio::fs::write(path, serialized)
            .await
            .map_err(|err| FleetError::Directory(format!("Failed to write {path:?}: {err}")))
    }
}

#[async_trait]
impl UserDirectory for LocalUserDirectory {
    fn get_user(&self, id: &str) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    fn users(&self) -> Vec<User> {
        self.snapshot()
    }

    fn all_countries(&self) -> BTreeSet<String> {
        self.users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|user| !user.country.is_empty())
            .map(|user| user.country.clone())
            .collect()
    }

    fn admin_countries(&self) -> HashMap<String, String> {
        self.users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|user| !user.country.is_empty())
            .map(|user| (user.id.clone(), user.country.clone()))
            .collect()
    }

    async fn assign_sandbox(&self, user_id: &str, assignment: AssignedSandbox) -> Result<()> {
        {
            let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
            let user = users
                .get_mut(user_id)
                .ok_or_else(|| FleetError::Directory(format!("Unknown user '{user_id}'")))?;

            match user.sandbox.as_mut() {
                Some(existing) => {
                    // Overwrite name/id/country, keep the admin-id set.
                    existing.name = assignment.name;
                    existing.id = assignment.id;
                    existing.country = assignment.country;
                }
                None => user.sandbox = Some(assignment),
            }
        }
        self.persist().await
    }
}
