use async_trait::async_trait;

use crate::directory::User;
use crate::dispatch::{CommandHandler, ROLE_ANY, Trigger};
use crate::error::Result;

/// No-op handler substituted for unresolved triggers. Open to everyone and
/// silent both ways, so an unknown command never surfaces an error.
pub struct FallbackCommand {
    roles: Vec<String>,
}

impl FallbackCommand {
    pub fn new() -> Self {
        Self {
            roles: vec![ROLE_ANY.to_string()],
        }
    }
}

impl Default for FallbackCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandHandler for FallbackCommand {
    fn applicable_roles(&self) -> &[String] {
        &self.roles
    }

    async fn process(&self, _trigger: &Trigger, _caller: &User) -> Result<()> {
        Ok(())
    }

    async fn fail(&self, _trigger: &Trigger, _caller: &User) -> Result<()> {
        Ok(())
    }
}
