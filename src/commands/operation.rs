use std::sync::Arc;

use async_trait::async_trait;

use crate::api::Operation;
use crate::commands::DENIED_MESSAGE;
use crate::directory::User;
use crate::dispatch::{CommandHandler, Trigger};
use crate::error::Result;
use crate::fleet::SandboxFleetService;
use crate::messaging::MessagingSink;

/// Runs one lifecycle operation across every sandbox the caller administers,
/// as a fire-and-forget bulk fan-out. One instance is registered per
/// operation name.
pub struct OperationCommand {
    roles: Vec<String>,
    operation: Operation,
    fleet: Arc<SandboxFleetService>,
    messenger: Arc<dyn MessagingSink>,
}

impl OperationCommand {
    pub fn new(
        operation: Operation,
        fleet: Arc<SandboxFleetService>,
        messenger: Arc<dyn MessagingSink>,
    ) -> Self {
        Self {
            roles: vec!["admin".to_string()],
            operation,
            fleet,
            messenger,
        }
    }
}

#[async_trait]
impl CommandHandler for OperationCommand {
    fn applicable_roles(&self) -> &[String] {
        &self.roles
    }

    async fn process(&self, trigger: &Trigger, caller: &User) -> Result<()> {
        let sandbox_ids: Vec<String> = self
            .fleet
            .used_sandboxes_by_admin(&caller.id)
            .into_iter()
            .map(|sandbox| sandbox.id)
            .collect();

        let text = if sandbox_ids.is_empty() {
            format!("{}, you administer no sandboxes", caller.first_name)
        } else {
            self.fleet.execute_operation_bulk(self.operation, &sandbox_ids)
        };

        self.messenger.send_message(&trigger.context, &text).await?;
        Ok(())
    }

    async fn fail(&self, trigger: &Trigger, _caller: &User) -> Result<()> {
        self.messenger
            .send_message(&trigger.context, DENIED_MESSAGE)
            .await?;
        Ok(())
    }
}
