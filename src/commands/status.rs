use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::expect_success;
use crate::commands::DENIED_MESSAGE;
use crate::directory::User;
use crate::dispatch::{CommandHandler, Trigger};
use crate::error::Result;
use crate::fleet::SandboxFleetService;
use crate::messaging::MessagingSink;

/// Reports the state of the caller's assigned sandbox.
pub struct StatusCommand {
    roles: Vec<String>,
    fleet: Arc<SandboxFleetService>,
    messenger: Arc<dyn MessagingSink>,
}

impl StatusCommand {
    pub fn new(fleet: Arc<SandboxFleetService>, messenger: Arc<dyn MessagingSink>) -> Self {
        Self {
            roles: vec!["user".to_string(), "admin".to_string()],
            fleet,
            messenger,
        }
    }
}

#[async_trait]
impl CommandHandler for StatusCommand {
    fn applicable_roles(&self) -> &[String] {
        &self.roles
    }

    async fn process(&self, trigger: &Trigger, caller: &User) -> Result<()> {
        let Some(sandbox) = caller.sandbox.as_ref() else {
            self.messenger
                .send_message(
                    &trigger.context,
                    &format!("{}, you have no sandbox assigned", caller.first_name),
                )
                .await?;
            return Ok(());
        };

        let text = match self.fleet.get_status(&sandbox.id).await {
            Ok(response) => {
                let state = expect_success(&response, 200)
                    .ok()
                    .as_ref()
                    .and_then(|data| data.get("state"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                format!("Sandbox {} is {state}", sandbox.name)
            }
            Err(err) => {
                tracing::error!("status for sandbox {} failed: {err}", sandbox.id);
                format!(
                    "{}, operation was not executed. Please, contact admin.",
                    caller.first_name
                )
            }
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
