use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::commands::DENIED_MESSAGE;
use crate::directory::{AssignedSandbox, User, UserDirectory};
use crate::dispatch::{CommandHandler, Trigger};
use crate::error::Result;
use crate::fleet::SandboxFleetService;
use crate::messaging::MessagingSink;

/// `sbxcreate <nickname> <days> <CC>`: creates a sandbox and assigns it to
/// the user resolved from `<nickname>@<email_domain>`.
///
/// The directory assignment must be durable before the command is
/// acknowledged, so the write happens between the create call and the reply.
pub struct CreateCommand {
    roles: Vec<String>,
    fleet: Arc<SandboxFleetService>,
    directory: Arc<dyn UserDirectory>,
    messenger: Arc<dyn MessagingSink>,
    email_domain: String,
}

#[derive(Debug, PartialEq)]
pub(crate) struct CreateParams {
    pub nickname: String,
    pub end_of_life_days: u32,
    pub country: String,
}

/// `<nickname> <days> <CC>` with an integer day count and a two-letter
/// uppercase country code.
pub(crate) fn parse_create_params(args: &[&str]) -> Option<CreateParams> {
    let [nickname, days, country] = args else {
        return None;
    };
    let end_of_life_days = days.parse::<u32>().ok()?;
    if country.len() != 2 || !country.chars().all(|ch| ch.is_ascii_uppercase()) {
        return None;
    }

    Some(CreateParams {
        nickname: nickname.to_lowercase(),
        end_of_life_days,
        country: country.to_string(),
    })
}

impl CreateCommand {
    pub fn new(
        fleet: Arc<SandboxFleetService>,
        directory: Arc<dyn UserDirectory>,
        messenger: Arc<dyn MessagingSink>,
        email_domain: &str,
    ) -> Self {
        Self {
            roles: vec!["admin".to_string()],
            fleet,
            directory,
            messenger,
            email_domain: email_domain.to_string(),
        }
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        self.directory
            .users()
            .into_iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
    }
}

#[async_trait]
impl CommandHandler for CreateCommand {
    fn applicable_roles(&self) -> &[String] {
        &self.roles
    }

    async fn process(&self, trigger: &Trigger, caller: &User) -> Result<()> {
        let Some(params) = parse_create_params(&trigger.args()) else {
            self.messenger
                .send_message(
                    &trigger.context,
                    &format!("{}, you entered incorrect params", caller.first_name),
                )
                .await?;
            return Ok(());
        };

        let email = format!("{}@{}", params.nickname, self.email_domain);
        let Some(target) = self.find_by_email(&email) else {
            self.messenger
                .send_message(
                    &trigger.context,
                    &format!(
                        "{}, the user with the email {email} does not exist.",
                        caller.first_name
                    ),
                )
                .await?;
            return Ok(());
        };

        let text = match self.fleet.create_sandbox(params.end_of_life_days).await {
            Ok(sandbox) => {
                let assignment = AssignedSandbox {
                    name: sandbox.name(),
                    id: sandbox.id.clone().unwrap_or_default(),
                    country: params.country.clone(),
                    admin_ids: BTreeSet::new(),
                };
                self.directory.assign_sandbox(&target.id, assignment).await?;

                let bm_link = sandbox
                    .links
                    .as_ref()
                    .and_then(|links| links.bm.as_deref())
                    .unwrap_or_default();
                let end_of_life = sandbox
                    .eol
                    .map(|eol| eol.date_naive().to_string())
                    .unwrap_or_default();
                format!("Sandbox was created \n\n {bm_link} \n\n End of life: {end_of_life}")
            }
            Err(err) => {
                error!("sandbox create failed: {err}");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_params_parse() {
        let params = parse_create_params(&["JDoe", "30", "FR"]).unwrap();
        assert_eq!(
            params,
            CreateParams {
                nickname: "jdoe".into(),
                end_of_life_days: 30,
                country: "FR".into(),
            }
        );
    }

    #[test]
    fn malformed_params_are_rejected() {
        assert!(parse_create_params(&[]).is_none());
        assert!(parse_create_params(&["jdoe", "30"]).is_none());
        assert!(parse_create_params(&["jdoe", "soon", "FR"]).is_none());
        assert!(parse_create_params(&["jdoe", "-3", "FR"]).is_none());
        assert!(parse_create_params(&["jdoe", "30", "fr"]).is_none());
        assert!(parse_create_params(&["jdoe", "30", "FRA"]).is_none());
    }
}
