//! Messaging sink used by command handlers to report results.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};

use crate::error::{FleetError, Result};
use crate::http::{ApiClient, build_url};

/// Context produced by the triggering surface, enough to address a reply.
#[derive(Clone, Debug, Default)]
pub struct MessageContext {
    pub service_url: String,
    pub conversation_id: String,
}

/// Outbound message channel. Implementations only need to accept a freeform
/// string and the context that triggered the command.
#[async_trait]
pub trait MessagingSink: Send + Sync {
    async fn send_message(&self, context: &MessageContext, text: &str) -> Result<Value>;
}

/// Sink posting markdown message activities to the bot messaging backend.
///
/// The target URL is derived from the conversation's service URL, not a fixed
/// base, so this uses the client's absolute-URL path.
pub struct BotMessenger {
    client: ApiClient,
}

impl BotMessenger {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessagingSink for BotMessenger {
    async fn send_message(&self, context: &MessageContext, text: &str) -> Result<Value> {
        if context.conversation_id.is_empty() || text.is_empty() {
            return Err(FleetError::Validation("Message can't be sent".into()));
        }

        let url = build_url(
            &context.service_url,
            &format!("v3/conversations/{}/activities", context.conversation_id),
        )?;
        let body = json!({
            "type": "message",
            "text": text,
            "textFormat": "markdown",
        });

        self.client.call_url(Method::POST, url, Some(body)).await
    }
}
