//! Role-gated command and invoke dispatch.
//!
//! Two resolution namespaces share one authorization rule: free-text commands
//! resolve by the first token of the message text, structured invokes by
//! action name. Unknown triggers silently resolve to the fallback handler —
//! a resolution miss is never an error. A handler whose role list contains
//! `"any"` is open to everyone; otherwise the caller needs at least one role
//! from the handler's list. Authorized callers run `process`, everyone else
//! runs `fail` on the same resolved handler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::directory::User;
use crate::error::Result;
use crate::messaging::MessageContext;

/// Role sentinel authorizing every caller.
pub const ROLE_ANY: &str = "any";

/// Inbound trigger: the reply context plus the raw message text.
#[derive(Clone, Debug, Default)]
pub struct Trigger {
    pub context: MessageContext,
    pub text: String,
}

impl Trigger {
    /// First whitespace-separated token, used to resolve command handlers.
    pub fn command_name(&self) -> &str {
        self.text.trim().split_whitespace().next().unwrap_or_default()
    }

    /// Arguments following the command name.
    pub fn args(&self) -> Vec<&str> {
        self.text.trim().split_whitespace().skip(1).collect()
    }
}

/// Contract every command and invoke implements. Handlers are constructed
/// once at startup and stateless thereafter aside from their role list.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn applicable_roles(&self) -> &[String];
    /// Runs when the caller is authorized.
    async fn process(&self, trigger: &Trigger, caller: &User) -> Result<()>;
    /// Runs when the caller is not authorized.
    async fn fail(&self, trigger: &Trigger, caller: &User) -> Result<()>;
}

/// Outcome of a dispatch: which side of the handler contract ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Processed,
    Denied,
}

/// Stateless router over registered handlers, built once at startup.
pub struct Dispatcher {
    commands: HashMap<String, Arc<dyn CommandHandler>>,
    invokes: HashMap<String, Arc<dyn CommandHandler>>,
    fallback: Arc<dyn CommandHandler>,
}

impl Dispatcher {
    pub fn new(fallback: Arc<dyn CommandHandler>) -> Self {
        Self {
            commands: HashMap::new(),
            invokes: HashMap::new(),
            fallback,
        }
    }

    pub fn register_command(mut self, name: &str, handler: Arc<dyn CommandHandler>) -> Self {
        self.commands.insert(name.to_string(), handler);
        self
    }

    pub fn register_invoke(mut self, action: &str, handler: Arc<dyn CommandHandler>) -> Self {
        self.invokes.insert(action.to_string(), handler);
        self
    }

    /// Resolve the free-text command named by the trigger and run it.
    pub async fn dispatch_command(&self, trigger: &Trigger, caller: &User) -> Result<Dispatch> {
        let handler = self
            .commands
            .get(trigger.command_name())
            .unwrap_or(&self.fallback);
        run(handler.as_ref(), trigger, caller).await
    }

    /// Resolve a structured invoke by action name and run it.
    pub async fn dispatch_invoke(
        &self,
        action: &str,
        trigger: &Trigger,
        caller: &User,
    ) -> Result<Dispatch> {
        let handler = self.invokes.get(action).unwrap_or(&self.fallback);
        run(handler.as_ref(), trigger, caller).await
    }
}

async fn run(handler: &dyn CommandHandler, trigger: &Trigger, caller: &User) -> Result<Dispatch> {
    if is_allowed(caller, handler.applicable_roles()) {
        handler.process(trigger, caller).await?;
        Ok(Dispatch::Processed)
    } else {
        handler.fail(trigger, caller).await?;
        Ok(Dispatch::Denied)
    }
}

fn is_allowed(caller: &User, applicable_roles: &[String]) -> bool {
    applicable_roles.iter().any(|role| role == ROLE_ANY)
        || caller
            .roles
            .iter()
            .any(|role| applicable_roles.contains(role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Recording {
        roles: Vec<String>,
        processed: AtomicU64,
        failed: AtomicU64,
    }

    impl Recording {
        fn new(roles: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                roles: roles.iter().map(|r| r.to_string()).collect(),
                processed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            })
        }
    }

    #[async_trait]
    impl CommandHandler for Recording {
        fn applicable_roles(&self) -> &[String] {
            &self.roles
        }

        async fn process(&self, _trigger: &Trigger, _caller: &User) -> Result<()> {
            self.processed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn fail(&self, _trigger: &Trigger, _caller: &User) -> Result<()> {
            self.failed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn caller(roles: &[&str]) -> User {
        User {
            id: "caller".into(),
            roles: roles.iter().map(|r| r.to_string()).collect::<BTreeSet<_>>(),
            ..Default::default()
        }
    }

    fn trigger(text: &str) -> Trigger {
        Trigger {
            context: MessageContext::default(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn matching_role_runs_process() {
        let handler = Recording::new(&["admin"]);
        let dispatcher =
            Dispatcher::new(Recording::new(&[ROLE_ANY])).register_command("sbxstop", handler.clone());

        let outcome = dispatcher
            .dispatch_command(&trigger("sbxstop abc"), &caller(&["admin"]))
            .await
            .unwrap();

        assert_eq!(outcome, Dispatch::Processed);
        assert_eq!(handler.processed.load(Ordering::SeqCst), 1);
        assert_eq!(handler.failed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_role_runs_fail_on_same_handler() {
        let handler = Recording::new(&["admin"]);
        let dispatcher =
            Dispatcher::new(Recording::new(&[ROLE_ANY])).register_command("sbxstop", handler.clone());

        let outcome = dispatcher
            .dispatch_command(&trigger("sbxstop abc"), &caller(&["user"]))
            .await
            .unwrap();

        assert_eq!(outcome, Dispatch::Denied);
        assert_eq!(handler.processed.load(Ordering::SeqCst), 0);
        assert_eq!(handler.failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn any_sentinel_authorizes_roleless_caller() {
        let handler = Recording::new(&[ROLE_ANY]);
        let dispatcher =
            Dispatcher::new(Recording::new(&[ROLE_ANY])).register_command("help", handler.clone());

        let outcome = dispatcher
            .dispatch_command(&trigger("help"), &caller(&[]))
            .await
            .unwrap();

        assert_eq!(outcome, Dispatch::Processed);
    }

    #[tokio::test]
    async fn unknown_command_falls_back_silently() {
        let fallback = Recording::new(&[ROLE_ANY]);
        let dispatcher = Dispatcher::new(fallback.clone());

        let outcome = dispatcher
            .dispatch_command(&trigger("definitely-not-registered"), &caller(&["user"]))
            .await
            .unwrap();

        assert_eq!(outcome, Dispatch::Processed);
        assert_eq!(fallback.processed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invoke_namespace_is_independent() {
        let command = Recording::new(&["admin"]);
        let invoke = Recording::new(&["admin"]);
        let dispatcher = Dispatcher::new(Recording::new(&[ROLE_ANY]))
            .register_command("report", command.clone())
            .register_invoke("report", invoke.clone());

        dispatcher
            .dispatch_invoke("report", &trigger(""), &caller(&["admin"]))
            .await
            .unwrap();

        assert_eq!(command.processed.load(Ordering::SeqCst), 0);
        assert_eq!(invoke.processed.load(Ordering::SeqCst), 1);
    }
}
