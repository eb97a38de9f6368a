//! Concrete command handlers for the fixed operation set
//! {status, start, stop, restart, reset, create, usage}.

pub mod create;
pub mod fallback;
pub mod operation;
pub mod status;
pub mod usage;

pub use create::CreateCommand;
pub use fallback::FallbackCommand;
pub use operation::OperationCommand;
pub use status::StatusCommand;
pub use usage::UsageCommand;

/// Standard denial message for the `fail` path of role-gated commands.
pub(crate) const DENIED_MESSAGE: &str = "You haven't got permissions for this command";
