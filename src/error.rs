use std::fmt;

/// Errors returned by fleet operations.
#[derive(Debug)]
pub enum FleetError {
    /// Credential exchange failed or returned a malformed payload.
    Auth(String),
    /// Network-level failure talking to a backend.
    Transport(String),
    /// Well-formed failure envelope from a backend; message kept verbatim.
    Backend { code: i64, message: String },
    /// User directory read or write failure.
    Directory(String),
    /// Invalid input or configuration.
    Validation(String),
}

impl fmt::Display for FleetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FleetError::Auth(msg) => write!(f, "auth error: {msg}"),
            FleetError::Transport(msg) => write!(f, "transport error: {msg}"),
            FleetError::Backend { code, message } => {
                write!(f, "backend error {code}: {message}")
            }
            FleetError::Directory(msg) => write!(f, "directory error: {msg}"),
            FleetError::Validation(msg) => write!(f, "validation error: {msg}"),
        }
    }
}

impl std::error::Error for FleetError {}

pub type Result<T> = std::result::Result<T, FleetError>;
