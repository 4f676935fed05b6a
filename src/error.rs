use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way an election operation can be rejected.
///
/// A rejected operation leaves both the registry and the controller exactly
/// as they were, and emits no event.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller lacks the required privilege, or the voter is not eligible.
    #[error("Unauthorized: {0}")]
    Authorization(String),
    /// The operation is invalid for the current phase or time window.
    #[error("Invalid state: {0}")]
    State(String),
    /// Re-registration, double vote, or a second capability request.
    #[error("Duplicate: {0}")]
    Duplicate(String),
    /// Malformed input.
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error(transparent)]
    Config(#[from] figment::Error),
}

impl Error {
    /// The class of this error, without its message.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::State(_) => ErrorKind::State,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

/// Error classes, as they appear in logs and replay scenarios.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authorization,
    State,
    Duplicate,
    Validation,
    Config,
}
