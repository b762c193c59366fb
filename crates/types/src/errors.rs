//! Error taxonomy surfaced at every host callback boundary.

use thiserror::Error;

/// Recoverable error kinds crossing the engine/host boundary.
///
/// A load miss is not an error: storage reads return `Ok(None)` when the
/// record does not exist yet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TallyError {
    /// Transient storage failure (load or save).
    #[error("storage error: {0}")]
    Storage(String),

    /// Transient network failure (registry refresh, wallet endpoints).
    #[error("network error: {0}")]
    Network(String),

    /// A single-record read matched more than one row.
    #[error("too many results for publisher '{0}'")]
    TooManyResults(String),

    /// Persisted publisher state failed to deserialize.
    #[error("invalid publisher state: {0}")]
    InvalidPublisherState(String),

    /// Persisted ledger (wallet) state failed to deserialize.
    #[error("invalid ledger state: {0}")]
    InvalidLedgerState(String),

    /// Serialization of in-memory state failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Rejected engine configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Anything that does not fit the kinds above.
    #[error("{0}")]
    Unexpected(String),
}

impl TallyError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Whether the error terminates only the operation that hit it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Network(_) | Self::TooManyResults(_))
    }
}

impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        TallyError::Serialization(err.to_string())
    }
}

/// Result type alias using the shared error type.
pub type TallyResult<T> = std::result::Result<T, TallyError>;
