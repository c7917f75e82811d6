//! Error taxonomy shared by the store, scheduler and dispatcher.
//!
//! Callers classify failures through [`LineError::kind`] rather than by
//! inspecting messages.

use thiserror::Error;

/// Classification of a [`LineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty or malformed request; no I/O was attempted.
    InvalidArgument,
    /// The backing relation is not provisioned.
    TableNotExist,
    /// Any other persistence or transaction failure.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::TableNotExist => "table_not_exist",
            Self::Internal => "internal",
        }
    }
}

/// Errors surfaced by the line store and the components built on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("table does not exist: {0}")]
    TableNotExist(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LineError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn table_not_exist(message: impl Into<String>) -> Self {
        Self::TableNotExist(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::TableNotExist(_) => ErrorKind::TableNotExist,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        self.kind() == ErrorKind::InvalidArgument
    }

    pub fn is_table_not_exist(&self) -> bool {
        self.kind() == ErrorKind::TableNotExist
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

/// Failure delivering a batch to one subscriber.
#[derive(Debug, Error)]
pub enum SendError {
    /// The consumer side of the transport is gone.
    #[error("subscriber channel closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to encode update: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("delivery timed out after {0:?}")]
    TimedOut(std::time::Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            LineError::invalid_argument("empty").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            LineError::table_not_exist("sport_lines").kind(),
            ErrorKind::TableNotExist
        );
        assert_eq!(LineError::internal("boom").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_kind_is_independent_of_message() {
        // A message mentioning a missing table does not change the kind
        let err = LineError::internal("relation \"sport_lines\" does not exist");
        assert!(err.is_internal());
        assert!(!err.is_table_not_exist());
    }

    #[test]
    fn test_kind_as_str() {
        assert_eq!(ErrorKind::TableNotExist.as_str(), "table_not_exist");
    }
}
