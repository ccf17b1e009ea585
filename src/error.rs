//! Error types for the detection and automation engine

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied something the engine refuses to store
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A previous run of this automation is still inside its grace period
    #[error("automation {0} is already executing")]
    ExecutionInProgress(String),

    /// The thing being created is already there
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("automation limit reached ({0})")]
    AutomationLimit(usize),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tab opener error: {0}")]
    Opener(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("automation", "abc");
        assert_eq!(err.to_string(), "automation not found: abc");
    }

    #[test]
    fn test_serde_error_converts() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("nope");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
