use thiserror::Error;

/// Failures reported by the store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write. Callers use this to detect an existing row.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        const DUPLICATE_KEY: i32 = 11000;

        let duplicate = match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
            ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
            _ => false,
        };

        if duplicate {
            StoreError::UniqueViolation(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum EvaluationError {
    #[error("alert {alert_id} of kind {kind} has no threshold configured")]
    MissingThreshold { alert_id: String, kind: String },
}

/// Anything that stops a single alert from being processed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}
