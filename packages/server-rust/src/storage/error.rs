//! Errors reported by [`RecordStore`](super::RecordStore) implementations.
//!
//! The dispatcher forwards these to its caller unchanged, so each variant
//! carries the store's own wording and a stable `error_type` name.

/// Failure of a single store call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The addressed table does not exist.
    #[error("Requested resource not found: table {table}")]
    ResourceNotFound { table: String },
    /// The payload could not be applied: missing or mismatched key, bad
    /// expression, wrong operand type.
    #[error("{0}")]
    Validation(String),
    /// A `ConditionExpression` evaluated to false.
    #[error("The conditional request failed")]
    ConditionalCheckFailed,
    /// The caller's credentials do not permit the call.
    #[error("access denied: {0}")]
    AccessDenied(String),
    /// The store could not be reached or throttled the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Anything the backend could not classify.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// Shorthand for [`StoreError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable error type name, matching the DynamoDB exception names where
    /// one exists.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::ResourceNotFound { .. } => "ResourceNotFoundException",
            Self::Validation(_) => "ValidationException",
            Self::ConditionalCheckFailed => "ConditionalCheckFailedException",
            Self::AccessDenied(_) => "AccessDeniedException",
            Self::Unavailable(_) => "ServiceUnavailable",
            Self::Other(_) => "InternalServerError",
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}
