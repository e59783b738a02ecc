//! Operation types carried through the dispatch pipeline.

use std::fmt;
use std::time::Instant;

use recordgate_core::OperationKind;
use serde::ser::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::storage::StoreError;

/// Context carried with every operation through the pipeline.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Process-unique, monotonically increasing id used to correlate logs.
    pub call_id: u64,
    /// Which operation this is.
    pub kind: OperationKind,
    /// When the envelope was classified.
    pub received_at: Instant,
}

impl OperationContext {
    /// Creates a context stamped with the current instant.
    #[must_use]
    pub fn new(call_id: u64, kind: OperationKind) -> Self {
        Self {
            call_id,
            kind,
            received_at: Instant::now(),
        }
    }
}

/// A classified invocation, one variant per recognized operation.
///
/// `payload` is the envelope payload exactly as received; the table name is
/// attached later, by the store service.
#[derive(Debug, Clone)]
pub enum Operation {
    Create { ctx: OperationContext, payload: Value },
    Read { ctx: OperationContext, payload: Value },
    Update { ctx: OperationContext, payload: Value },
    Delete { ctx: OperationContext, payload: Value },
    Echo { ctx: OperationContext, payload: Value },
}

impl Operation {
    /// Builds the variant matching `ctx.kind`.
    #[must_use]
    pub fn new(ctx: OperationContext, payload: Value) -> Self {
        match ctx.kind {
            OperationKind::Create => Self::Create { ctx, payload },
            OperationKind::Read => Self::Read { ctx, payload },
            OperationKind::Update => Self::Update { ctx, payload },
            OperationKind::Delete => Self::Delete { ctx, payload },
            OperationKind::Echo => Self::Echo { ctx, payload },
        }
    }

    /// Returns the operation context.
    #[must_use]
    pub fn ctx(&self) -> &OperationContext {
        match self {
            Self::Create { ctx, .. }
            | Self::Read { ctx, .. }
            | Self::Update { ctx, .. }
            | Self::Delete { ctx, .. }
            | Self::Echo { ctx, .. } => ctx,
        }
    }

    /// Splits the operation into its context and payload.
    #[must_use]
    pub fn into_parts(self) -> (OperationContext, Value) {
        match self {
            Self::Create { ctx, payload }
            | Self::Read { ctx, payload }
            | Self::Update { ctx, payload }
            | Self::Delete { ctx, payload }
            | Self::Echo { ctx, payload } => (ctx, payload),
        }
    }
}

/// Successful result of an invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResponse {
    /// Raw result of an awaited store call.
    Store(Value),
    /// The payload of an `echo`, untouched.
    Echo(Value),
    /// A store call was issued but not awaited; its outcome is unknown.
    Accepted { kind: OperationKind },
    /// The operation name was not one of the recognized tokens.
    Unrecognized { operation: String },
}

impl OperationResponse {
    /// Text returned for an unrecognized operation.
    #[must_use]
    pub fn unrecognized_message(operation: &str) -> String {
        format!("Unknown operation: {operation}")
    }

    /// Converts the response into the invocation output.
    ///
    /// `Accepted` becomes `{}`, `Unrecognized` becomes the message string.
    #[must_use]
    pub fn into_output(self) -> Value {
        match self {
            Self::Store(value) | Self::Echo(value) => value,
            Self::Accepted { .. } => json!({}),
            Self::Unrecognized { operation } => {
                Value::String(Self::unrecognized_message(&operation))
            }
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Store(_) => "stored",
            Self::Echo(_) => "echoed",
            Self::Accepted { .. } => "accepted",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

impl Serialize for OperationResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Store(value) | Self::Echo(value) => value.serialize(serializer),
            Self::Accepted { .. } => json!({}).serialize(serializer),
            Self::Unrecognized { operation } => {
                serializer.serialize_str(&Self::unrecognized_message(operation))
            }
        }
    }
}

impl fmt::Display for OperationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(value) | Self::Echo(value) => write!(f, "{value}"),
            Self::Accepted { .. } => f.write_str("{}"),
            Self::Unrecognized { operation } => {
                f.write_str(&Self::unrecognized_message(operation))
            }
        }
    }
}

/// Errors returned by the dispatch pipeline.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// The store rejected or failed the call. Forwarded unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A store-bound payload was not a JSON object, so the table name could
    /// not be attached.
    #[error("{kind} payload must be a JSON object")]
    PayloadNotObject { kind: OperationKind },
}

impl OperationError {
    /// Stable error type name reported to callers.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Store(err) => err.error_type(),
            Self::PayloadNotObject { .. } => "InvalidPayload",
        }
    }
}

/// Errors from classifying an `Envelope` into an `Operation`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("unknown operation: {operation}")]
    UnknownOperation { operation: String },
}
