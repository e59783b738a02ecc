//! The invocation envelope: `{ operation, payload }`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single invocation request.
///
/// `operation` selects the action; `payload` is forwarded to the store
/// (or echoed back) and is not inspected beyond attaching the table name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Requested action. Only the five [`OperationKind`] tokens are recognized.
    pub operation: String,
    /// Open-ended parameters for the store call. Absent payloads decode as `null`.
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Creates an envelope from an operation name and payload.
    #[must_use]
    pub fn new(operation: impl Into<String>, payload: Value) -> Self {
        Self {
            operation: operation.into(),
            payload,
        }
    }

    /// Returns the recognized operation, or `None` for any other token.
    #[must_use]
    pub fn kind(&self) -> Option<OperationKind> {
        OperationKind::parse(&self.operation)
    }
}

/// The closed set of operations the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Read,
    Update,
    Delete,
    Echo,
}

impl OperationKind {
    /// Every recognized operation, in wire-token order.
    pub const ALL: [Self; 5] = [
        Self::Create,
        Self::Read,
        Self::Update,
        Self::Delete,
        Self::Echo,
    ];

    /// Exact, case-sensitive match against the wire tokens.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "create" => Some(Self::Create),
            "read" => Some(Self::Read),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "echo" => Some(Self::Echo),
            _ => None,
        }
    }

    /// Wire token of this operation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Echo => "echo",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_recognizes_all_tokens() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert_eq!(OperationKind::parse("Create"), None);
        assert_eq!(OperationKind::parse("ECHO"), None);
        assert_eq!(OperationKind::parse(" read"), None);
    }

    #[test]
    fn envelope_deserializes_with_payload() {
        let envelope: Envelope =
            serde_json::from_value(json!({"operation": "read", "payload": {"Key": {"id": "1"}}}))
                .unwrap();
        assert_eq!(envelope.kind(), Some(OperationKind::Read));
        assert_eq!(envelope.payload, json!({"Key": {"id": "1"}}));
    }

    #[test]
    fn envelope_without_payload_decodes_null() {
        let envelope: Envelope = serde_json::from_value(json!({"operation": "bogus"})).unwrap();
        assert_eq!(envelope.operation, "bogus");
        assert!(envelope.payload.is_null());
        assert_eq!(envelope.kind(), None);
    }

    #[test]
    fn envelope_without_operation_is_rejected() {
        let result: Result<Envelope, _> = serde_json::from_value(json!({"payload": {}}));
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn unknown_tokens_never_parse(token in "\\PC*") {
            let known = OperationKind::ALL.iter().any(|k| k.as_str() == token);
            prop_assert_eq!(OperationKind::parse(&token).is_some(), known);
        }
    }
}
