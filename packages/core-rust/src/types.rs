use serde::{Deserialize, Serialize};

/// A record as stored in a table: attribute name to JSON value.
///
/// Uses `serde_json::Map` so attribute order follows the payload that
/// produced it.
pub type Item = serde_json::Map<String, serde_json::Value>;

/// Payload field that carries the collection identifier to the store.
pub const TABLE_NAME_FIELD: &str = "TableName";

/// Table targeted when no other name is configured.
pub const DEFAULT_TABLE_NAME: &str = "lambda-apigateway";

/// Which attributes a mutating store call returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnValues {
    /// Return nothing.
    #[default]
    None,
    /// The whole item as it was before the call.
    AllOld,
    /// Only the touched attributes, as they were before the call.
    UpdatedOld,
    /// The whole item as it is after the call.
    AllNew,
    /// Only the touched attributes, as they are after the call.
    UpdatedNew,
}

impl ReturnValues {
    /// Wire name of the variant.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::AllOld => "ALL_OLD",
            Self::UpdatedOld => "UPDATED_OLD",
            Self::AllNew => "ALL_NEW",
            Self::UpdatedNew => "UPDATED_NEW",
        }
    }
}
