//! Typed inputs of the four record store operations.
//!
//! Field names follow the DynamoDB document client (`TableName`, `Item`,
//! `Key`, ...). Stores decode the forwarded payload into one of these with
//! [`parse_input`]; a payload that does not decode is a store-side
//! validation failure, never a dispatcher error.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::types::{Item, ReturnValues};

/// Decodes a forwarded payload into a typed store input.
///
/// # Errors
///
/// Returns the `serde_json` error when a required field is missing or has
/// the wrong shape.
pub fn parse_input<T: DeserializeOwned>(payload: Item) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::Object(payload))
}

/// Input of `put`: insert or replace a whole item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemInput {
    pub table_name: String,
    pub item: Item,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: BTreeMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: Item,
    #[serde(default)]
    pub return_values: ReturnValues,
}

/// Input of `get`: fetch one item by primary key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemInput {
    pub table_name: String,
    pub key: Item,
    /// Comma-separated attribute names to return; all attributes when absent.
    #[serde(default)]
    pub projection_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: BTreeMap<String, String>,
    /// Accepted for compatibility; single-item reads are always consistent here.
    #[serde(default)]
    pub consistent_read: Option<bool>,
}

/// Input of `update`: partially mutate one item, creating it if absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateItemInput {
    pub table_name: String,
    pub key: Item,
    #[serde(default)]
    pub update_expression: Option<String>,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: BTreeMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: Item,
    #[serde(default)]
    pub return_values: ReturnValues,
}

/// Input of `delete`: remove one item by primary key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteItemInput {
    pub table_name: String,
    pub key: Item,
    #[serde(default)]
    pub condition_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: BTreeMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: Item,
    #[serde(default)]
    pub return_values: ReturnValues,
}
