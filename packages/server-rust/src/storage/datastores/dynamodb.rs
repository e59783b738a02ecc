//! AWS DynamoDB [`RecordStore`] backend.
//!
//! Forwards each call to DynamoDB through `aws-sdk-dynamodb`, converting the
//! document-client JSON payload into `AttributeValue` maps and back. Service
//! exception codes are mapped onto [`StoreError`] without retrying.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use recordgate_core::{
    parse_input, DeleteItemInput, GetItemInput, Item, PutItemInput, ReturnValues,
    UpdateItemInput,
};
use serde_json::{json, Number, Value};
use tracing::info;

use crate::storage::error::StoreError;
use crate::storage::record_store::RecordStore;

/// Record store backed by a DynamoDB client.
///
/// The client is created once and shared by every call.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    /// Wraps an already configured client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Loads AWS configuration from the environment, pinned to `region`.
    #[must_use]
    pub async fn from_region(region: impl Into<String>) -> Self {
        let region = region.into();
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .load()
            .await;
        info!(%region, "DynamoDB client configured");
        Self::new(Client::new(&config))
    }
}

// ---------------------------------------------------------------------------
// JSON <-> AttributeValue
// ---------------------------------------------------------------------------

fn to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(items) => AttributeValue::L(items.into_iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(to_attribute_map(map)),
    }
}

fn to_attribute_map(item: Item) -> HashMap<String, AttributeValue> {
    item.into_iter().map(|(k, v)| (k, to_attribute(v))).collect()
}

fn number(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::Number(Number::from(i));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(text.to_string()), Value::Number)
}

fn blob(b: Blob) -> Value {
    Value::Array(b.into_inner().into_iter().map(Value::from).collect())
}

fn from_attribute(value: AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::N(n) => number(&n),
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::L(items) => Value::Array(items.into_iter().map(from_attribute).collect()),
        AttributeValue::M(map) => Value::Object(from_attribute_map(map)),
        AttributeValue::Ss(set) => Value::Array(set.into_iter().map(Value::String).collect()),
        AttributeValue::Ns(set) => Value::Array(set.iter().map(|n| number(n)).collect()),
        AttributeValue::B(b) => blob(b),
        AttributeValue::Bs(set) => Value::Array(set.into_iter().map(blob).collect()),
        _ => Value::Null,
    }
}

fn from_attribute_map(map: HashMap<String, AttributeValue>) -> Item {
    map.into_iter().map(|(k, v)| (k, from_attribute(v))).collect()
}

/// DynamoDB rejects empty placeholder maps, so they are sent as absent.
fn names_param(names: BTreeMap<String, String>) -> Option<HashMap<String, String>> {
    (!names.is_empty()).then(|| names.into_iter().collect())
}

fn values_param(values: Item) -> Option<HashMap<String, AttributeValue>> {
    (!values.is_empty()).then(|| to_attribute_map(values))
}

fn return_value(rv: ReturnValues) -> ReturnValue {
    ReturnValue::from(rv.as_str())
}

fn attributes_output(attributes: Option<HashMap<String, AttributeValue>>) -> Value {
    match attributes {
        Some(map) if !map.is_empty() => json!({ "Attributes": from_attribute_map(map) }),
        _ => json!({}),
    }
}

fn map_sdk_error<E, R>(err: SdkError<E, R>, table: &str) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = err.message().unwrap_or_default().to_string();
    match err.code() {
        Some("ResourceNotFoundException") => StoreError::ResourceNotFound {
            table: table.to_string(),
        },
        Some("ValidationException") => StoreError::Validation(message),
        Some("ConditionalCheckFailedException") => StoreError::ConditionalCheckFailed,
        Some("AccessDeniedException" | "UnrecognizedClientException") => {
            StoreError::AccessDenied(message)
        }
        Some(
            "ProvisionedThroughputExceededException"
            | "ThrottlingException"
            | "RequestLimitExceeded"
            | "InternalServerError"
            | "ServiceUnavailable",
        ) => StoreError::Unavailable(message),
        _ if matches!(err, SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)) => {
            StoreError::Unavailable(DisplayErrorContext(&err).to_string())
        }
        _ => StoreError::Other(anyhow::anyhow!("{}", DisplayErrorContext(&err))),
    }
}

#[async_trait]
impl RecordStore for DynamoDbStore {
    async fn put(&self, payload: Item) -> Result<Value, StoreError> {
        let input: PutItemInput = parse_input(payload)?;
        let table = input.table_name.clone();
        let output = self
            .client
            .put_item()
            .table_name(input.table_name)
            .set_item(Some(to_attribute_map(input.item)))
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(names_param(input.expression_attribute_names))
            .set_expression_attribute_values(values_param(input.expression_attribute_values))
            .return_values(return_value(input.return_values))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &table))?;
        Ok(attributes_output(output.attributes))
    }

    async fn get(&self, payload: Item) -> Result<Value, StoreError> {
        let input: GetItemInput = parse_input(payload)?;
        let table = input.table_name.clone();
        let output = self
            .client
            .get_item()
            .table_name(input.table_name)
            .set_key(Some(to_attribute_map(input.key)))
            .set_projection_expression(input.projection_expression)
            .set_expression_attribute_names(names_param(input.expression_attribute_names))
            .set_consistent_read(input.consistent_read)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &table))?;
        Ok(match output.item {
            Some(item) => json!({ "Item": from_attribute_map(item) }),
            None => json!({}),
        })
    }

    async fn update(&self, payload: Item) -> Result<Value, StoreError> {
        let input: UpdateItemInput = parse_input(payload)?;
        let table = input.table_name.clone();
        let output = self
            .client
            .update_item()
            .table_name(input.table_name)
            .set_key(Some(to_attribute_map(input.key)))
            .set_update_expression(input.update_expression)
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(names_param(input.expression_attribute_names))
            .set_expression_attribute_values(values_param(input.expression_attribute_values))
            .return_values(return_value(input.return_values))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &table))?;
        Ok(attributes_output(output.attributes))
    }

    async fn delete(&self, payload: Item) -> Result<Value, StoreError> {
        let input: DeleteItemInput = parse_input(payload)?;
        let table = input.table_name.clone();
        let output = self
            .client
            .delete_item()
            .table_name(input.table_name)
            .set_key(Some(to_attribute_map(input.key)))
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(names_param(input.expression_attribute_names))
            .set_expression_attribute_values(values_param(input.expression_attribute_values))
            .return_values(return_value(input.return_values))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &table))?;
        Ok(attributes_output(output.attributes))
    }
}
