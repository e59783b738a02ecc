//! The record store capability consumed by the dispatcher.
//!
//! Defines [`RecordStore`], four independent calls that each take the
//! forwarded payload (already carrying `TableName`) and return the store's
//! raw result. The dispatcher never looks inside either side.

use async_trait::async_trait;
use recordgate_core::Item;
use serde_json::Value;

use super::error::StoreError;

/// Opaque record store backing the dispatcher.
///
/// Payload and result shapes follow the DynamoDB document client:
/// `put` takes `Item`, the other three take `Key`. Results are JSON objects
/// such as `{"Item": {...}}`, `{"Attributes": {...}}` or `{}`.
///
/// Used as `Arc<dyn RecordStore>`, created once per process and shared.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace a whole record.
    async fn put(&self, payload: Item) -> Result<Value, StoreError>;

    /// Fetch a record by key. An absent record is a success with no `Item`.
    async fn get(&self, payload: Item) -> Result<Value, StoreError>;

    /// Partially mutate a record, creating it if absent.
    async fn update(&self, payload: Item) -> Result<Value, StoreError>;

    /// Remove a record. Removing an absent record succeeds.
    async fn delete(&self, payload: Item) -> Result<Value, StoreError>;
}
