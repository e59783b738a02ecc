//! Record store capability and its backends.
//!
//! - [`RecordStore`]: the four-call capability the dispatcher consumes
//! - [`StoreError`]: failures reported by a store, forwarded unchanged
//! - [`MemoryStore`]: `DashMap`-backed tables for development and tests
//! - `DynamoDbStore` (feature `dynamodb`): AWS DynamoDB through `aws-sdk-dynamodb`

pub mod datastores;
pub mod engines;
pub mod error;
pub mod expression;
pub mod record_store;

#[cfg(feature = "dynamodb")]
pub use datastores::DynamoDbStore;
pub use engines::{KeySchema, MemoryStore};
pub use error::StoreError;
pub use record_store::RecordStore;
