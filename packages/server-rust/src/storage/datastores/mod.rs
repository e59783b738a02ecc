//! [`RecordStore`](super::RecordStore) implementations backed by external services.

#[cfg(feature = "dynamodb")]
mod dynamodb;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbStore;
