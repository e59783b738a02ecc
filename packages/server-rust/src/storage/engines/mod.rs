//! In-process [`RecordStore`](super::RecordStore) implementations.

mod memory;

pub use memory::{KeySchema, MemoryStore};
