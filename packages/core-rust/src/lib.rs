//! recordgate core: the invocation envelope and the typed inputs of the four
//! record store operations.

pub mod envelope;
pub mod requests;
pub mod types;

pub use envelope::{Envelope, OperationKind};
pub use requests::{parse_input, DeleteItemInput, GetItemInput, PutItemInput, UpdateItemInput};
pub use types::{Item, ReturnValues, DEFAULT_TABLE_NAME, TABLE_NAME_FIELD};
