//! Operation dispatch.
//!
//! An invocation flows through:
//!
//! 1. **Classification** (`classify`): `Envelope` -> `Result<Operation, ClassifyError>`
//! 2. **Middleware** (`middleware`): Tower layers (logging)
//! 3. **Store dispatch** (`store_service`): echo, or one record store call
//!
//! [`Dispatcher`] ties the three together and owns the tracker of detached
//! mutations.

pub mod classify;
pub mod config;
pub mod dispatcher;
pub mod middleware;
pub mod operation;
pub mod store_service;

// Re-export key types for convenient access.
pub use classify::OperationService;
pub use config::{DispatchConfig, MutationMode};
pub use dispatcher::Dispatcher;
pub use operation::{
    ClassifyError, Operation, OperationContext, OperationError, OperationResponse,
};
pub use store_service::StoreService;
