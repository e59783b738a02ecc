//! Store dispatch: maps each `Operation` onto one record store call.
//!
//! `echo` short-circuits with the payload. Every other operation gets the
//! configured table name attached as `TableName` and is forwarded to the
//! matching [`RecordStore`] call. Depending on [`MutationMode`], `update`
//! and `delete` are either awaited or spawned and answered with
//! `OperationResponse::Accepted`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use recordgate_core::{Item, OperationKind, TABLE_NAME_FIELD};
use serde_json::Value;
use tokio_util::task::TaskTracker;
use tower::Service;
use tracing::{debug, warn};

use super::config::{DispatchConfig, MutationMode};
use super::operation::{Operation, OperationError, OperationResponse};
use crate::storage::{RecordStore, StoreError};

// ---------------------------------------------------------------------------
// StoreCall
// ---------------------------------------------------------------------------

/// The four record store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreCall {
    Put,
    Get,
    Update,
    Delete,
}

impl StoreCall {
    /// `None` for `echo`, which never reaches the store.
    fn for_kind(kind: OperationKind) -> Option<Self> {
        match kind {
            OperationKind::Create => Some(Self::Put),
            OperationKind::Read => Some(Self::Get),
            OperationKind::Update => Some(Self::Update),
            OperationKind::Delete => Some(Self::Delete),
            OperationKind::Echo => None,
        }
    }

    fn is_mutation(self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }

    async fn invoke(self, store: &dyn RecordStore, payload: Item) -> Result<Value, StoreError> {
        match self {
            Self::Put => store.put(payload).await,
            Self::Get => store.get(payload).await,
            Self::Update => store.update(payload).await,
            Self::Delete => store.delete(payload).await,
        }
    }
}

/// Sets `TableName` on an object payload, replacing any caller value.
fn attach_table(
    kind: OperationKind,
    payload: Value,
    table_name: &str,
) -> Result<Item, OperationError> {
    match payload {
        Value::Object(mut map) => {
            map.insert(
                TABLE_NAME_FIELD.to_string(),
                Value::String(table_name.to_string()),
            );
            Ok(map)
        }
        _ => Err(OperationError::PayloadNotObject { kind }),
    }
}

// ---------------------------------------------------------------------------
// StoreService
// ---------------------------------------------------------------------------

type BoxedFuture = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

/// `tower::Service<Operation>` that performs the store call for an operation.
///
/// Cheap to clone: the store, configuration and detached-task tracker are
/// shared. Holds no per-call state.
#[derive(Clone)]
pub struct StoreService {
    store: Arc<dyn RecordStore>,
    config: Arc<DispatchConfig>,
    detached: TaskTracker,
}

impl StoreService {
    /// Creates a service forwarding to `store` with the given configuration.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, config: DispatchConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            detached: TaskTracker::new(),
        }
    }

    /// Tracker of fire-and-forget store calls still in flight.
    #[must_use]
    pub fn detached_tasks(&self) -> &TaskTracker {
        &self.detached
    }

    fn spawn_detached(&self, call: StoreCall, kind: OperationKind, call_id: u64, payload: Item) {
        let store = Arc::clone(&self.store);
        self.detached.spawn(async move {
            match call.invoke(store.as_ref(), payload).await {
                Ok(_) => debug!(call_id, operation = %kind, "detached store call completed"),
                Err(err) => warn!(
                    call_id,
                    operation = %kind,
                    error_type = err.error_type(),
                    error = %err,
                    "detached store call failed after response was sent"
                ),
            }
        });
    }
}

impl Service<Operation> for StoreService {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = BoxedFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let (ctx, payload) = op.into_parts();
        let kind = ctx.kind;

        let Some(call) = StoreCall::for_kind(kind) else {
            return Box::pin(async move { Ok(OperationResponse::Echo(payload)) });
        };

        let payload = match attach_table(kind, payload, &self.config.table_name) {
            Ok(payload) => payload,
            Err(err) => return Box::pin(async move { Err(err) }),
        };

        if call.is_mutation() && self.config.mutation_mode == MutationMode::FireAndForget {
            self.spawn_detached(call, kind, ctx.call_id, payload);
            return Box::pin(async move { Ok(OperationResponse::Accepted { kind }) });
        }

        let store = Arc::clone(&self.store);
        Box::pin(async move {
            let result = call.invoke(store.as_ref(), payload).await?;
            Ok(OperationResponse::Store(result))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
