//! Invocation entry point: envelope in, response out.

use std::sync::Arc;
use std::time::Duration;

use recordgate_core::Envelope;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;
use tracing::{info, warn};

use super::classify::OperationService;
use super::config::DispatchConfig;
use super::middleware::{build_dispatch_pipeline, DispatchPipeline};
use super::operation::{ClassifyError, OperationError, OperationResponse};
use super::store_service::StoreService;
use crate::storage::RecordStore;

/// Routes an [`Envelope`] to echo, a record store call, or the unknown
/// operation response.
///
/// Stateless between invocations apart from the call id counter and the
/// set of detached mutations still running. Clones share both.
#[derive(Clone)]
pub struct Dispatcher {
    classifier: Arc<OperationService>,
    pipeline: DispatchPipeline,
    detached: TaskTracker,
}

impl Dispatcher {
    /// Builds a dispatcher over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, config: DispatchConfig) -> Self {
        let service = StoreService::new(store, config);
        let detached = service.detached_tasks().clone();
        Self {
            classifier: Arc::new(OperationService::new()),
            pipeline: build_dispatch_pipeline(service),
            detached,
        }
    }

    /// Handles one invocation.
    ///
    /// An unrecognized operation is not an error: it yields
    /// `OperationResponse::Unrecognized`, which renders as
    /// `"Unknown operation: <name>"`.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged when an awaited store call fails,
    /// or `OperationError::PayloadNotObject` when a store-bound payload is
    /// not a JSON object.
    pub async fn handle(&self, envelope: Envelope) -> Result<OperationResponse, OperationError> {
        match self.classifier.classify(envelope) {
            Ok(op) => self.pipeline.clone().oneshot(op).await,
            Err(ClassifyError::UnknownOperation { operation }) => {
                info!(%operation, "unknown operation");
                Ok(OperationResponse::Unrecognized { operation })
            }
        }
    }

    /// Number of fire-and-forget store calls still running.
    #[must_use]
    pub fn pending_mutations(&self) -> usize {
        self.detached.len()
    }

    /// Stops accepting tracked mutations and waits for the running ones.
    ///
    /// Returns `true` if every detached call finished within `timeout`.
    /// Mutations dispatched after this call are still spawned and tracked.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.detached.close();
        let pending = self.detached.len();
        if pending == 0 {
            return true;
        }
        info!(pending, "waiting for detached store calls");
        let drained = tokio::time::timeout(timeout, self.detached.wait())
            .await
            .is_ok();
        if !drained {
            warn!(
                pending = self.detached.len(),
                "detached store calls still running at drain timeout"
            );
        }
        drained
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use proptest::prelude::*;
    use recordgate_core::{Item, OperationKind};
    use serde_json::{json, Value};
    use tokio::sync::Notify;

    use super::*;
    use crate::service::config::MutationMode;
    use crate::storage::{KeySchema, MemoryStore, StoreError};

    fn memory_dispatcher(mode: MutationMode) -> (Arc<MemoryStore>, Dispatcher) {
        let store = Arc::new(
            MemoryStore::new().with_table("lambda-apigateway", KeySchema::partition("id")),
        );
        let config = DispatchConfig {
            mutation_mode: mode,
            ..DispatchConfig::default()
        };
        (store.clone(), Dispatcher::new(store, config))
    }

    /// Counts store calls and fails `update` when asked to.
    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
        release: Notify,
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn put(&self, _payload: Item) -> Result<Value, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({}))
        }
        async fn get(&self, _payload: Item) -> Result<Value, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({}))
        }
        async fn update(&self, _payload: Item) -> Result<Value, StoreError> {
            self.release.notified().await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::validation("bad update"))
        }
        async fn delete(&self, _payload: Item) -> Result<Value, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({}))
        }
    }

    #[tokio::test]
    async fn echo_returns_payload() {
        let (_, dispatcher) = memory_dispatcher(MutationMode::FireAndForget);
        let resp = dispatcher
            .handle(Envelope::new("echo", json!({"somekey1": "somevalue1"})))
            .await
            .unwrap();
        assert_eq!(resp.into_output(), json!({"somekey1": "somevalue1"}));
    }

    #[tokio::test]
    async fn echo_never_touches_store() {
        let store = Arc::new(CountingStore::default());
        let dispatcher = Dispatcher::new(store.clone(), DispatchConfig::default());
        dispatcher
            .handle(Envelope::new("echo", json!({"Item": {"id": "1"}})))
            .await
            .unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn create_then_read_round_trip() {
        let (_, dispatcher) = memory_dispatcher(MutationMode::FireAndForget);

        let created = dispatcher
            .handle(Envelope::new(
                "create",
                json!({"Item": {"id": "1234ABCD", "number": 5}}),
            ))
            .await
            .unwrap();
        assert_eq!(created.into_output(), json!({}));

        let read = dispatcher
            .handle(Envelope::new("read", json!({"Key": {"id": "1234ABCD"}})))
            .await
            .unwrap();
        assert_eq!(
            read.into_output(),
            json!({"Item": {"id": "1234ABCD", "number": 5}})
        );
    }

    #[tokio::test]
    async fn read_of_absent_key_is_empty() {
        let (_, dispatcher) = memory_dispatcher(MutationMode::FireAndForget);
        let resp = dispatcher
            .handle(Envelope::new("read", json!({"Key": {"id": "missing"}})))
            .await
            .unwrap();
        assert_eq!(resp.into_output(), json!({}));
    }

    #[tokio::test]
    async fn unknown_operation_reports_name() {
        let store = Arc::new(CountingStore::default());
        let dispatcher = Dispatcher::new(store.clone(), DispatchConfig::default());
        let resp = dispatcher
            .handle(Envelope::new("bogus", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.into_output(), json!("Unknown operation: bogus"));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn operation_names_are_case_sensitive() {
        let (_, dispatcher) = memory_dispatcher(MutationMode::FireAndForget);
        let resp = dispatcher
            .handle(Envelope::new("Create", json!({"Item": {"id": "1"}})))
            .await
            .unwrap();
        assert_eq!(
            resp,
            OperationResponse::Unrecognized {
                operation: "Create".to_string()
            }
        );
    }

    #[tokio::test]
    async fn read_against_missing_table_propagates_error() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new(store, DispatchConfig::default());
        let err = dispatcher
            .handle(Envelope::new("read", json!({"Key": {"id": "1"}})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OperationError::Store(StoreError::ResourceNotFound { ref table })
                if table == "lambda-apigateway"
        ));
    }

    #[tokio::test]
    async fn fire_and_forget_update_is_applied_after_drain() {
        let (store, dispatcher) = memory_dispatcher(MutationMode::FireAndForget);
        dispatcher
            .handle(Envelope::new("create", json!({"Item": {"id": "1", "n": 1}})))
            .await
            .unwrap();

        let resp = dispatcher
            .handle(Envelope::new(
                "update",
                json!({
                    "Key": {"id": "1"},
                    "UpdateExpression": "SET n = :n",
                    "ExpressionAttributeValues": {":n": 2}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.into_output(), json!({}));

        assert!(dispatcher.drain(Duration::from_secs(1)).await);
        let read = dispatcher
            .handle(Envelope::new("read", json!({"Key": {"id": "1"}})))
            .await
            .unwrap();
        assert_eq!(read.into_output(), json!({"Item": {"id": "1", "n": 2}}));

        dispatcher
            .handle(Envelope::new("delete", json!({"Key": {"id": "1"}})))
            .await
            .unwrap();
        assert!(dispatcher.drain(Duration::from_secs(1)).await);
        assert_eq!(store.item_count("lambda-apigateway"), Some(0));
    }

    #[tokio::test]
    async fn fire_and_forget_hides_update_failure() {
        let store = Arc::new(CountingStore::default());
        let dispatcher = Dispatcher::new(store.clone(), DispatchConfig::default());

        let resp = dispatcher
            .handle(Envelope::new("update", json!({"Key": {"id": "1"}})))
            .await
            .unwrap();
        assert_eq!(
            resp,
            OperationResponse::Accepted {
                kind: OperationKind::Update
            }
        );
        assert_eq!(dispatcher.pending_mutations(), 1);

        store.release.notify_one();
        assert!(dispatcher.drain(Duration::from_secs(1)).await);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.pending_mutations(), 0);
    }

    #[tokio::test]
    async fn awaited_update_reports_failure() {
        let store = Arc::new(CountingStore::default());
        let config = DispatchConfig {
            mutation_mode: MutationMode::Awaited,
            ..DispatchConfig::default()
        };
        let dispatcher = Dispatcher::new(store.clone(), config);

        let handle = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .handle(Envelope::new("update", json!({"Key": {"id": "1"}})))
                    .await
            })
        };
        tokio::task::yield_now().await;
        store.release.notify_one();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            OperationError::Store(StoreError::Validation(ref msg)) if msg == "bad update"
        ));
    }

    #[tokio::test]
    async fn drain_with_nothing_pending_is_immediate() {
        let (_, dispatcher) = memory_dispatcher(MutationMode::FireAndForget);
        assert!(dispatcher.drain(Duration::from_millis(1)).await);
    }

    #[tokio::test]
    async fn drain_times_out_on_stuck_mutation() {
        let store = Arc::new(CountingStore::default());
        let dispatcher = Dispatcher::new(store, DispatchConfig::default());
        dispatcher
            .handle(Envelope::new("update", json!({"Key": {"id": "1"}})))
            .await
            .unwrap();
        assert!(!dispatcher.drain(Duration::from_millis(20)).await);
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    proptest! {
        #[test]
        fn echo_is_identity(key in "[a-z]{1,8}", text in ".*", n in any::<i64>()) {
            let rt = runtime();
            let payload = json!({ key: [text, n] });
            let resp = rt.block_on(async {
                let (_, dispatcher) = memory_dispatcher(MutationMode::FireAndForget);
                dispatcher.handle(Envelope::new("echo", payload.clone())).await
            }).unwrap();
            prop_assert_eq!(resp.into_output(), payload);
        }

        #[test]
        fn unknown_operations_never_reach_store(op in "[A-Za-z_]{0,12}") {
            prop_assume!(OperationKind::parse(&op).is_none());
            let rt = runtime();
            let store = Arc::new(CountingStore::default());
            let resp = rt.block_on(async {
                let dispatcher = Dispatcher::new(store.clone(), DispatchConfig::default());
                dispatcher.handle(Envelope::new(op.clone(), json!({}))).await
            }).unwrap();
            prop_assert_eq!(resp.into_output(), json!(format!("Unknown operation: {op}")));
            prop_assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        }
    }
}
