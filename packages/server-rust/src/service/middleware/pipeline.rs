//! Pipeline composition: wraps the store service in the middleware stack.

use tower::ServiceBuilder;

use super::logging::{LoggingLayer, LoggingService};
use crate::service::store_service::StoreService;

/// The service stack every classified operation passes through.
pub type DispatchPipeline = LoggingService<StoreService>;

/// Build the dispatch pipeline around `inner`.
///
/// Only `LoggingLayer` wraps the store service. No timeout or load-shedding
/// layer is applied: the store client owns its own timeouts.
#[must_use]
pub fn build_dispatch_pipeline<S>(inner: S) -> LoggingService<S> {
    ServiceBuilder::new().layer(LoggingLayer).service(inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use recordgate_core::OperationKind;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::service::config::{DispatchConfig, MutationMode};
    use crate::service::operation::{Operation, OperationContext, OperationResponse};
    use crate::storage::{KeySchema, MemoryStore};

    #[tokio::test]
    async fn pipeline_routes_through_store_service() {
        let store = Arc::new(
            MemoryStore::new().with_table("lambda-apigateway", KeySchema::partition("id")),
        );
        let config = DispatchConfig {
            mutation_mode: MutationMode::Awaited,
            ..DispatchConfig::default()
        };
        let svc: DispatchPipeline = build_dispatch_pipeline(StoreService::new(store, config));

        let put = Operation::new(
            OperationContext::new(1, OperationKind::Create),
            json!({"Item": {"id": "a"}}),
        );
        assert_eq!(
            svc.clone().oneshot(put).await.unwrap(),
            OperationResponse::Store(json!({}))
        );

        let get = Operation::new(
            OperationContext::new(2, OperationKind::Read),
            json!({"Key": {"id": "a"}}),
        );
        assert_eq!(
            svc.oneshot(get).await.unwrap(),
            OperationResponse::Store(json!({"Item": {"id": "a"}}))
        );
    }
}
