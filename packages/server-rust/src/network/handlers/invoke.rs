//! `POST /invoke`: runs one envelope through the dispatcher.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use recordgate_core::Envelope;
use serde_json::json;

use super::AppState;
use crate::service::{OperationError, OperationResponse};

/// Handles `POST /invoke` with a JSON `{ "operation", "payload" }` body.
///
/// The response body is the invocation output: the store result, the echoed
/// payload, `{}` for an accepted mutation, or the unknown operation string.
/// A body that does not deserialize as an envelope is rejected by the `Json`
/// extractor before reaching the dispatcher.
pub async fn invoke_handler(
    State(state): State<AppState>,
    Json(envelope): Json<Envelope>,
) -> Result<Json<OperationResponse>, OperationError> {
    let _guard = state.shutdown.in_flight_guard();
    state.dispatcher.handle(envelope).await.map(Json)
}

impl IntoResponse for OperationError {
    fn into_response(self) -> Response {
        let body = json!({
            "errorType": self.error_type(),
            "errorMessage": self.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::network::handlers::test_support::memory_state;
    use crate::service::MutationMode;

    fn router(state: AppState) -> Router {
        Router::new()
            .route("/invoke", post(invoke_handler))
            .with_state(state)
    }

    async fn invoke(router: &Router, body: &str) -> (StatusCode, Value) {
        let request = Request::post("/invoke")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn echo_over_http() {
        let router = router(memory_state(MutationMode::FireAndForget));
        let (status, body) = invoke(
            &router,
            r#"{"operation":"echo","payload":{"somekey1":"somevalue1"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"somekey1": "somevalue1"}));
    }

    #[tokio::test]
    async fn create_then_read_over_http() {
        let router = router(memory_state(MutationMode::FireAndForget));
        let (status, body) = invoke(
            &router,
            r#"{"operation":"create","payload":{"Item":{"id":"1234ABCD","number":5}}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));

        let (status, body) = invoke(
            &router,
            r#"{"operation":"read","payload":{"Key":{"id":"1234ABCD"}}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"Item": {"id": "1234ABCD", "number": 5}}));
    }

    #[tokio::test]
    async fn unknown_operation_is_success_string() {
        let router = router(memory_state(MutationMode::FireAndForget));
        let (status, body) = invoke(&router, r#"{"operation":"bogus","payload":{}}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("Unknown operation: bogus"));
    }

    #[tokio::test]
    async fn store_error_maps_to_500_body() {
        let router = router(memory_state(MutationMode::Awaited));
        let (status, body) = invoke(
            &router,
            r#"{"operation":"read","payload":{"Key":{"wrong":"1"}}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["errorType"], "ValidationException");
        assert!(body["errorMessage"].is_string());
    }

    #[tokio::test]
    async fn non_object_payload_maps_to_500_body() {
        let router = router(memory_state(MutationMode::FireAndForget));
        let (status, body) = invoke(&router, r#"{"operation":"delete","payload":7}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["errorType"], "InvalidPayload");
        assert_eq!(body["errorMessage"], "delete payload must be a JSON object");
    }

    #[tokio::test]
    async fn malformed_envelope_is_rejected() {
        let router = router(memory_state(MutationMode::FireAndForget));
        let (status, _) = invoke(&router, r#"{"payload":{}}"#).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn in_flight_guard_is_released() {
        let state = memory_state(MutationMode::FireAndForget);
        let shutdown = state.shutdown.clone();
        let router = router(state);
        invoke(&router, r#"{"operation":"echo","payload":null}"#).await;
        assert_eq!(shutdown.in_flight_count(), 0);
    }
}
