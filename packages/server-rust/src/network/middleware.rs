//! HTTP middleware stack for the invoke and health routes.
//!
//! The first layer listed is the outermost: it sees the request first and
//! the response last.

use std::time::Duration;

use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// The composed layer produced by [`build_http_layers`], outermost first.
type HttpLayers = Stack<
    PropagateRequestIdLayer,
    Stack<
        TimeoutLayer,
        Stack<
            CorsLayer,
            Stack<
                CompressionLayer,
                Stack<
                    TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
                    Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>,
                >,
            >,
        >,
    >,
>;

/// Builds the HTTP middleware stack.
///
/// Outermost to innermost:
/// 1. `SetRequestId`: assigns a UUID `x-request-id` when the caller sent none
/// 2. `Trace`: request/response span; 5xx invocation errors count as failures
/// 3. `Compression`: gzip responses
/// 4. `CORS`: configured origins, `GET` and `POST` only
/// 5. `Timeout`: 408 once `request_timeout` elapses
/// 6. `PropagateRequestId`: copies `x-request-id` onto the response
///
/// The timeout bounds the HTTP request only. A fire-and-forget store call
/// spawned by the request keeps running after it fires.
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(timeout_layer(config.request_timeout))
        .layer(PropagateRequestIdLayer::new(request_id))
        .into_inner()
}

fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// `"*"` anywhere in `origins` allows every origin. Otherwise unparsable
/// entries are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;

    fn app(config: &NetworkConfig) -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(build_http_layers(config))
    }

    #[tokio::test]
    async fn request_id_is_assigned_and_propagated() {
        let response = app(&NetworkConfig::default())
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn caller_request_id_is_kept() {
        let response = app(&NetworkConfig::default())
            .oneshot(
                Request::get("/ping")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc-123");
    }

    #[test]
    fn build_cors_layer_specific_origins() {
        let origins = vec![
            "http://localhost:3000".to_string(),
            "https://example.com".to_string(),
        ];
        let _cors = build_cors_layer(&origins);
    }

    #[tokio::test]
    async fn slow_request_times_out() {
        let config = NetworkConfig {
            request_timeout: Duration::from_millis(20),
            ..NetworkConfig::default()
        };
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .layer(build_http_layers(&config));

        let response = app
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
