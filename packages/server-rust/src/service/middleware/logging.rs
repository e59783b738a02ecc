//! Logging middleware for operations.
//!
//! Wraps each operation in an `operation` span carrying its name and call id,
//! then records duration and outcome once the inner service resolves. The
//! result itself is logged at `info`, failures at `warn`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::{Operation, OperationError, OperationResponse};

// ---------------------------------------------------------------------------
// LoggingLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments operations with a `tracing` span.
#[derive(Debug, Clone)]
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService { inner }
    }
}

// ---------------------------------------------------------------------------
// LoggingService
// ---------------------------------------------------------------------------

/// Service wrapper that logs each operation's result, duration and outcome.
#[derive(Debug, Clone)]
pub struct LoggingService<S> {
    inner: S,
}

impl<S> Service<Operation> for LoggingService<S>
where
    S: Service<Operation, Response = OperationResponse, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let kind = op.ctx().kind;
        let call_id = op.ctx().call_id;
        let received_at = op.ctx().received_at;

        let span = info_span!(
            "operation",
            operation = kind.as_str(),
            call_id = call_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(op);

        Box::pin(
            async move {
                let result = fut.await;

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = received_at.elapsed().as_millis() as u64;
                let outcome = match &result {
                    Ok(resp) => resp.outcome(),
                    Err(_) => "error",
                };
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                match &result {
                    Ok(resp) => tracing::info!(
                        duration_ms,
                        outcome,
                        result = %resp,
                        "operation complete"
                    ),
                    Err(err) => tracing::warn!(
                        duration_ms,
                        error_type = err.error_type(),
                        error = %err,
                        "operation failed"
                    ),
                }

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
