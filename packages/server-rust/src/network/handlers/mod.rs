//! axum handlers and the state they share.

pub mod health;
pub mod invoke;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use invoke::invoke_handler;

use std::sync::Arc;
use std::time::Instant;

use super::ShutdownController;
use crate::service::Dispatcher;

/// State handed to every handler through `State`.
#[derive(Clone)]
pub struct AppState {
    /// Routes invocations to echo or the record store.
    pub dispatcher: Arc<Dispatcher>,
    /// Lifecycle state and open-invocation tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Router construction time, for `uptime_secs`.
    pub start_time: Instant,
}
