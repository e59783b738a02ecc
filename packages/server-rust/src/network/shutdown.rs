//! Shutdown coordination for the HTTP host.
//!
//! The controller owns the lifecycle `Starting -> Ready -> Draining -> Stopped`.
//! Draining starts the moment the shutdown signal fires, while open
//! invocations are still being answered. Stopped is reached only after the
//! open invocations and the detached store calls have both finished.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Lifecycle state reported by the health endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Listener bound, not yet serving.
    Starting,
    /// Accepting invocations.
    Ready,
    /// Signal received; finishing open invocations and detached store calls.
    Draining,
    /// Nothing left running.
    Stopped,
}

impl HealthState {
    /// Whether a readiness probe should route traffic here.
    #[must_use]
    pub fn accepts_traffic(self) -> bool {
        self == Self::Ready
    }
}

/// What a shutdown drain managed to finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Every open invocation returned.
    pub invocations_drained: bool,
    /// Every detached update/delete reached the store.
    pub mutations_drained: bool,
}

impl DrainReport {
    /// Both halves finished.
    #[must_use]
    pub fn is_complete(self) -> bool {
        self.invocations_drained && self.mutations_drained
    }
}

/// Tracks open invocations and drives the health lifecycle.
#[derive(Debug)]
pub struct ShutdownController {
    state: ArcSwap<HealthState>,
    invocations: TaskTracker,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(HealthState::Starting),
            invocations: TaskTracker::new(),
        }
    }

    pub fn set_ready(&self) {
        self.state.store(Arc::new(HealthState::Ready));
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.state.load()
    }

    /// Moves to `Draining` unless a drain already started or finished.
    ///
    /// Returns `true` if this call made the transition.
    pub fn begin_draining(&self) -> bool {
        let previous = self.state.rcu(|current| match **current {
            HealthState::Starting | HealthState::Ready => Arc::new(HealthState::Draining),
            HealthState::Draining | HealthState::Stopped => Arc::clone(current),
        });
        let transitioned = matches!(*previous, HealthState::Starting | HealthState::Ready);
        if transitioned {
            info!(in_flight = self.in_flight_count(), "shutdown signal received, draining");
        }
        transitioned
    }

    /// Wraps a shutdown signal so the controller enters `Draining` as soon
    /// as it fires, before the server stops accepting connections.
    pub fn on_signal<F>(self: &Arc<Self>, signal: F) -> impl Future<Output = ()> + Send + 'static
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let controller = Arc::clone(self);
        async move {
            signal.await;
            controller.begin_draining();
        }
    }

    /// Counts one open invocation until the guard is dropped.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        InFlightGuard {
            _token: self.invocations.token(),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.invocations.len()
    }

    /// Waits up to `timeout` for open invocations, then for `mutations`.
    ///
    /// `mutations` resolves to whether the detached store calls finished.
    /// The state moves to `Stopped` only when both did; otherwise it stays
    /// `Draining` so the health endpoint keeps reporting unfinished work.
    pub async fn drain<F>(&self, timeout: Duration, mutations: F) -> DrainReport
    where
        F: Future<Output = bool>,
    {
        self.begin_draining();
        self.invocations.close();

        let invocations_drained = tokio::time::timeout(timeout, self.invocations.wait())
            .await
            .is_ok();
        if !invocations_drained {
            warn!(
                in_flight = self.in_flight_count(),
                "invocations still open at drain timeout"
            );
        }

        let report = DrainReport {
            invocations_drained,
            mutations_drained: mutations.await,
        };
        if report.is_complete() {
            self.state.store(Arc::new(HealthState::Stopped));
            info!("shutdown drain complete");
        }
        report
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by the invoke handler for the lifetime of one invocation.
#[derive(Debug)]
pub struct InFlightGuard {
    _token: TaskTrackerToken,
}
