//! Network module with deferred startup lifecycle.
//!
//! `new()` wires shared state, `start()` binds the TCP listener, and
//! `serve()` accepts requests until the shutdown future resolves. Binding
//! before serving lets the caller learn the OS-assigned port.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{
    health_handler, invoke_handler, liveness_handler, readiness_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::service::Dispatcher;

/// Owns the HTTP server lifecycle.
///
/// 1. `new()`: allocates the shutdown controller
/// 2. `start()`: binds the configured address
/// 3. `serve()`: serves until shutdown, then drains
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    dispatcher: Arc<Dispatcher>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            listener: None,
            dispatcher,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Returns a shared reference to the shutdown controller.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `POST /invoke`: dispatch one envelope
    /// - `GET /health`: detailed health JSON
    /// - `GET /health/live`: liveness probe
    /// - `GET /health/ready`: readiness probe
    pub fn build_router(&self) -> Router {
        let state = AppState {
            dispatcher: Arc::clone(&self.dispatcher),
            shutdown: Arc::clone(&self.shutdown),
            start_time: Instant::now(),
        };

        Router::new()
            .route("/invoke", post(invoke_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the bound port, which differs from the configured one when
    /// port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "TCP listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves, then drains.
    ///
    /// The controller enters `Draining` the moment `shutdown` fires, while
    /// the server is still answering open invocations. Once the server has
    /// stopped, open invocations and then detached store calls each get up
    /// to `drain_timeout`. `Stopped` is set only if both finished.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first, if the TLS
    /// material cannot be loaded, or if the server hits a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .context("start() must be called before serve()")?;
        let router = self.build_router();
        let signal = self.shutdown.on_signal(shutdown);

        self.shutdown.set_ready();

        match self.config.tls {
            Some(ref tls) => serve_tls(listener, router, tls, signal).await?,
            None => serve_plain(listener, router, signal).await?,
        }

        let timeout = self.config.drain_timeout;
        let report = self
            .shutdown
            .drain(timeout, self.dispatcher.drain(timeout))
            .await;
        if !report.is_complete() {
            warn!(
                invocations_drained = report.invocations_drained,
                mutations_drained = report.mutations_drained,
                "shutdown left work unfinished"
            );
        }
        Ok(())
    }
}

async fn serve_plain(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("serving plain HTTP");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Serves TLS through `axum-server` with rustls, reusing the bound listener.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .context("failed to load TLS certificates")?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        shutdown.await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!(%addr, "serving HTTPS");

    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}
