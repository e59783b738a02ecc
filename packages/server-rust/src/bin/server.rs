//! recordgate-server binary.

use std::sync::Arc;

use clap::Parser;
use recordgate_server::logging::init_logging;
use recordgate_server::network::NetworkModule;
use recordgate_server::storage::{MemoryStore, RecordStore};
use recordgate_server::{Dispatcher, ServerConfig, StoreBackend};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(config.log_format);

    let store = build_store(&config).await?;
    let dispatcher = Arc::new(Dispatcher::new(store, config.dispatch_config()));

    let mut network = NetworkModule::new(config.network_config(), dispatcher);
    let port = network.start().await?;
    info!(
        port,
        table = %config.table_name,
        store = ?config.store,
        mutation_mode = ?config.mutation_mode,
        "recordgate-server started"
    );

    network.serve(shutdown_signal()).await?;
    info!("recordgate-server stopped");
    Ok(())
}

async fn build_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.store {
        StoreBackend::Memory => {
            let schema = config.key_schema();
            info!(table = %config.table_name, partition_key = %schema.partition_key, "using memory store");
            Ok(Arc::new(
                MemoryStore::new().with_table(config.table_name.clone(), schema),
            ))
        }
        #[cfg(feature = "dynamodb")]
        StoreBackend::Dynamodb => {
            use recordgate_server::storage::DynamoDbStore;
            Ok(Arc::new(DynamoDbStore::from_region(config.region.clone()).await))
        }
        #[cfg(not(feature = "dynamodb"))]
        StoreBackend::Dynamodb => {
            anyhow::bail!("the dynamodb store requires building with `--features dynamodb`")
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
