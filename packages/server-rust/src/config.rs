//! Command-line and environment configuration for the server binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use recordgate_core::DEFAULT_TABLE_NAME;

use crate::logging::LogFormat;
use crate::network::{NetworkConfig, TlsConfig};
use crate::service::{DispatchConfig, MutationMode};
use crate::storage::KeySchema;

/// Which [`RecordStore`](crate::storage::RecordStore) backs the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreBackend {
    /// Process-local tables. Contents are lost on exit.
    #[default]
    Memory,
    /// AWS DynamoDB. Requires the `dynamodb` cargo feature.
    Dynamodb,
}

/// recordgate server: routes `{operation, payload}` envelopes to a record
/// store over HTTP.
#[derive(Debug, Clone, Parser)]
#[command(name = "recordgate-server", version, about)]
pub struct ServerConfig {
    /// Bind address.
    #[arg(long, env = "RECORDGATE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port. 0 picks a free port.
    #[arg(long, env = "RECORDGATE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Table every store-bound payload addresses.
    #[arg(long, env = "RECORDGATE_TABLE", default_value = DEFAULT_TABLE_NAME)]
    pub table_name: String,

    /// AWS region for the DynamoDB client.
    #[arg(long, env = "AWS_REGION", default_value = "us-east-2")]
    pub region: String,

    /// Record store backend.
    #[arg(long, env = "RECORDGATE_STORE", value_enum, default_value_t = StoreBackend::Memory)]
    pub store: StoreBackend,

    /// Partition key attribute of the memory table.
    #[arg(long, default_value = "id")]
    pub partition_key: String,

    /// Sort key attribute of the memory table, if any.
    #[arg(long)]
    pub sort_key: Option<String>,

    /// Whether `update` and `delete` wait for the store.
    #[arg(long, env = "RECORDGATE_MUTATION_MODE", value_enum, default_value_t = MutationMode::FireAndForget)]
    pub mutation_mode: MutationMode,

    /// Log output format.
    #[arg(long, env = "RECORDGATE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Allowed CORS origin. Repeatable; `*` allows any.
    #[arg(long = "cors-origin", default_values_t = ["*".to_string()])]
    pub cors_origins: Vec<String>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Seconds to wait for in-flight work at shutdown.
    #[arg(long, default_value_t = 30)]
    pub drain_timeout_secs: u64,

    /// PEM certificate chain. Enables TLS together with `--tls-key`.
    #[arg(long, requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key.
    #[arg(long, requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,
}

impl ServerConfig {
    /// Dispatcher settings.
    #[must_use]
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            table_name: self.table_name.clone(),
            mutation_mode: self.mutation_mode,
        }
    }

    /// HTTP host settings.
    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        let tls = match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: cert.clone(),
                key_path: key.clone(),
            }),
            _ => None,
        };
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            tls,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
        }
    }

    /// Key schema of the memory table.
    #[must_use]
    pub fn key_schema(&self) -> KeySchema {
        match &self.sort_key {
            Some(sort) => KeySchema::composite(self.partition_key.clone(), sort.clone()),
            None => KeySchema::partition(self.partition_key.clone()),
        }
    }
}
