use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamvault_api::{AppState, create_router};
use streamvault_engine::{
    MediaBackend, ObjectStoreAdapter, RemoteAdapter, SourceRegistry, VideoSource,
};
use streamvault_store::{S3Config, S3StorageGateway, build_s3_client};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
            log_level: "info".to_string(),
        }
    }
}

/// Full gateway configuration: the `[server]` listener knobs, the `[s3]`
/// bucket the upload protocol writes to, and the `[sources]` table mapping
/// logical video ids to their backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub s3: S3Config,
    #[serde(default)]
    pub sources: HashMap<String, VideoSource>,
}

pub struct StreamVaultServer {
    config: GatewayConfig,
}

impl StreamVaultServer {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        self.setup_tracing()?;

        tracing::info!("Starting StreamVault gateway...");

        // One S3 client serves both the upload gateway and ranged reads.
        let s3_client = build_s3_client(&self.config.s3).await?;
        let gateway = Arc::new(S3StorageGateway::new(s3_client.clone(), &self.config.s3));

        let registry = Arc::new(SourceRegistry::new(self.config.sources.clone()));
        let backend = Arc::new(MediaBackend::new(
            ObjectStoreAdapter::new(s3_client),
            RemoteAdapter::new(reqwest::Client::new()),
        ));

        tracing::info!(
            bucket = %self.config.s3.bucket,
            sources = registry.len(),
            "gateway wired to object storage"
        );

        let app_state = AppState {
            registry,
            backend,
            gateway,
        };

        let app = create_router().with_state(app_state);

        let addr: SocketAddr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        )
        .parse()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("StreamVault gateway listening on http://{}", addr);
        tracing::info!("Health check available at: http://{}/health", addr);
        tracing::info!("Upload protocol available at: http://{}/upload", addr);
        tracing::info!("Video streaming available at: http://{}/videos", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    fn setup_tracing(&self) -> Result<()> {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.config.server.log_level));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM signal handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}
