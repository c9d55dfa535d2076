//! Central system runtime.
//!
//! [`ServerHandle`] wires storage, plugins, the session manager and the
//! OCPP WebSocket server together and owns graceful shutdown, so the
//! binary only parses flags and waits.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::PrometheusBuilder;
use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

use crate::application::plugins::{AuditLogPlugin, MetricsPlugin, PluginPipeline};
use crate::application::session::{SessionManager, SharedSessionManager};
use crate::config::AppConfig;
use crate::domain::RepositoryProvider;
use crate::infrastructure::database::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
use crate::infrastructure::storage::InMemoryStorage;
use crate::interfaces::ws::OcppServer;
use crate::support::shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Handle to a running central system.
pub struct ServerHandle {
    pub repos: Arc<dyn RepositoryProvider>,
    pub sessions: SharedSessionManager,
    pub config: AppConfig,
    /// Address the WebSocket listener is bound to.
    pub local_addr: SocketAddr,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownCoordinator,
    ws_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Start the central system:
    /// 1. Install the Prometheus exporter (when a metrics port is set)
    /// 2. Open storage and run migrations
    /// 3. Register plugins
    /// 4. Bind and spawn the OCPP WebSocket server
    pub async fn start(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        info!("Starting OCPP central system...");

        if let Some(port) = config.metrics.port {
            install_metrics_exporter(port);
        }

        let (repos, db) = open_storage(&config).await?;

        let mut plugins = PluginPipeline::new();
        plugins.register(Arc::new(MetricsPlugin::new()));
        if config.audit.enabled {
            plugins.register(Arc::new(AuditLogPlugin::new()));
        }
        info!(plugins = ?plugins.names(), "Plugins registered");

        let settings = config.protocol_settings();
        if settings.auto_start.enabled {
            info!(
                delay_ms = settings.auto_start.delay.as_millis() as u64,
                id_tag = settings.auto_start.id_tag.as_str(),
                "Auto-start enabled"
            );
        }

        let sessions = Arc::new(SessionManager::new(
            repos.clone(),
            Arc::new(plugins),
            Arc::new(settings),
        ));

        let shutdown = ShutdownCoordinator::new(config.shutdown_timeout());
        let server =
            OcppServer::bind(&config.server.address(), sessions.clone(), shutdown.signal())
                .await?;
        let local_addr = server.local_addr()?;
        let ws_task = tokio::spawn(server.run());

        info!("🚀 Central system started on ws://{}", local_addr);

        Ok(Self {
            repos,
            sessions,
            config,
            local_addr,
            db,
            shutdown,
            ws_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for shutdown, let the server close every session within the
    /// shutdown timeout, then release storage.
    pub async fn wait(self) {
        let ws_task = self.ws_task;
        let completed = self
            .shutdown
            .shutdown_with_cleanup(|| async move {
                if let Err(e) = ws_task.await {
                    error!("WebSocket server task panicked: {}", e);
                }
            })
            .await;
        if !completed {
            warn!(
                remaining = self.sessions.count(),
                "Sessions still open after shutdown timeout"
            );
        }

        if let Some(db) = self.db {
            if let Err(e) = db.close().await {
                warn!("Error closing database connection: {}", e);
            } else {
                info!("✅ Database connection closed");
            }
        }

        info!("👋 Central system shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        self.trigger_shutdown();
        self.wait().await;
    }
}

async fn open_storage(
    config: &AppConfig,
) -> Result<(Arc<dyn RepositoryProvider>, Option<DatabaseConnection>), sea_orm::DbErr> {
    if config.database.in_memory {
        info!("Using in-memory storage, nothing will be persisted");
        return Ok((Arc::new(InMemoryStorage::new()), None));
    }

    let db_config: DatabaseConfig = config.database.connection();
    let db = init_database(&db_config).await?;
    Ok((Arc::new(SeaOrmRepositoryProvider::new(db.clone())), Some(db)))
}

/// The global recorder can only be installed once per process.
fn install_metrics_exporter(port: u16) {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        match PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
        {
            Ok(()) => info!("📊 Prometheus exporter listening on :{}/metrics", port),
            Err(e) => error!("Failed to install Prometheus exporter: {}", e),
        }
    });
}

/// Initialize tracing from the logging section. `RUST_LOG` wins over
/// the configured level.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
