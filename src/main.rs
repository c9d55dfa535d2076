//! OCPP Central System - CLI server
//!
//! ```sh
//! # Run with default config (~/.config/ocpp-central/config.toml)
//! ocpp-central
//!
//! # Custom config path, in-memory storage
//! ocpp-central --config /etc/ocpp-central/config.toml --in-memory
//!
//! # Start a transaction automatically whenever a connector reports Preparing
//! ocpp-central --auto-start --auto-start-delay-ms 500
//!
//! # Validate config without starting
//! ocpp-central --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use ocpp_central::config::AppConfig;
use ocpp_central::server::{init_tracing, ServerHandle};

/// OCPP 1.6 Central System for EV charging stations.
#[derive(Parser, Debug)]
#[command(
    name = "ocpp-central",
    version,
    about = "OCPP 1.6 Central System for EV charging station management",
    long_about = "OCPP-J 1.6 WebSocket server recording charge points, connectors, \
                  transactions and meter values.\n\n\
                  Default config: ~/.config/ocpp-central/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "OCPP_CONFIG")]
    config: Option<PathBuf>,

    /// Override the WebSocket listen host.
    #[arg(long)]
    host: Option<String>,

    /// Override the WebSocket listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the SQLite database file.
    #[arg(long)]
    db: Option<String>,

    /// Keep all data in memory.
    #[arg(long)]
    in_memory: bool,

    /// Expose Prometheus metrics on this port.
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Remote-start a transaction when a connector reports Preparing.
    #[arg(long)]
    auto_start: bool,

    #[arg(long)]
    auto_start_delay_ms: Option<u64>,

    #[arg(long)]
    auto_start_id_tag: Option<String>,

    /// Emit an audit record per handled message.
    #[arg(long)]
    audit: bool,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref db) = self.db {
            config.database.path = db.clone();
        }
        if self.in_memory {
            config.database.in_memory = true;
        }
        if let Some(port) = self.metrics_port {
            config.metrics.port = Some(port);
        }
        if self.auto_start {
            config.auto_start.enabled = true;
        }
        if let Some(delay) = self.auto_start_delay_ms {
            config.auto_start.delay_ms = delay;
        }
        if let Some(ref id_tag) = self.auto_start_id_tag {
            config.auto_start.id_tag = id_tag.clone();
        }
        if self.audit {
            config.audit.enabled = true;
        }
        if let Some(ref level) = self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(ocpp_central::default_config_path);

    let loaded = AppConfig::load(&config_path);
    let mut config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => AppConfig::default(),
    };
    cli.apply(&mut config);

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        loaded?;
        config.validate()?;
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   WS address  : {}", config.server.address());
        if config.database.in_memory {
            println!("   Database    : in-memory");
        } else {
            println!("   Database    : {}", config.database.path);
        }
        println!("   Heartbeat   : {}s", config.server.heartbeat_interval);
        println!("   Auto-start  : {}", config.auto_start.enabled);
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    init_tracing(&config);
    match loaded {
        Ok(_) => info!("Configuration loaded from {}", config_path.display()),
        Err(e) => {
            error!("Failed to load config: {}", e);
            error!("Using default configuration.");
        }
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(config).await?;
    handle.install_signal_handler();

    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.wait().await;

    Ok(())
}
