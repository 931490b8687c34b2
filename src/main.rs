//! kvgate service binary.
//!
//! # Architecture Overview
//!
//! ```text
//!   POST /api/contact ──▶ http::contact ──▶ security::RateLimiter
//!                                                 │
//!                                                 ▼
//!   GET /health ───────▶ http::health ──▶ connection::ConnectionManager ──▶ store
//!                                                 ▲          (redis | memory)
//!                                                 │
//!   SIGINT / SIGTERM ──▶ lifecycle::signals ──────┘ shutdown()
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use kvgate::config::load_config;
use kvgate::http::{HttpServer, LogSink};
use kvgate::lifecycle::{bootstrap, signals, Shutdown};
use kvgate::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "kvgate")]
#[command(about = "Shared cache connection manager and contact-form rate limiter", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, env = "KVGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the HTTP bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!("kvgate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.server.bind_address,
        cache_backend = ?config.cache.backend,
        contact_limit = config.contact_form.limit,
        contact_window_secs = config.contact_form.window_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let services = bootstrap(&config).await?;

    let shutdown = Shutdown::new();
    let hook = signals::install_shutdown_hook(shutdown.clone(), signals::termination_signal());

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(&config, services.clone(), Arc::new(LogSink));
    let result = server.run(listener, shutdown.subscribe()).await;

    // Close the cache only after the server has drained; it may also stop on
    // its own (e.g. accept error).
    shutdown.trigger();
    services.manager.shutdown().await;
    hook.abort();
    let _ = hook.await;

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}
