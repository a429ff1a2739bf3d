//! Gateway binary: load configuration, start listeners, wait for a signal.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use game_gateway::config::validation::validate_config;
use game_gateway::config::watcher::ConfigWatcher;
use game_gateway::config::{load_config, ConfigError, GatewayConfig};
use game_gateway::lifecycle::{signals, Shutdown};
use game_gateway::net::tls;
use game_gateway::observability::{logging, metrics};
use game_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "game-gateway")]
#[command(about = "Asset server and WebSocket to TCP proxy for the browser game client", long_about = None)]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "game-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        directory_roots = ?config.assets.directory_roots,
        resources_dir = %config.archive.resources_dir,
        default_backend = %format!("{}:{}", config.proxy.default_host, config.proxy.default_port),
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

    let server = GatewayServer::new(config.clone());

    // Held for the lifetime of the process; dropping it stops reloads.
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(watcher) => {
                    server.watch_config(updates);
                    Some(watcher)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    match config.listener.tls.clone() {
        None => server.run(listener, shutdown.subscribe()).await?,
        Some(tls_config) => {
            let https_port = tls_config
                .bind_address
                .parse::<SocketAddr>()
                .map(|addr| addr.port())
                .unwrap_or(443);
            tracing::info!(
                address = %listener.local_addr()?,
                https_port,
                "Redirecting plain HTTP to HTTPS"
            );

            let mut redirect_shutdown = shutdown.subscribe();
            let redirect = tokio::spawn(async move {
                axum::serve(listener, tls::redirect_router(https_port))
                    .with_graceful_shutdown(async move {
                        let _ = redirect_shutdown.recv().await;
                    })
                    .await
            });

            let served = tls::serve_tls(
                server.router(),
                &tls_config,
                shutdown.subscribe(),
                Duration::from_secs(config.timeouts.shutdown_secs),
            )
            .await;
            shutdown.trigger();
            served?;
            redirect.await??;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
