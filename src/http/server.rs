//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single entry handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Hand WebSocket upgrades to the session factory
//! - Dispatch asset routes to the resolver, everything else to static roots
//! - Swap the asset resolver when the configuration file changes

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ws::WebSocketUpgrade, ConnectInfo, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Method, Request},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::assets::AssetResolver;
use crate::config::GatewayConfig;
use crate::http::request::{self, RequestIdExt};
use crate::http::response;
use crate::session::SessionFactory;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Resolver for the asset routes. Replaced on config reload.
    pub assets: Arc<ArcSwap<AssetResolver>>,
    /// Resolver for everything else.
    pub static_files: Arc<AssetResolver>,
    pub sessions: SessionFactory,
    pub log_http: bool,
}

/// HTTP front of the gateway.
pub struct GatewayServer {
    router: Router,
    state: AppState,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a new server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let state = AppState {
            assets: Arc::new(ArcSwap::from_pointee(AssetResolver::from_config(&config))),
            static_files: Arc::new(AssetResolver::static_files(&config)),
            sessions: SessionFactory::new(config.proxy.clone()),
            log_http: config.observability.log_http,
        };

        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            state,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .fallback(entry)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(request::propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(request::set_request_id_layer())
    }

    /// The fully layered router, for serving on another listener (TLS).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Apply asset and archive changes from reloaded configurations.
    pub fn watch_config(&self, mut updates: mpsc::UnboundedReceiver<GatewayConfig>) -> JoinHandle<()> {
        let assets = Arc::clone(&self.state.assets);
        let mut current = self.config.clone();

        tokio::spawn(async move {
            while let Some(next) = updates.recv().await {
                if next.assets == current.assets && next.archive == current.archive {
                    tracing::debug!("Config reloaded, asset settings unchanged");
                    continue;
                }
                assets.store(Arc::new(AssetResolver::from_config(&next)));
                tracing::info!(
                    directory_roots = ?next.assets.directory_roots,
                    resources_dir = %next.archive.resources_dir,
                    "Asset resolver reloaded"
                );
                current = next;
            }
        })
    }

    /// Run the server until the shutdown signal fires.
    ///
    /// In-flight requests get `timeouts.shutdown_secs` to finish after the signal.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        let sessions = self.state.sessions.clone();
        let grace = Duration::from_secs(self.config.timeouts.shutdown_secs);
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let (draining_tx, draining_rx) = watch::channel(false);
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
                let _ = draining_tx.send(true);
            })
            .into_future();
        drain_with_deadline(serve, draining_rx, grace).await?;

        tracing::info!(
            active_sessions = sessions.tracker().active_count(),
            "Gateway stopped"
        );
        Ok(())
    }
}

/// Drive `serve` to completion, abandoning it `grace` after draining starts.
async fn drain_with_deadline<F>(
    serve: F,
    mut draining: watch::Receiver<bool>,
    grace: Duration,
) -> Result<(), std::io::Error>
where
    F: Future<Output = Result<(), std::io::Error>>,
{
    let deadline = async move {
        if draining.wait_for(|started| *started).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        served = serve => served,
        _ = deadline => {
            tracing::warn!(grace_secs = grace.as_secs(), "Shutdown deadline passed, dropping open connections");
            Ok(())
        }
    }
}

/// Single entry point for every request.
async fn entry(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (mut parts, _body) = request.into_parts();

    if is_websocket_upgrade(&parts.headers) {
        return upgrade(state, peer, &mut parts).await;
    }
    if parts.method != Method::GET {
        return response::not_found();
    }

    let path = parts.uri.path();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(path);
    let request_id = parts.headers.request_id();

    let assets = state.assets.load_full();
    if assets.handles(path) {
        return match assets.resolve(path_and_query).await {
            Ok(asset) => {
                if state.log_http {
                    tracing::info!(
                        request_id = %request_id,
                        path = %path,
                        tier = %asset.source_tier,
                        len = asset.bytes.len(),
                        "Asset served"
                    );
                }
                response::asset_response(asset, true)
            }
            Err(e) => {
                tracing::debug!(request_id = %request_id, error = %e, "Asset request missed");
                response::not_found()
            }
        };
    }

    let lookup = if path.ends_with('/') {
        format!("{path}index.html")
    } else {
        path_and_query.to_string()
    };
    match state.static_files.resolve(&lookup).await {
        Ok(asset) => {
            if state.log_http {
                tracing::info!(request_id = %request_id, path = %path, "Static file served");
            }
            response::asset_response(asset, false)
        }
        Err(_) if path.eq_ignore_ascii_case("/favicon.ico") => response::blank_favicon(),
        Err(_) => {
            tracing::debug!(request_id = %request_id, path = %path, "No route");
            response::not_found()
        }
    }
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Complete the handshake and start a proxy session on the upgraded socket.
async fn upgrade(state: AppState, peer: SocketAddr, parts: &mut Parts) -> Response {
    let ws = match WebSocketUpgrade::from_request_parts(parts, &state).await {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::debug!(peer = %peer, error = %rejection, "WebSocket upgrade rejected");
            return rejection.into_response();
        }
    };

    let path = parts.uri.path().to_string();
    let sessions = state.sessions;
    ws.on_failed_upgrade(move |e| {
        tracing::warn!(peer = %peer, error = %e, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| async move {
        sessions.create(peer, &path).run(socket).await;
    })
}
