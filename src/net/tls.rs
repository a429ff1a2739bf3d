//! TLS listener and plain-HTTP redirect.
//!
//! # Data Flow
//! ```text
//! http://host[:80]/path  ──► 301 Location: https://host[:port]/path
//! https://host/path      ──► gateway router (rustls)
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::{
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio::sync::broadcast;

use crate::config::TlsConfig;

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    if !cert_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

/// Serve `app` over TLS until the shutdown signal fires.
pub async fn serve_tls(
    app: Router,
    tls: &TlsConfig,
    mut shutdown: broadcast::Receiver<()>,
    grace: Duration,
) -> Result<(), std::io::Error> {
    let addr: SocketAddr = tls.bind_address.parse().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid TLS bind address {:?}: {e}", tls.bind_address),
        )
    })?;
    let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;

    let handle = Handle::new();
    let signal = handle.clone();
    tokio::spawn(async move {
        let _ = shutdown.recv().await;
        signal.graceful_shutdown(Some(grace));
    });

    tracing::info!(address = %addr, "TLS listener starting");
    axum_server::bind_rustls(addr, rustls)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
}

/// Router answering every request with a redirect to HTTPS.
pub fn redirect_router(https_port: u16) -> Router {
    Router::new().fallback(move |headers: HeaderMap, uri: Uri| async move {
        redirect_to_https(&headers, &uri, https_port)
    })
}

fn redirect_to_https(headers: &HeaderMap, uri: &Uri, https_port: u16) -> Response {
    let Some(host) = headers.get(header::HOST).and_then(|h| h.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, "Missing Host header").into_response();
    };
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, https_location(host, path, https_port))],
    )
        .into_response()
}

/// Build the HTTPS URL for `host` (port dropped) and `path`.
pub fn https_location(host: &str, path: &str, https_port: u16) -> String {
    let hostname = match host.strip_prefix('[') {
        Some(rest) => match rest.split_once(']') {
            Some((v6, _)) => format!("[{v6}]"),
            None => host.to_string(),
        },
        None => host.split(':').next().unwrap_or(host).to_string(),
    };
    if https_port == 443 {
        format!("https://{hostname}{path}")
    } else {
        format!("https://{hostname}:{https_port}{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn location_drops_http_port() {
        assert_eq!(
            https_location("game.example:80", "/data/a.txt?v=1", 443),
            "https://game.example/data/a.txt?v=1"
        );
        assert_eq!(https_location("game.example", "/", 8443), "https://game.example:8443/");
        assert_eq!(https_location("[::1]:8080", "/x", 443), "https://[::1]/x");
    }

    #[test]
    fn redirect_is_permanent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8080"));
        let uri: Uri = "/index.html".parse().unwrap();

        let response = redirect_to_https(&headers, &uri, 443);
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "https://localhost/index.html");
    }

    #[test]
    fn redirect_needs_host() {
        let uri: Uri = "/".parse().unwrap();
        let response = redirect_to_https(&HeaderMap::new(), &uri, 443);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_certificate_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_tls_config(&dir.path().join("cert.pem"), &dir.path().join("key.pem"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
