//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;

use flate2::{write::ZlibEncoder, Compression};
use game_gateway::config::GatewayConfig;
use game_gateway::{GatewayServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start the gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    (addr, shutdown)
}

/// Start a TCP backend that echoes every byte it receives.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => {
                                    if socket.write_all(&buf[..n]).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Start a TCP backend that sends `greeting` to each client and hangs up.
pub async fn start_greeting_backend(greeting: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(greeting).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Build a GRF 0x200 container holding plain file entries.
pub fn build_grf(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    let mut table = Vec::new();
    for (name, content) in entries {
        let packed = deflate(content);
        let offset = body.len() as u32;
        body.extend_from_slice(&packed);

        table.extend_from_slice(name.as_bytes());
        table.push(0);
        table.extend_from_slice(&(packed.len() as u32).to_le_bytes());
        table.extend_from_slice(&(packed.len() as u32).to_le_bytes());
        table.extend_from_slice(&(content.len() as u32).to_le_bytes());
        table.push(0x01);
        table.extend_from_slice(&offset.to_le_bytes());
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"Master of Magic\0");
    out.extend_from_slice(&[0u8; 14]);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u32 + 7).to_le_bytes());
    out.extend_from_slice(&0x200u32.to_le_bytes());
    out.extend_from_slice(&body);

    let packed_table = deflate(&table);
    out.extend_from_slice(&(packed_table.len() as u32).to_le_bytes());
    out.extend_from_slice(&(table.len() as u32).to_le_bytes());
    out.extend_from_slice(&packed_table);
    out
}

fn write(path: &Path, content: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Lay out a client install under a temp dir and point a config at it.
///
/// ```text
/// resources/data/local.txt            directory tier
/// resources/DATA.INI                  1=custom.grf, 2=data.grf
/// resources/custom.grf                data\override.txt, data\luafiles514\init.lua
/// resources/data.grf                  data\override.txt, data\only.txt
/// public/index.html, public/Online.js static roots
/// ```
pub fn asset_fixture() -> (tempfile::TempDir, GatewayConfig) {
    let dir = tempfile::tempdir().unwrap();
    let resources = dir.path().join("resources");
    let public = dir.path().join("public");

    write(&resources.join("data/local.txt"), b"from directory");
    write(&resources.join("DATA.INI"), b"[Data]\r\n2=data.grf\r\n1=custom.grf\r\n");
    write(
        &resources.join("custom.grf"),
        &build_grf(&[
            ("data\\override.txt", b"custom"),
            ("data\\luafiles514\\init.lua", br#"dofile("AI\Const.lua")"#),
        ]),
    );
    write(
        &resources.join("data.grf"),
        &build_grf(&[
            ("data\\override.txt", b"stock"),
            ("data\\only.txt", b"only in data.grf"),
        ]),
    );
    write(&public.join("index.html"), b"<html></html>");
    write(&public.join("Online.js"), b"// bootstrap");

    let mut config = GatewayConfig::default();
    config.assets.directory_roots = vec![resources.display().to_string()];
    config.archive.resources_dir = resources.display().to_string();
    config.static_files.roots = vec![public.display().to_string()];
    (dir, config)
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
