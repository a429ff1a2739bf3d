//! WebSocket to TCP relay for one client.
//!
//! # Data Flow
//! ```text
//! client frame (binary/text) ──► bytes ──► backend socket
//! backend chunk ──► binary frame ──► client
//! ```
//!
//! # Design Decisions
//! - Two pumps run concurrently, each owning one direction
//! - Write failures are logged and the pump keeps going
//! - The end of either source closes the session through [`Lifecycle::close`];
//!   the winner terminates the opposite endpoint and the other pump detaches
//! - No reconnect: a failed backend connect closes the client

use std::fmt;
use std::sync::Arc;

use axum::extract::ws::Message;
use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::lifecycle::{CloseCause, Lifecycle, SessionState};
use super::target::TargetSpec;
use super::tracker::{SessionGuard, SessionId};
use crate::observability::metrics;

/// Read buffer for backend chunks.
const READ_BUFFER: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to connect to backend {target}: {source}")]
    Connect {
        target: TargetSpec,
        #[source]
        source: std::io::Error,
    },
}

/// Open the backend connection with Nagle disabled.
pub async fn connect_backend(target: &TargetSpec) -> Result<TcpStream, SessionError> {
    let stream = TcpStream::connect((target.host.as_str(), target.port))
        .await
        .map_err(|source| SessionError::Connect {
            target: target.clone(),
            source,
        })?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(backend = %target, error = %e, "Failed to set TCP_NODELAY");
    }
    Ok(stream)
}

/// One client bound to one backend connection.
#[derive(Debug)]
pub struct ProxySession {
    target: TargetSpec,
    debug: bool,
    lifecycle: Arc<Lifecycle>,
    guard: SessionGuard,
}

impl ProxySession {
    pub fn new(guard: SessionGuard, target: TargetSpec, debug: bool) -> Self {
        Self {
            target,
            debug,
            lifecycle: Arc::new(Lifecycle::new()),
            guard,
        }
    }

    pub fn id(&self) -> SessionId {
        self.guard.id()
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.lifecycle)
    }

    /// Connect to the backend and relay until either side closes.
    pub async fn run<S, E>(self, client: S)
    where
        S: Stream<Item = Result<Message, E>> + Sink<Message> + Send + Unpin,
        <S as Sink<Message>>::Error: fmt::Display,
        E: fmt::Display,
    {
        let (mut client_tx, client_rx) = client.split::<Message>();
        tracing::debug!(session_id = %self.id(), backend = %self.target, "Connecting to backend");

        let backend = match connect_backend(&self.target).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(session_id = %self.id(), error = %e, "Backend connect failed");
                if self.lifecycle.close(CloseCause::ConnectFailed) {
                    if let Err(e) = client_tx.close().await {
                        tracing::debug!(session_id = %self.id(), error = %e, "Client close failed");
                    }
                }
                return;
            }
        };

        if !self.lifecycle.activate() {
            return;
        }
        tracing::info!(session_id = %self.id(), backend = %self.target, "Session active");

        let (backend_rx, backend_tx) = backend.into_split();
        self.relay(client_rx, client_tx, backend_rx, backend_tx).await;

        tracing::info!(session_id = %self.id(), backend = %self.target, "Session closed");
    }

    /// Pump both directions until the session is closed.
    pub async fn relay<CR, CW, BR, BW, E>(&self, client_rx: CR, client_tx: CW, backend_rx: BR, backend_tx: BW)
    where
        CR: Stream<Item = Result<Message, E>> + Unpin,
        CW: Sink<Message> + Unpin,
        CW::Error: fmt::Display,
        BR: AsyncRead + Unpin,
        BW: AsyncWrite + Unpin,
        E: fmt::Display,
    {
        tokio::join!(
            self.client_to_backend(client_rx, backend_tx),
            self.backend_to_client(backend_rx, client_tx),
        );
    }

    async fn client_to_backend<CR, BW, E>(&self, mut client_rx: CR, mut backend_tx: BW)
    where
        CR: Stream<Item = Result<Message, E>> + Unpin,
        BW: AsyncWrite + Unpin,
        E: fmt::Display,
    {
        let mut detached = self.lifecycle.detached();

        loop {
            let next = tokio::select! {
                _ = detached.wait_for(|closed| *closed) => return,
                next = client_rx.next() => next,
            };

            let data: &[u8] = match &next {
                Some(Ok(Message::Binary(data))) => &data[..],
                Some(Ok(Message::Text(text))) => text.as_str().as_bytes(),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(session_id = %self.id(), ?frame, "Client sent close");
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!(session_id = %self.id(), error = %e, "Client socket error");
                    continue;
                }
                None => break,
            };

            if self.debug {
                tracing::debug!(
                    session_id = %self.id(),
                    port = self.target.port,
                    len = data.len(),
                    first_byte = ?data.first(),
                    "client -> backend"
                );
            }
            match backend_tx.write_all(data).await {
                Ok(()) => metrics::record_relay_bytes("upstream", data.len()),
                Err(e) => {
                    tracing::warn!(session_id = %self.id(), error = %e, "Backend write failed");
                }
            }
        }

        if self.lifecycle.close(CloseCause::Client) {
            tracing::debug!(session_id = %self.id(), "Client closed, shutting down backend");
            if let Err(e) = backend_tx.shutdown().await {
                tracing::debug!(session_id = %self.id(), error = %e, "Backend shutdown failed");
            }
        }
    }

    async fn backend_to_client<BR, CW>(&self, mut backend_rx: BR, mut client_tx: CW)
    where
        BR: AsyncRead + Unpin,
        CW: Sink<Message> + Unpin,
        CW::Error: fmt::Display,
    {
        let mut detached = self.lifecycle.detached();
        let mut buf = vec![0u8; READ_BUFFER];

        loop {
            let read = tokio::select! {
                _ = detached.wait_for(|closed| *closed) => return,
                read = backend_rx.read(&mut buf) => read,
            };

            let n = match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(session_id = %self.id(), error = %e, "Backend socket error");
                    break;
                }
            };

            if self.debug {
                tracing::debug!(
                    session_id = %self.id(),
                    port = self.target.port,
                    len = n,
                    first_byte = buf[0],
                    "backend -> client"
                );
            }
            match client_tx.send(Message::Binary(Bytes::copy_from_slice(&buf[..n]))).await {
                Ok(()) => metrics::record_relay_bytes("downstream", n),
                Err(e) => {
                    tracing::warn!(session_id = %self.id(), error = %e, "Client write failed");
                }
            }
        }

        if self.lifecycle.close(CloseCause::Backend) {
            tracing::debug!(session_id = %self.id(), "Backend closed, closing client");
            if let Err(e) = client_tx.close().await {
                tracing::debug!(session_id = %self.id(), error = %e, "Client close failed");
            }
        }
    }
}
