//! Edge gateway for a browser-hosted game client.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                    GATEWAY                        │
//!   Browser              │  ┌─────────┐   ┌──────────┐                       │
//!   ─────────────────────┼─▶│   net   │──▶│   http   │                       │
//!                        │  │ tls/301 │   │  server  │                       │
//!                        │  └─────────┘   └────┬─────┘                       │
//!                        │          upgrade    │    GET                      │
//!                        │        ┌────────────┴─────────────┐               │
//!                        │        ▼                          ▼               │
//!                        │  ┌──────────┐              ┌────────────┐         │
//!                        │  │ session  │              │   assets   │         │
//!                        │  │ ws ⇄ tcp │              │  resolver  │         │
//!                        │  └────┬─────┘              └─────┬──────┘         │
//!                        │       │                directories│ archive       │
//!                        └───────┼──────────────────────────┼────────────────┘
//!                                ▼                          ▼
//!                          game servers              resources/, *.grf
//! ```

pub mod archive;
pub mod assets;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod session;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
