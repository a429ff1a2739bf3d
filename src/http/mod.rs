//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, single entry handler)
//!     → request.rs (request ID)
//!     → WebSocket upgrade → session::SessionFactory
//!     → asset route       → assets::AssetResolver (directories, archives)
//!     → other GET         → static roots, blank favicon
//!     → response.rs (content headers, cache, CORS)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
