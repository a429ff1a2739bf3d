//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Plain listener (bind_address)
//!     → gateway router, or 301 to HTTPS when TLS is configured
//! TLS listener (tls.bind_address)
//!     → tls.rs (rustls handshake) → gateway router
//! ```

pub mod tls;
