//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → listeners stop accepting → in-flight requests drain → exit
//! ```
//!
//! # Design Decisions
//! - Both listeners give open connections `timeouts.shutdown_secs` to drain, then drop them
//! - Live proxy sessions are not drained; they end with the process

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
