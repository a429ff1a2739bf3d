//! WebSocket to TCP proxy sessions.
//!
//! # Responsibilities
//! - Parse the backend target from the upgrade path
//! - Relay frames and bytes in both directions for the lifetime of a session
//! - Tear down both endpoints exactly once, whichever side closes first
//!
//! # Data Flow
//! ```text
//! upgrade ──► SessionFactory::create ──► ProxySession::run
//!                                           ├── connect backend (TCP_NODELAY)
//!                                           ├── client → backend pump
//!                                           └── backend → client pump
//! ```

pub mod factory;
pub mod lifecycle;
pub mod proxy;
pub mod target;
pub mod tracker;

pub use factory::SessionFactory;
pub use lifecycle::{CloseCause, Lifecycle, SessionState};
pub use proxy::{connect_backend, ProxySession, SessionError};
pub use target::TargetSpec;
pub use tracker::{SessionGuard, SessionId, SessionTracker};
