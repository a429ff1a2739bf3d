//! Archive container subsystem.
//!
//! # Data Flow
//! ```text
//! AssetResolver (directory tiers missed)
//!     → index.rs  list_containers(): manifest.rs parses DATA.INI, key-sorted
//!     → index.rs  lookup(container, name) per container, first hit wins
//!         → grf.rs opens the container, reads the entry table, inflates the entry
//! ```
//!
//! # Design Decisions
//! - The resolver only sees the `ArchiveIndex` trait; GRF is one implementation
//! - Containers are opened per lookup and the handle is dropped on every path
//! - A missing manifest is an empty container list, never an error

pub mod grf;
pub mod index;
pub mod manifest;

use async_trait::async_trait;
use bytes::Bytes;

pub use index::GrfArchiveIndex;
pub use manifest::parse_manifest;

/// Errors raised while reading an archive container.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a GRF container")]
    BadSignature,

    #[error("unsupported GRF version {0:#x}")]
    UnsupportedVersion(u32),

    #[error("corrupt container: {0}")]
    Corrupt(&'static str),

    #[error("entry '{0}' is encrypted")]
    Encrypted(String),

    #[error("archive task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Ordered set of sealed containers queried by entry name.
#[async_trait]
pub trait ArchiveIndex: Send + Sync {
    /// Container ids in probe order. Never fails; a missing manifest is empty.
    async fn list_containers(&self) -> Vec<String>;

    /// Read `name` from `container`. `Ok(None)` means the entry does not exist.
    async fn lookup(&self, container: &str, name: &str) -> Result<Option<Bytes>, ArchiveError>;
}

/// An index with no containers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoArchives;

#[async_trait]
impl ArchiveIndex for NoArchives {
    async fn list_containers(&self) -> Vec<String> {
        Vec::new()
    }

    async fn lookup(&self, _container: &str, _name: &str) -> Result<Option<Bytes>, ArchiveError> {
        Ok(None)
    }
}
