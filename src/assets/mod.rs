//! Asset resolution subsystem.
//!
//! # Data Flow
//! ```text
//! GET /data/sprite/%C0%CE.spr
//!     → normalize.rs (typo fix, query strip, percent decode, traversal guard)
//!     → resolver.rs  directory tiers in priority order
//!     → resolver.rs  archive tiers in manifest order (crate::archive)
//!     → transform.rs script rewrite for .lua/.lub
//!     → mime.rs      content type
//!     → ResolvedAsset (bytes, tier, content type, cache directive)
//! ```

pub mod mime;
pub mod normalize;
pub mod resolver;
pub mod transform;

pub use resolver::{AssetRequest, AssetResolver, CandidateTier, NotFound, ResolvedAsset};
pub use transform::{LuaRequireRewrite, Passthrough, ScriptTransform, TransformError};
