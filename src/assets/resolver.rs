//! Layered asset resolution.
//!
//! # Responsibilities
//! - Normalize the request path and refuse traversal
//! - Probe directory tiers in priority order
//! - Fall back to archive containers in manifest order
//! - Rewrite scripts, derive content type and cache directive
//!
//! # Design Decisions
//! - Tiers are an ordered list of probes; the first one producing bytes wins
//! - Archive tiers are only listed once every directory tier has missed
//! - A failing tier is logged and treated as a miss; the chain continues

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use super::mime;
use super::normalize::{self, PathError};
use super::transform::{LuaRequireRewrite, Passthrough, ScriptTransform};
use crate::archive::{ArchiveIndex, GrfArchiveIndex, NoArchives};
use crate::config::{AssetConfig, GatewayConfig};
use crate::observability::metrics;

const NO_CACHE: &str = "no-cache";

/// One ranked backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateTier {
    Directory(PathBuf),
    Archive(String),
}

impl CandidateTier {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CandidateTier::Directory(_) => "directory",
            CandidateTier::Archive(_) => "archive",
        }
    }
}

impl fmt::Display for CandidateTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateTier::Directory(root) => write!(f, "dir:{}", root.display()),
            CandidateTier::Archive(id) => write!(f, "archive:{}", id),
        }
    }
}

/// A request being resolved.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    /// Path as received.
    pub logical_path: String,
    /// Typo-fixed, query-stripped, percent-decoded path.
    pub normalized_path: String,
    /// Entry name used for archive tiers.
    pub archive_name: String,
    /// Tiers to probe, in order.
    pub tiers: Vec<CandidateTier>,
}

/// A successfully resolved asset.
#[derive(Debug, Clone)]
pub struct ResolvedAsset {
    pub bytes: Bytes,
    pub source_tier: CandidateTier,
    pub content_type: String,
    /// `None` means no `Cache-Control` header.
    pub cache_directive: Option<String>,
}

/// No tier produced the requested asset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("asset not found: {path}")]
pub struct NotFound {
    pub path: String,
}

/// Resolves asset paths against directory and archive tiers.
pub struct AssetResolver {
    config: AssetConfig,
    roots: Vec<PathBuf>,
    archives: Arc<dyn ArchiveIndex>,
    transform: Arc<dyn ScriptTransform>,
}

impl AssetResolver {
    pub fn new(
        config: AssetConfig,
        archives: Arc<dyn ArchiveIndex>,
        transform: Arc<dyn ScriptTransform>,
    ) -> Self {
        let roots = config.directory_roots.iter().map(PathBuf::from).collect();
        Self {
            config,
            roots,
            archives,
            transform,
        }
    }

    /// Resolver for the asset routes: configured roots, GRF archives, Lua rewrite.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.assets.clone(),
            Arc::new(GrfArchiveIndex::new(&config.archive)),
            Arc::new(LuaRequireRewrite),
        )
    }

    /// Resolver for plain static serving: directories only, no rewrite, no caching.
    pub fn static_files(config: &GatewayConfig) -> Self {
        let assets = AssetConfig {
            directory_roots: config.static_files.roots.clone(),
            cache_control: None,
            script_extensions: Vec::new(),
            decode_categories: Vec::new(),
            ..config.assets.clone()
        };
        Self::new(assets, Arc::new(NoArchives), Arc::new(Passthrough))
    }

    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    /// True when the path's first segment is one of the asset route prefixes
    /// and something follows it.
    pub fn handles(&self, path: &str) -> bool {
        let mut segments = path.trim_start_matches('/').splitn(2, '/');
        let first = segments.next().unwrap_or_default();
        let rest = segments.next().unwrap_or_default();
        !rest.is_empty()
            && self
                .config
                .route_prefixes
                .iter()
                .any(|prefix| prefix.eq_ignore_ascii_case(first))
    }

    /// Build the request with its directory tiers.
    pub fn plan(&self, request_path: &str) -> Result<AssetRequest, PathError> {
        let normalized_path = normalize::normalize(request_path);
        normalize::safe_segments(&normalized_path)?;

        let archive_name = normalize::to_archive_name(&normalize::decode_category_segment(
            &normalized_path,
            &self.config.decode_categories,
        ));

        Ok(AssetRequest {
            logical_path: request_path.to_string(),
            normalized_path,
            archive_name,
            tiers: self
                .roots
                .iter()
                .cloned()
                .map(CandidateTier::Directory)
                .collect(),
        })
    }

    /// Resolve a request path to bytes and response metadata.
    pub async fn resolve(&self, request_path: &str) -> Result<ResolvedAsset, NotFound> {
        let start = Instant::now();
        let not_found = || NotFound {
            path: request_path.to_string(),
        };

        let mut request = match self.plan(request_path) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(path = %request_path, error = %e, "Rejected asset path");
                metrics::record_asset_not_found();
                return Err(not_found());
            }
        };

        let mut hit = self.first_hit(&request, 0).await;
        if hit.is_none() {
            let start_index = request.tiers.len();
            request.tiers.extend(
                self.archives
                    .list_containers()
                    .await
                    .into_iter()
                    .map(CandidateTier::Archive),
            );
            hit = self.first_hit(&request, start_index).await;
        }

        let Some((bytes, source_tier)) = hit else {
            tracing::debug!(path = %request.normalized_path, tiers = request.tiers.len(), "Asset not found");
            metrics::record_asset_not_found();
            return Err(not_found());
        };

        let bytes = self.apply_transform(&request.normalized_path, bytes);
        let asset = ResolvedAsset {
            content_type: mime::content_type_for(
                &request.normalized_path,
                &self.config.default_content_type,
            ),
            cache_directive: self.cache_directive(&request.normalized_path),
            bytes,
            source_tier,
        };

        metrics::record_asset_served(asset.source_tier.kind(), start);
        Ok(asset)
    }

    async fn first_hit(
        &self,
        request: &AssetRequest,
        from: usize,
    ) -> Option<(Bytes, CandidateTier)> {
        for tier in &request.tiers[from..] {
            if let Some(bytes) = self.probe(tier, request).await {
                return Some((bytes, tier.clone()));
            }
        }
        None
    }

    async fn probe(&self, tier: &CandidateTier, request: &AssetRequest) -> Option<Bytes> {
        match tier {
            CandidateTier::Directory(root) => probe_directory(root, &request.normalized_path).await,
            CandidateTier::Archive(container) => {
                match self.archives.lookup(container, &request.archive_name).await {
                    Ok(found) => found,
                    Err(e) => {
                        tracing::warn!(
                            container = %container,
                            name = %request.archive_name,
                            error = %e,
                            "Archive lookup failed, trying next tier"
                        );
                        None
                    }
                }
            }
        }
    }

    fn apply_transform(&self, path: &str, bytes: Bytes) -> Bytes {
        let is_script = normalize::extension(path).is_some_and(|ext| {
            self.config
                .script_extensions
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        });
        if !is_script {
            return bytes;
        }

        match self.transform.transform(&bytes) {
            Ok(rewritten) => Bytes::from(rewritten),
            Err(e) => {
                tracing::debug!(path = %path, error = %e, "Script left untransformed");
                bytes
            }
        }
    }

    fn cache_directive(&self, path: &str) -> Option<String> {
        let name = normalize::file_name(path);
        if self.config.bootstrap_scripts.iter().any(|s| s == name) {
            return Some(NO_CACHE.to_string());
        }
        self.config
            .cache_control
            .clone()
            .filter(|directive| !directive.trim().is_empty())
    }
}

async fn probe_directory(root: &Path, normalized_path: &str) -> Option<Bytes> {
    let path = normalize::join_under(normalized_path, root).ok()?;
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return None,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Directory tier unreadable");
            return None;
        }
    }
    match tokio::fs::read(&path).await {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Directory tier read failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingIndex {
        containers: Vec<String>,
        entries: HashMap<(String, String), Bytes>,
        broken: Vec<String>,
        list_calls: AtomicUsize,
        lookups: std::sync::Mutex<Vec<(String, String)>>,
    }

    impl CountingIndex {
        fn with(containers: &[&str], entries: &[(&str, &str, &[u8])]) -> Self {
            Self {
                containers: containers.iter().map(|s| s.to_string()).collect(),
                entries: entries
                    .iter()
                    .map(|(c, n, b)| ((c.to_string(), n.to_string()), Bytes::copy_from_slice(b)))
                    .collect(),
                ..Default::default()
            }
        }

        fn lookups(&self) -> Vec<(String, String)> {
            self.lookups.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ArchiveIndex for CountingIndex {
        async fn list_containers(&self) -> Vec<String> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.containers.clone()
        }

        async fn lookup(&self, container: &str, name: &str) -> Result<Option<Bytes>, ArchiveError> {
            self.lookups
                .lock()
                .unwrap()
                .push((container.to_string(), name.to_string()));
            if self.broken.iter().any(|b| b == container) {
                return Err(ArchiveError::BadSignature);
            }
            Ok(self
                .entries
                .get(&(container.to_string(), name.to_string()))
                .cloned())
        }
    }

    struct Fixture {
        _dirs: Vec<tempfile::TempDir>,
        roots: Vec<PathBuf>,
    }

    fn fixture(root_count: usize) -> Fixture {
        let dirs: Vec<_> = (0..root_count).map(|_| tempfile::tempdir().unwrap()).collect();
        let roots = dirs.iter().map(|d| d.path().to_path_buf()).collect();
        Fixture { _dirs: dirs, roots }
    }

    fn write(root: &Path, rel: &str, data: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn resolver(fx: &Fixture, index: Arc<CountingIndex>) -> AssetResolver {
        let config = AssetConfig {
            directory_roots: fx.roots.iter().map(|p| p.display().to_string()).collect(),
            cache_control: Some("public, max-age=43200".into()),
            ..AssetConfig::default()
        };
        AssetResolver::new(config, index, Arc::new(LuaRequireRewrite))
    }

    #[tokio::test]
    async fn first_directory_tier_wins_without_touching_archives() {
        let fx = fixture(2);
        write(&fx.roots[0], "data/a.txt", b"primary");
        write(&fx.roots[1], "data/a.txt", b"secondary");
        let index = Arc::new(CountingIndex::with(&["data.grf"], &[("data.grf", "data\\a.txt", b"grf")]));

        let asset = resolver(&fx, index.clone()).resolve("/data/a.txt").await.unwrap();

        assert_eq!(asset.bytes, Bytes::from_static(b"primary"));
        assert_eq!(asset.source_tier, CandidateTier::Directory(fx.roots[0].clone()));
        assert_eq!(index.list_calls.load(Ordering::SeqCst), 0);
        assert!(index.lookups().is_empty());
    }

    #[tokio::test]
    async fn second_directory_tier_before_archives() {
        let fx = fixture(2);
        write(&fx.roots[1], "BGM/01.mp3", b"music");
        let index = Arc::new(CountingIndex::default());

        let asset = resolver(&fx, index.clone()).resolve("/BGM/01.mp3").await.unwrap();

        assert_eq!(asset.bytes, Bytes::from_static(b"music"));
        assert_eq!(asset.content_type, "audio/mpeg");
        assert_eq!(index.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn archives_probed_in_manifest_order() {
        let fx = fixture(1);
        let index = Arc::new(CountingIndex::with(
            &["cdata.grf", "rdata.grf", "data.grf"],
            &[
                ("rdata.grf", "data\\sprite\\a.spr", b"from rdata"),
                ("data.grf", "data\\sprite\\a.spr", b"from data"),
            ],
        ));

        let asset = resolver(&fx, index.clone()).resolve("/data/sprite/a.spr").await.unwrap();

        assert_eq!(asset.bytes, Bytes::from_static(b"from rdata"));
        assert_eq!(asset.source_tier, CandidateTier::Archive("rdata.grf".into()));
        let probed: Vec<_> = index.lookups().into_iter().map(|(c, _)| c).collect();
        assert_eq!(probed, vec!["cdata.grf", "rdata.grf"]);
    }

    #[tokio::test]
    async fn broken_container_is_skipped() {
        let fx = fixture(1);
        let mut index = CountingIndex::with(
            &["cdata.grf", "data.grf"],
            &[("data.grf", "data\\x.txt", b"ok")],
        );
        index.broken = vec!["cdata.grf".into()];

        let asset = resolver(&fx, Arc::new(index)).resolve("/data/x.txt").await.unwrap();
        assert_eq!(asset.bytes, Bytes::from_static(b"ok"));
    }

    #[tokio::test]
    async fn category_names_are_decoded_for_archives() {
        let fx = fixture(1);
        let index = Arc::new(CountingIndex::with(
            &["data.grf"],
            &[("data.grf", "data\\sprite\\a b.spr", b"spr")],
        ));

        let asset = resolver(&fx, index.clone())
            .resolve("/data/sprite/a%2520b.spr")
            .await
            .unwrap();

        assert_eq!(asset.bytes, Bytes::from_static(b"spr"));
        assert_eq!(index.lookups()[0].1, "data\\sprite\\a b.spr");
    }

    #[tokio::test]
    async fn korean_entry_names_resolve_from_containers() {
        use crate::archive::grf::build_container_raw;
        use crate::config::ArchiveConfig;

        let fx = fixture(1);
        std::fs::write(fx.roots[0].join("DATA.INI"), "[Data]\n1=data.grf\n").unwrap();
        std::fs::write(
            fx.roots[0].join("data.grf"),
            build_container_raw(&[
                (b"data\\sprite\\\xC0\xCE.spr".as_slice(), b"in".as_slice(), 1),
                (b"data\\sprite\\\xB0\xA3.spr".as_slice(), b"gan".as_slice(), 1),
            ]),
        )
        .unwrap();
        let archives = GrfArchiveIndex::new(&ArchiveConfig {
            resources_dir: fx.roots[0].display().to_string(),
            manifest: "DATA.INI".into(),
            cache_tables: true,
        });
        let config = AssetConfig {
            directory_roots: vec![fx.roots[0].display().to_string()],
            ..AssetConfig::default()
        };
        let resolver = AssetResolver::new(config, Arc::new(archives), Arc::new(Passthrough));

        let asset = resolver.resolve("/data/sprite/%C0%CE.spr").await.unwrap();
        assert_eq!(asset.bytes, Bytes::from_static(b"in"));
        assert_eq!(asset.source_tier, CandidateTier::Archive("data.grf".into()));

        let asset = resolver.resolve("/data/sprite/%25B0%25A3.spr").await.unwrap();
        assert_eq!(asset.bytes, Bytes::from_static(b"gan"));

        assert!(resolver.resolve("/data/sprite/%EF%BF%BD.spr").await.is_err());
    }

    #[tokio::test]
    async fn missing_everywhere_is_not_found() {
        let fx = fixture(2);
        let index = Arc::new(CountingIndex::with(&["data.grf"], &[]));

        let err = resolver(&fx, index.clone()).resolve("/data/none.txt").await.unwrap_err();

        assert_eq!(err.path, "/data/none.txt");
        assert_eq!(index.lookups().len(), 1);
    }

    #[tokio::test]
    async fn empty_manifest_is_not_found() {
        let fx = fixture(1);
        let err = resolver(&fx, Arc::new(CountingIndex::default()))
            .resolve("/data/none.txt")
            .await
            .unwrap_err();
        assert_eq!(err, NotFound { path: "/data/none.txt".into() });
    }

    #[tokio::test]
    async fn traversal_never_reaches_a_tier() {
        let fx = fixture(1);
        let index = Arc::new(CountingIndex::default());
        let result = resolver(&fx, index.clone()).resolve("/data/%2e%2e/%2e%2e/etc/passwd").await;
        assert!(result.is_err());
        assert_eq!(index.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scripts_are_rewritten_from_any_tier() {
        let fx = fixture(1);
        write(&fx.roots[0], "AI/AI.lua", b"dofile(\"AI\\Const.lua\")");
        let index = Arc::new(CountingIndex::with(
            &["data.grf"],
            &[("data.grf", "data\\luafiles514\\x.lub", b"dofile 'Util.lua'")],
        ));
        let resolver = resolver(&fx, index);

        let from_dir = resolver.resolve("/AI//AI.lua.lua").await.unwrap();
        assert_eq!(from_dir.bytes, Bytes::from_static(b"require(\"AI/Const.lua\")"));

        let from_archive = resolver.resolve("/data/luafiles514/x.lub").await.unwrap();
        assert_eq!(from_archive.bytes, Bytes::from_static(b"require(\"Util.lua\")"));
    }

    #[tokio::test]
    async fn failed_transform_serves_original_bytes() {
        let fx = fixture(1);
        let bytecode = [0x1b, b'L', b'u', b'a', 0xff, 0xfe];
        write(&fx.roots[0], "data/x.lub", &bytecode);

        let asset = resolver(&fx, Arc::new(CountingIndex::default()))
            .resolve("/data/x.lub")
            .await
            .unwrap();
        assert_eq!(asset.bytes.as_ref(), bytecode.as_slice());
    }

    #[tokio::test]
    async fn headers_follow_configuration() {
        let fx = fixture(1);
        write(&fx.roots[0], "data/blob.zzz", b"?");
        write(&fx.roots[0], "data/Online.js", b"js");
        let resolver = resolver(&fx, Arc::new(CountingIndex::default()));

        let blob = resolver.resolve("/data/blob.zzz").await.unwrap();
        assert_eq!(blob.content_type, "application/octet-stream");
        assert_eq!(blob.cache_directive.as_deref(), Some("public, max-age=43200"));

        let bootstrap = resolver.resolve("/data/Online.js").await.unwrap();
        assert_eq!(bootstrap.content_type, "text/javascript");
        assert_eq!(bootstrap.cache_directive.as_deref(), Some("no-cache"));
    }

    #[tokio::test]
    async fn static_files_emit_no_cache_header() {
        let fx = fixture(1);
        write(&fx.roots[0], "index.html", b"<html>");
        let mut config = GatewayConfig::default();
        config.static_files.roots = vec![fx.roots[0].display().to_string()];

        let asset = AssetResolver::static_files(&config).resolve("/index.html").await.unwrap();
        assert_eq!(asset.content_type, "text/html");
        assert!(asset.cache_directive.is_none());
    }

    #[test]
    fn route_prefixes_are_case_insensitive() {
        let fx = fixture(1);
        let resolver = resolver(&fx, Arc::new(CountingIndex::default()));
        assert!(resolver.handles("/data/sprite/a.spr"));
        assert!(resolver.handles("/SYSTEM/iteminfo.lub"));
        assert!(resolver.handles("/systemen/x"));
        assert!(!resolver.handles("/data/"));
        assert!(!resolver.handles("/index.html"));
        assert!(!resolver.handles("/database/x"));
    }
}
