//! GRF-backed archive index.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::grf::{self, GrfTable};
use super::manifest::parse_manifest;
use super::{ArchiveError, ArchiveIndex};
use crate::config::ArchiveConfig;

/// Archive index reading GRF containers listed in a manifest.
///
/// Every lookup opens its container and drops the handle before returning.
/// With `cache_tables` the parsed entry tables are kept per container id so
/// only the entry bytes are read on later lookups.
#[derive(Debug, Clone)]
pub struct GrfArchiveIndex {
    resources_dir: PathBuf,
    manifest_path: PathBuf,
    tables: Option<Arc<DashMap<String, Arc<GrfTable>>>>,
}

impl GrfArchiveIndex {
    pub fn new(config: &ArchiveConfig) -> Self {
        let resources_dir = PathBuf::from(&config.resources_dir);
        Self {
            manifest_path: resources_dir.join(&config.manifest),
            resources_dir,
            tables: config.cache_tables.then(|| Arc::new(DashMap::new())),
        }
    }

    /// Number of containers whose table is currently cached.
    pub fn cached_tables(&self) -> usize {
        self.tables.as_ref().map(|t| t.len()).unwrap_or(0)
    }

    fn container_path(&self, container: &str) -> PathBuf {
        self.resources_dir.join(container)
    }
}

fn load_table(
    path: &Path,
    container: &str,
    reader: &mut BufReader<File>,
    tables: Option<&DashMap<String, Arc<GrfTable>>>,
) -> Result<Arc<GrfTable>, ArchiveError> {
    if let Some(cached) = tables.and_then(|t| t.get(container).map(|e| Arc::clone(e.value()))) {
        return Ok(cached);
    }

    let table = Arc::new(grf::read_table(reader)?);
    tracing::debug!(
        container = %path.display(),
        entries = table.len(),
        "Archive table loaded"
    );
    if let Some(tables) = tables {
        tables.insert(container.to_string(), Arc::clone(&table));
    }
    Ok(table)
}

#[async_trait]
impl ArchiveIndex for GrfArchiveIndex {
    async fn list_containers(&self) -> Vec<String> {
        match tokio::fs::read_to_string(&self.manifest_path).await {
            Ok(text) => parse_manifest(&text),
            Err(e) => {
                tracing::debug!(
                    manifest = %self.manifest_path.display(),
                    error = %e,
                    "Archive manifest unavailable, no containers"
                );
                Vec::new()
            }
        }
    }

    async fn lookup(&self, container: &str, name: &str) -> Result<Option<Bytes>, ArchiveError> {
        let path = self.container_path(container);
        let container = container.to_string();
        let name = name.to_string();
        let tables = self.tables.clone();

        tokio::task::spawn_blocking(move || -> Result<Option<Bytes>, ArchiveError> {
            let mut reader = BufReader::new(File::open(&path)?);
            let table = load_table(&path, &container, &mut reader, tables.as_deref())?;
            match table.get(&name) {
                Some(entry) if entry.is_file() => {
                    grf::read_entry(&mut reader, &name, entry).map(|data| Some(Bytes::from(data)))
                }
                _ => Ok(None),
            }
        })
        .await?
    }
}
