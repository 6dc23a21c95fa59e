use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::config::CuratedSource;
use crate::error::RegistryError;
use crate::storage::Storage;
use crate::types::{Source, SourceKind, SourceStatus};

pub const REGISTRY_KEY: &str = "vodmux-sources";

// On-disk form. Reading is lenient since older records may lack `kind` or
// `status`; latency is never written.
#[derive(Serialize, Deserialize)]
struct StoredSource {
    id: String,
    name: String,
    url: String,
    #[serde(default, alias = "type")]
    kind: Option<SourceKind>,
    #[serde(default)]
    status: Option<SourceStatus>,
}

impl From<StoredSource> for Source {
    fn from(s: StoredSource) -> Self {
        let kind = s.kind.unwrap_or_else(|| SourceKind::infer_from_url(&s.url));
        let mut source = Source::new(s.id, s.name, s.url, kind);
        // A probe that never finished leaves nothing to trust.
        source.status = match s.status.unwrap_or_default() {
            SourceStatus::Testing => SourceStatus::Unknown,
            status => status,
        };
        source
    }
}

impl From<&Source> for StoredSource {
    fn from(s: &Source) -> Self {
        Self { id: s.id.clone(), name: s.name.clone(), url: s.url.clone(), kind: Some(s.kind), status: Some(s.status) }
    }
}

/// Owns the ordered list of registered sources and keeps it persisted.
pub struct SourceRegistry {
    storage: Arc<dyn Storage>,
    sources: Vec<Source>,
}

impl SourceRegistry {
    /// Restore the persisted registry, or seed it from `curated` when nothing
    /// usable is stored.
    pub async fn load(storage: Arc<dyn Storage>, curated: &[CuratedSource]) -> Self {
        let stored = match storage.get(REGISTRY_KEY).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read source registry: {:#}", e);
                None
            }
        };
        let restored = stored.and_then(|raw| match serde_json::from_str::<Vec<StoredSource>>(&raw) {
            Ok(list) => Some(list.into_iter().map(Source::from).collect::<Vec<_>>()),
            Err(e) => {
                warn!("Stored source registry is corrupt ({}); using curated defaults", e);
                None
            }
        });
        let mut registry = Self { storage, sources: Vec::new() };
        match restored {
            Some(sources) => registry.sources = sources,
            None => {
                registry.sources = curated.iter().map(|c| Source::new(c.url.clone(), c.name.clone(), c.url.clone(), c.kind)).collect();
                registry.persist().await;
            }
        }
        info!("Source registry loaded with {} sources", registry.sources.len());
        registry
    }

    pub fn sources(&self) -> &[Source] { &self.sources }
    pub fn len(&self) -> usize { self.sources.len() }
    pub fn is_empty(&self) -> bool { self.sources.is_empty() }
    pub fn get(&self, id: &str) -> Option<&Source> { self.sources.iter().find(|s| s.id == id) }

    /// Register a new source, inferring its kind from the URL.
    pub async fn add(&mut self, name: &str, url: &str) -> Result<Source, RegistryError> {
        self.add_with_kind(name, url, SourceKind::infer_from_url(url)).await
    }

    pub async fn add_with_kind(&mut self, name: &str, url: &str, kind: SourceKind) -> Result<Source, RegistryError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.insert(Source::new(id, name.trim(), url.trim(), kind)).await
    }

    /// Register an entry from the curated list; its URL doubles as its id.
    pub async fn add_curated(&mut self, curated: &CuratedSource) -> Result<Source, RegistryError> {
        self.insert(Source::new(curated.url.clone(), curated.name.clone(), curated.url.clone(), curated.kind)).await
    }

    async fn insert(&mut self, source: Source) -> Result<Source, RegistryError> {
        if self.sources.iter().any(|s| s.url == source.url) {
            return Err(RegistryError::Duplicate { url: source.url });
        }
        if Url::parse(&source.url).is_err() {
            return Err(RegistryError::InvalidUrl { url: source.url });
        }
        self.sources.push(source.clone());
        self.persist().await;
        info!("Added source {} ({})", source.name, source.url);
        Ok(source)
    }

    pub async fn remove(&mut self, id: &str) -> Result<Source, RegistryError> {
        let idx = self.sources.iter().position(|s| s.id == id).ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
        let removed = self.sources.remove(idx);
        self.persist().await;
        info!("Removed source {}", removed.name);
        Ok(removed)
    }

    /// Record a status; latency is kept only while Available.
    pub async fn set_status(&mut self, id: &str, status: SourceStatus, latency_ms: Option<u64>) -> Result<(), RegistryError> {
        let source = self.sources.iter_mut().find(|s| s.id == id).ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
        source.status = status;
        source.latency_ms = if status == SourceStatus::Available { latency_ms } else { None };
        self.persist().await;
        Ok(())
    }

    pub async fn mark_testing(&mut self, ids: &[String]) {
        for s in self.sources.iter_mut().filter(|s| ids.contains(&s.id)) {
            s.status = SourceStatus::Testing;
            s.latency_ms = None;
        }
        self.persist().await;
    }

    async fn persist(&self) {
        let stored: Vec<StoredSource> = self.sources.iter().map(StoredSource::from).collect();
        let payload = match serde_json::to_string(&stored) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to serialize source registry: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(REGISTRY_KEY, &payload).await {
            warn!("Failed to persist source registry: {:#}", e);
        }
    }
}
