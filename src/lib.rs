pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod parsers;
pub mod prober;
pub mod registry;
pub mod relay;
pub mod storage;
pub mod types;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::aggregator::{group_by_source_name, purge_source_videos, SearchOutcome};
    pub use crate::config::Config;
    pub use crate::error::{AggregateError, RegistryError, SourceError};
    pub use crate::relay::{build_request_url, RelayConfig, RelayStyle};
    pub use crate::types::{Episode, ProbeOutcome, Source, SourceKind, SourceStatus, Video};
    pub use crate::Vodmux;
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::aggregator::{Aggregator, SearchOutcome};
use crate::cache::ResponseCache;
use crate::config::{Config, CUSTOM_RELAY_ID};
use crate::error::{AggregateError, RegistryError};
use crate::fetch::{ReqwestTransport, SourceFetcher, Transport};
use crate::prober::HealthProber;
use crate::registry::SourceRegistry;
use crate::relay::RelayConfig;
use crate::storage::{default_store_path, FileStorage, Storage};
use crate::types::{ProbeOutcome, Source, SourceKind, SourceStatus, Video};

pub const RELAY_KEY: &str = "vodmux-relay";

/// Persisted relay choice: a preset id plus the user's own prefix for `custom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySelection {
    pub preset: String,
    #[serde(default)]
    pub custom_url: Option<String>,
}

/// Async library entry point. Owns storage, the source registry, the cache
/// and the relay currently in effect.
pub struct Vodmux {
    config: Config,
    storage: Arc<dyn Storage>,
    registry: Mutex<SourceRegistry>,
    relay: RwLock<RelayConfig>,
    aggregator: Aggregator,
    prober: HealthProber,
}

impl Vodmux {
    /// Open with the file-backed store and a real HTTP client.
    pub async fn open(config: Config) -> Result<Self> {
        let path = match &config.storage.path {
            Some(p) => p.clone(),
            None => default_store_path()?,
        };
        let storage = FileStorage::open(&path).await.with_context(|| format!("opening store: {}", path.display()))?;
        let transport = ReqwestTransport::new(config.http.timeout(), &config.http.user_agent)?;
        Ok(Self::with_parts(config, Arc::new(storage), Arc::new(transport)).await)
    }

    /// Assemble from explicit parts; used by embedders and tests.
    pub async fn with_parts(config: Config, storage: Arc<dyn Storage>, transport: Arc<dyn Transport>) -> Self {
        let cache = ResponseCache::with_settings(storage.clone(), config.cache.namespace.clone(), config.cache.ttl());
        let fetcher = SourceFetcher::new(transport, cache);
        let registry = SourceRegistry::load(storage.clone(), &config.sources.0).await;
        let relay = match &config.relay.override_prefix {
            Some(_) => config.relay.initial_relay(),
            None => match load_relay_selection(storage.as_ref()).await {
                Some(sel) => config.relay.resolve(&sel.preset, sel.custom_url.as_deref()),
                None => config.relay.initial_relay(),
            },
        };
        Self {
            aggregator: Aggregator::new(fetcher.clone()),
            prober: HealthProber::new(fetcher),
            registry: Mutex::new(registry),
            relay: RwLock::new(relay),
            storage,
            config,
        }
    }

    pub fn config(&self) -> &Config { &self.config }

    // --- Sources ---

    pub async fn sources(&self) -> Vec<Source> { self.registry.lock().await.sources().to_vec() }

    pub async fn add_source(&self, name: &str, url: &str) -> Result<Source, RegistryError> {
        self.registry.lock().await.add(name, url).await
    }

    pub async fn add_source_with_kind(&self, name: &str, url: &str, kind: SourceKind) -> Result<Source, RegistryError> {
        self.registry.lock().await.add_with_kind(name, url, kind).await
    }

    /// Add an entry from the configured curated list by name (case-insensitive).
    pub async fn add_curated(&self, name: &str) -> Result<Source, RegistryError> {
        let curated = self
            .config
            .sources
            .0
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| RegistryError::UnknownCurated { name: name.to_string() })?;
        self.registry.lock().await.add_curated(curated).await
    }

    /// Remove a source and drop its entries from `results`.
    pub async fn remove_source(&self, id: &str, results: &mut Vec<Video>) -> Result<Source, RegistryError> {
        let removed = self.registry.lock().await.remove(id).await?;
        aggregator::purge_source_videos(results, &removed.id);
        Ok(removed)
    }

    // --- Relay ---

    pub async fn relay(&self) -> RelayConfig { self.relay.read().await.clone() }

    /// Switch relay preset (or `custom` with a prefix) and remember the choice.
    pub async fn set_relay(&self, preset: &str, custom_url: Option<&str>) -> Result<RelayConfig> {
        if preset != CUSTOM_RELAY_ID && self.config.relay.find_preset(preset).is_none() {
            anyhow::bail!("unknown relay preset '{preset}'");
        }
        let relay = self.config.relay.resolve(preset, custom_url);
        let selection = RelaySelection { preset: preset.to_string(), custom_url: custom_url.map(|u| u.trim().to_string()) };
        let payload = serde_json::to_string(&selection)?;
        if let Err(e) = self.storage.set(RELAY_KEY, &payload).await {
            warn!("Failed to persist relay selection: {:#}", e);
        }
        *self.relay.write().await = relay.clone();
        info!("Relay set to '{}' ({:?})", preset, relay.style());
        Ok(relay)
    }

    // --- Queries ---

    pub async fn search(&self, query: &str, refresh: bool) -> Result<SearchOutcome, AggregateError> {
        let sources = self.sources().await;
        let relay = self.relay().await;
        self.aggregator.search(&sources, &relay, query, refresh).await
    }

    pub async fn browse_category(&self, category_id: Option<&str>, refresh: bool) -> Result<Vec<Video>, AggregateError> {
        let sources = self.sources().await;
        let relay = self.relay().await;
        self.aggregator.browse_category(&sources, &relay, category_id, refresh).await
    }

    // --- Health ---

    pub async fn probe_source(&self, id: &str) -> Result<ProbeOutcome, RegistryError> {
        let source = {
            let mut reg = self.registry.lock().await;
            let source = reg.get(id).cloned().ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
            reg.mark_testing(&[source.id.clone()]).await;
            source
        };
        let relay = self.relay().await;
        let outcome = self.prober.probe_one(&source, &relay).await;
        self.record_outcome(&source.id, outcome).await;
        Ok(outcome)
    }

    /// Probe every registered source and record the results.
    pub async fn probe_all(&self) -> HashMap<String, ProbeOutcome> {
        let sources = {
            let mut reg = self.registry.lock().await;
            let ids: Vec<String> = reg.sources().iter().map(|s| s.id.clone()).collect();
            reg.mark_testing(&ids).await;
            reg.sources().to_vec()
        };
        let relay = self.relay().await;
        let outcomes = self.prober.probe_all(&sources, &relay).await;
        for (id, outcome) in &outcomes {
            self.record_outcome(id, *outcome).await;
        }
        outcomes
    }

    async fn record_outcome(&self, id: &str, outcome: ProbeOutcome) {
        // The source may have been removed while the probe was in flight.
        if let Err(e) = self.registry.lock().await.set_status(id, outcome.status, outcome.latency_ms).await {
            warn!("Dropping probe result: {}", e);
        }
    }

    // --- Cache ---

    /// Remove cached responses, optionally only those for one source URL.
    pub async fn clear_cache(&self, url_prefix: Option<&str>) -> u64 {
        self.aggregator.fetcher().cache().clear(url_prefix).await
    }

    /// Approximate bytes held by cached responses.
    pub async fn cache_size(&self) -> u64 {
        self.aggregator.fetcher().cache().size_bytes().await
    }

    pub async fn source_status(&self, id: &str) -> Option<SourceStatus> {
        self.registry.lock().await.get(id).map(|s| s.status)
    }
}

async fn load_relay_selection(storage: &dyn Storage) -> Option<RelaySelection> {
    let raw = storage.get(RELAY_KEY).await.ok().flatten()?;
    match serde_json::from_str(&raw) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!("Ignoring unreadable relay selection: {}", e);
            None
        }
    }
}
