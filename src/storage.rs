use anyhow::{Context, Result};
use async_trait::async_trait;
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Key-value medium shared by the source registry and the response cache.
/// Each user keeps to its own key namespace.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Per-session storage; nothing survives the process.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // a poisoned map is still a valid map
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> { Ok(self.lock().get(key).cloned()) }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> { Ok(self.lock().keys().cloned().collect()) }
}

/// A single JSON object file, rewritten after every mutation.
pub struct FileStorage {
    path: PathBuf,
    entries: tokio::sync::Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| format!("creating storage dir: {}", parent.display()))?;
        }
        let entries = match tokio::fs::read_to_string(path).await {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Storage file {} is unreadable ({}); starting empty", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e).with_context(|| format!("reading storage file: {}", path.display())),
        };
        Ok(Self { path: path.to_path_buf(), entries: tokio::sync::Mutex::new(entries) })
    }

    pub fn path(&self) -> &Path { &self.path }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let text = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, text).await.with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path).await.with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> { Ok(self.entries.lock().await.get(key).cloned()) }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> { Ok(self.entries.lock().await.keys().cloned().collect()) }
}

pub fn default_store_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "vodmux", "vodmux")
        .context("unable to determine data directory for the default store")?;
    Ok(proj.data_dir().join("store.json"))
}
