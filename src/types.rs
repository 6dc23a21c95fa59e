use serde::{Deserialize, Serialize};

/// Which retrieval pipeline a source is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// JSON catalog API answering `ac=detail` queries.
    #[serde(alias = "apple-cms")]
    CmsApi,
    /// A single M3U8 document listing live channels.
    #[serde(alias = "m3u8")]
    Playlist,
}

impl SourceKind {
    /// Infer the kind from a registered URL: anything ending in `.m3u8` is a playlist.
    pub fn infer_from_url(url: &str) -> Self {
        if url.trim().to_ascii_lowercase().ends_with(".m3u8") { SourceKind::Playlist } else { SourceKind::CmsApi }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::CmsApi => "cms-api",
            SourceKind::Playlist => "playlist",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceStatus {
    #[default]
    Unknown,
    Testing,
    Available,
    Unavailable,
}

impl SourceStatus {
    /// Sources worth fanning a search out to.
    pub fn is_searchable(&self) -> bool {
        matches!(self, SourceStatus::Available | SourceStatus::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Unknown => "unknown",
            SourceStatus::Testing => "testing",
            SourceStatus::Available => "available",
            SourceStatus::Unavailable => "unavailable",
        }
    }
}

/// A registered catalog endpoint. `url` is the logical identity of a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub status: SourceStatus,
    // Only meaningful while status is Available. The registry keeps it out
    // of storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl Source {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>, kind: SourceKind) -> Self {
        Self { id: id.into(), name: name.into(), url: url.into(), kind, status: SourceStatus::Unknown, latency_ms: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub name: String,
    pub url: String,
}

/// A normalized catalog entry. Episodes are kept in playable order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub episodes: Vec<Episode>,
    pub remarks: String,
    pub source_id: String,
    pub source_name: String,
    pub source_kind: SourceKind,
}

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub status: SourceStatus,
    pub latency_ms: Option<u64>,
}

impl ProbeOutcome {
    pub fn available(latency_ms: u64) -> Self { Self { status: SourceStatus::Available, latency_ms: Some(latency_ms) } }
    pub fn unavailable() -> Self { Self { status: SourceStatus::Unavailable, latency_ms: None } }
}
