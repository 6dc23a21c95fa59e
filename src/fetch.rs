use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{norm_query, ResponseCache};
use crate::error::SourceError;
use crate::parsers::{looks_like_markup, parse_playlist, transform_cms};
use crate::relay::RelayConfig;
use crate::types::{Source, SourceKind, Video};

/// Plain-text notices some CMS backends send instead of JSON when free-text
/// search is disabled ("search not supported yet", "search is forbidden").
const SEARCH_UNSUPPORTED_MARKERS: &[&str] = &["暂不支持搜索", "禁止搜索"];

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self { Self { status: 200, reason: "OK".into(), body: body.into() } }
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
}

/// The network boundary. Errors are low-level transport failures
/// (DNS, connect, TLS, timeout, body read).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

/// Per-kind retrieval pipelines: relay, cache, request, parse.
#[derive(Clone)]
pub struct SourceFetcher {
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
}

impl SourceFetcher {
    pub fn new(transport: Arc<dyn Transport>, cache: ResponseCache) -> Self { Self { transport, cache } }

    pub fn cache(&self) -> &ResponseCache { &self.cache }

    /// Fetch one source. The query is trimmed with inner whitespace collapsed.
    /// `refresh` skips the cache read; successful results are written back
    /// either way.
    pub async fn fetch(
        &self,
        source: &Source,
        relay: &RelayConfig,
        query: Option<&str>,
        category: Option<&str>,
        refresh: bool,
    ) -> Result<Vec<Video>, SourceError> {
        // The cache key has to describe exactly what is requested and filtered.
        let query = query.map(norm_query).filter(|q| !q.is_empty());
        let query = query.as_deref();
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let result = match source.kind {
            SourceKind::CmsApi => self.fetch_cms(source, relay, query, category, refresh).await,
            SourceKind::Playlist => self.fetch_playlist(source, relay, query, category, refresh).await,
        };
        if let Err(e) = &result {
            warn!("Fetching from {} failed: {}", source.name, e);
        }
        result
    }

    async fn fetch_cms(
        &self,
        source: &Source,
        relay: &RelayConfig,
        query: Option<&str>,
        category: Option<&str>,
        refresh: bool,
    ) -> Result<Vec<Video>, SourceError> {
        let key = self.cache.key(&source.url, query, category);
        if !refresh {
            if let Some(hit) = self.cache.get(&key).await {
                return Ok(hit);
            }
        }

        let api_url = cms_request_url(source, query, category)?;
        let resp = self.request(source, relay, &api_url).await?;

        let value: serde_json::Value = match serde_json::from_str(&resp.body) {
            Ok(v) => v,
            Err(e) => {
                if query.is_some() && SEARCH_UNSUPPORTED_MARKERS.iter().any(|m| resp.body.contains(m)) {
                    debug!("{} does not support search; treating as empty", source.name);
                    return Ok(Vec::new());
                }
                if looks_like_markup(&resp.body) {
                    return Err(SourceError::format(
                        &source.name,
                        "the API returned XML/HTML; check that the url is a CMS JSON API",
                    ));
                }
                return Err(SourceError::format(&source.name, format!("response is not valid JSON: {e}")));
            }
        };

        let videos = transform_cms(&value, source)?;
        self.cache.put(&key, &videos).await;
        Ok(videos)
    }

    async fn fetch_playlist(
        &self,
        source: &Source,
        relay: &RelayConfig,
        query: Option<&str>,
        category: Option<&str>,
        refresh: bool,
    ) -> Result<Vec<Video>, SourceError> {
        // Live playlists have no categories.
        if category.is_some() {
            return Ok(Vec::new());
        }
        let key = self.cache.key(&source.url, query, None);
        if !refresh {
            if let Some(hit) = self.cache.get(&key).await {
                return Ok(hit);
            }
        }

        let resp = self.request(source, relay, &source.url).await?;
        let videos = parse_playlist(&resp.body, source, query)?;
        self.cache.put(&key, &videos).await;
        Ok(videos)
    }

    async fn request(&self, source: &Source, relay: &RelayConfig, target: &str) -> Result<HttpResponse, SourceError> {
        let url = relay.resolve(target);
        debug!("GET {} (source: {})", url, source.name);
        let resp = self
            .transport
            .get(&url)
            .await
            .map_err(|e| SourceError::transport(&source.name, format!("{e:#}")))?;
        if !resp.is_success() {
            return Err(SourceError::transport(&source.name, format!("HTTP {} {}", resp.status, resp.reason).trim_end().to_string()));
        }
        Ok(resp)
    }
}

/// `<base>?ac=detail` plus `wd=<query>` or, failing that, `t=<category>`.
pub fn cms_request_url(source: &Source, query: Option<&str>, category: Option<&str>) -> Result<String, SourceError> {
    let mut url = Url::parse(&source.url)
        .map_err(|_| SourceError::InvalidUrl { source_name: source.name.clone(), url: source.url.clone() })?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("ac", "detail");
        if let Some(q) = query {
            pairs.append_pair("wd", q);
        } else if let Some(t) = category {
            pairs.append_pair("t", t);
        }
    }
    Ok(url.to_string())
}
