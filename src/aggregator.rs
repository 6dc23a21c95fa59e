use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tracing::{debug, info};

use crate::error::{AggregateError, SourceError};
use crate::fetch::SourceFetcher;
use crate::relay::RelayConfig;
use crate::types::{Source, SourceKind, Video};

/// Merged result of a fan-out search. Videos arrive in source-completion
/// order; within one source they keep the parsed order.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub videos: Vec<Video>,
    pub errors: Vec<String>,
}

impl SearchOutcome {
    pub fn is_partial(&self) -> bool { !self.errors.is_empty() }

    /// One message listing every failed source, for display.
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(format!("One or more sources failed to load:\n\n- {}", self.errors.join("\n- ")))
    }
}

/// Fans queries out to many sources and merges what comes back.
#[derive(Clone)]
pub struct Aggregator {
    fetcher: SourceFetcher,
}

impl Aggregator {
    pub fn new(fetcher: SourceFetcher) -> Self { Self { fetcher } }

    pub fn fetcher(&self) -> &SourceFetcher { &self.fetcher }

    /// Query every Available or Unknown source concurrently and wait for all
    /// of them. Per-source failures land in `errors`; they never abort the call.
    pub async fn search(
        &self,
        sources: &[Source],
        relay: &RelayConfig,
        query: &str,
        refresh: bool,
    ) -> Result<SearchOutcome, AggregateError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchOutcome::default());
        }
        let eligible: Vec<&Source> = sources.iter().filter(|s| s.status.is_searchable()).collect();
        if eligible.is_empty() {
            return Err(AggregateError::NoUsableSources);
        }
        debug!("Searching {} of {} sources for '{}'", eligible.len(), sources.len(), query);

        let (batches, failures) = settle_all(
            eligible.into_iter().map(|source| self.fetcher.fetch(source, relay, Some(query), None, refresh)),
        )
        .await;

        let videos: Vec<Video> = batches.into_iter().flatten().collect();
        let errors: Vec<String> = failures.iter().map(SourceError::to_string).collect();
        info!("Search '{}' returned {} videos ({} source failures)", query, videos.len(), errors.len());
        Ok(SearchOutcome { videos, errors })
    }

    /// List one category from the best available CMS source. `None` is the
    /// unfiltered front page.
    pub async fn browse_category(
        &self,
        sources: &[Source],
        relay: &RelayConfig,
        category_id: Option<&str>,
        refresh: bool,
    ) -> Result<Vec<Video>, AggregateError> {
        let source = pick_catalog_source(sources).ok_or(AggregateError::NoCatalogSource)?;
        debug!("Browsing category {:?} on {}", category_id, source.name);
        Ok(self.fetcher.fetch(source, relay, None, category_id, refresh).await?)
    }
}

/// First CMS source that is Available or Unknown, else the first CMS source at all.
pub fn pick_catalog_source(sources: &[Source]) -> Option<&Source> {
    let mut catalogs = sources.iter().filter(|s| s.kind == SourceKind::CmsApi);
    let first = catalogs.clone().next();
    catalogs.find(|s| s.status.is_searchable()).or(first)
}

/// Drive every future to completion and split the outcomes, in completion order.
pub async fn settle_all<I, F, T, E>(futures: I) -> (Vec<T>, Vec<E>)
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let mut pending: FuturesUnordered<F> = futures.into_iter().collect();
    let mut successes = Vec::new();
    let mut failures = Vec::new();
    while let Some(result) = pending.next().await {
        match result {
            Ok(v) => successes.push(v),
            Err(e) => failures.push(e),
        }
    }
    (successes, failures)
}

/// Group videos by source name: groups in first-seen order, videos in
/// original order within each group.
pub fn group_by_source_name(videos: &[Video]) -> Vec<(String, Vec<Video>)> {
    let mut groups: Vec<(String, Vec<Video>)> = Vec::new();
    for v in videos {
        match groups.iter_mut().find(|(name, _)| *name == v.source_name) {
            Some((_, list)) => list.push(v.clone()),
            None => groups.push((v.source_name.clone(), vec![v.clone()])),
        }
    }
    groups
}

/// Drop every video that came from `source_id`. Returns how many were removed.
pub fn purge_source_videos(videos: &mut Vec<Video>, source_id: &str) -> usize {
    let before = videos.len();
    videos.retain(|v| v.source_id != source_id);
    before - videos.len()
}
