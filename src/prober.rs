use futures::future::join_all;
use std::collections::HashMap;
use std::time::Instant;
use tracing::info;

use crate::fetch::SourceFetcher;
use crate::relay::RelayConfig;
use crate::types::{ProbeOutcome, Source};

/// Classifies sources as reachable or not by running a full, uncached
/// fetch-and-parse cycle and timing it.
#[derive(Clone)]
pub struct HealthProber {
    fetcher: SourceFetcher,
}

impl HealthProber {
    pub fn new(fetcher: SourceFetcher) -> Self { Self { fetcher } }

    pub async fn probe_one(&self, source: &Source, relay: &RelayConfig) -> ProbeOutcome {
        let start = Instant::now();
        let result = self.fetcher.fetch(source, relay, None, None, true).await;
        let elapsed = start.elapsed().as_millis() as u64;
        match result {
            Ok(videos) => {
                info!("Probe {}: available in {} ms ({} entries)", source.name, elapsed, videos.len());
                ProbeOutcome::available(elapsed)
            }
            Err(e) => {
                info!("Probe {}: unavailable ({})", source.name, e);
                ProbeOutcome::unavailable()
            }
        }
    }

    /// Probe every source concurrently; each result is independent of the others.
    pub async fn probe_all(&self, sources: &[Source], relay: &RelayConfig) -> HashMap<String, ProbeOutcome> {
        let probes = sources.iter().map(|s| async move { (s.id.clone(), self.probe_one(s, relay).await) });
        join_all(probes).await.into_iter().collect()
    }
}
