mod common;

use std::sync::Arc;

use common::*;
use vodmux::aggregator::Aggregator;
use vodmux::cache::ResponseCache;
use vodmux::error::{AggregateError, SourceError};
use vodmux::fetch::SourceFetcher;
use vodmux::prober::HealthProber;
use vodmux::relay::RelayConfig;
use vodmux::storage::{MemoryStorage, Storage};
use vodmux::types::{SourceStatus, SourceKind};

fn setup() -> (Arc<MockTransport>, Arc<MemoryStorage>, SourceFetcher) {
    let transport = MockTransport::new();
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = SourceFetcher::new(transport.clone(), ResponseCache::new(storage.clone()));
    (transport, storage, fetcher)
}

#[tokio::test]
async fn partial_failure_keeps_other_results() {
    let (transport, _, fetcher) = setup();
    let (a, b, c) = (cms("a", "Alpha"), cms("b", "Bravo"), cms("c", "Charlie"));
    transport.respond(&search_url(&a, "hero"), &cms_body(&["Hero", "Hero 2"]));
    transport.fail(&search_url(&b, "hero"), "dns error");
    transport.respond(&search_url(&c, "hero"), r#"{"code":1,"total":0,"list":[]}"#);

    let agg = Aggregator::new(fetcher);
    let out = agg.search(&[a, b, c], &RelayConfig::direct(), "hero", false).await.unwrap();

    assert_eq!(out.videos.len(), 2);
    assert!(out.videos.iter().all(|v| v.source_name == "Alpha"));
    assert_eq!(out.errors.len(), 1);
    assert!(out.errors[0].starts_with("Bravo: request failed"));
    assert!(out.is_partial());
    assert!(out.error_summary().unwrap().contains("- Bravo"));
}

#[tokio::test]
async fn no_eligible_sources_makes_no_requests() {
    let (transport, _, fetcher) = setup();
    let mut a = cms("a", "Alpha");
    a.status = SourceStatus::Unavailable;
    let mut b = cms("b", "Bravo");
    b.status = SourceStatus::Testing;

    let agg = Aggregator::new(fetcher);
    let err = agg.search(&[a, b], &RelayConfig::direct(), "x", false).await.unwrap_err();
    assert_eq!(err, AggregateError::NoUsableSources);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn blank_query_is_a_no_op() {
    let (transport, _, fetcher) = setup();
    let agg = Aggregator::new(fetcher);
    let out = agg.search(&[cms("a", "Alpha")], &RelayConfig::direct(), "   ", false).await.unwrap();
    assert!(out.videos.is_empty());
    assert!(out.errors.is_empty());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn second_search_is_served_from_cache() {
    let (transport, _, fetcher) = setup();
    let a = cms("a", "Alpha");
    transport.respond(&search_url(&a, "hero"), &cms_body(&["Hero"]));
    let agg = Aggregator::new(fetcher);
    let sources = vec![a];

    let first = agg.search(&sources, &RelayConfig::direct(), "hero", false).await.unwrap();
    let second = agg.search(&sources, &RelayConfig::direct(), "  hero ", false).await.unwrap();
    assert_eq!(first.videos, second.videos);
    assert_eq!(transport.calls(), 1);

    agg.search(&sources, &RelayConfig::direct(), "hero", true).await.unwrap();
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let (transport, storage, fetcher) = setup();
    let a = cms("a", "Alpha");
    transport.respond(&search_url(&a, "x"), r#"{"code":0,"msg":"maintenance"}"#);
    let agg = Aggregator::new(fetcher);

    let out = agg.search(&[a.clone()], &RelayConfig::direct(), "x", false).await.unwrap();
    assert_eq!(out.errors, vec!["Alpha: maintenance".to_string()]);
    assert!(storage.keys().await.unwrap().is_empty());
    agg.search(&[a], &RelayConfig::direct(), "x", false).await.unwrap();
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn search_unsupported_notice_is_empty_success() {
    let (transport, _, fetcher) = setup();
    let a = cms("a", "Alpha");
    transport.respond(&search_url(&a, "x"), "<p>暂不支持搜索</p>");
    let videos = fetcher.fetch(&a, &RelayConfig::direct(), Some("x"), None, false).await.unwrap();
    assert!(videos.is_empty());
}

#[tokio::test]
async fn html_body_is_a_format_error() {
    let (transport, _, fetcher) = setup();
    let a = cms("a", "Alpha");
    transport.respond(&format!("{}?ac=detail", a.url), "<html><body>blocked</body></html>");
    let err = fetcher.fetch(&a, &RelayConfig::direct(), None, None, false).await.unwrap_err();
    assert!(matches!(err, SourceError::Format { .. }));
}

#[tokio::test]
async fn http_error_status_is_a_transport_error() {
    let (transport, _, fetcher) = setup();
    let a = cms("a", "Alpha");
    transport.respond_status(&format!("{}?ac=detail", a.url), 502, "Bad Gateway");
    let err = fetcher.fetch(&a, &RelayConfig::direct(), None, None, false).await.unwrap_err();
    assert!(err.is_transport());
    assert!(err.to_string().contains("HTTP 502 Bad Gateway"));
}

#[tokio::test]
async fn requests_go_through_the_relay() {
    let (transport, _, fetcher) = setup();
    let a = cms("a", "Alpha");
    let relay = RelayConfig::new("https://relay.example/");
    transport.respond(&format!("https://relay.example/{}?ac=detail&t=2", a.url), &cms_body(&["Drama"]));
    let videos = fetcher.fetch(&a, &relay, None, Some("2"), false).await.unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(transport.seen(), vec![format!("https://relay.example/{}?ac=detail&t=2", a.url)]);
}

#[tokio::test]
async fn playlist_search_filters_titles() {
    let (transport, _, fetcher) = setup();
    let p = playlist("live", "Live TV");
    transport.respond(&p.url, PLAYLIST);
    let agg = Aggregator::new(fetcher);
    let out = agg.search(&[p], &RelayConfig::direct(), "news", false).await.unwrap();
    assert_eq!(out.videos.len(), 1);
    assert_eq!(out.videos[0].title, "News 24");
    assert_eq!(out.videos[0].thumbnail_url, "https://logo.example/news.png");
    assert_eq!(out.videos[0].source_kind, SourceKind::Playlist);
}

#[tokio::test]
async fn spacing_variants_share_one_correct_entry() {
    let (transport, _, fetcher) = setup();
    let p = playlist("live", "Live TV");
    transport.respond(&p.url, PLAYLIST);

    let first = fetcher.fetch(&p, &RelayConfig::direct(), Some("news  24"), None, false).await.unwrap();
    let cached = fetcher.fetch(&p, &RelayConfig::direct(), Some("news 24"), None, false).await.unwrap();
    let fresh = fetcher.fetch(&p, &RelayConfig::direct(), Some("news 24"), None, true).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(cached, fresh);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn differently_cased_queries_are_cached_apart() {
    let (transport, _, fetcher) = setup();
    let a = cms("a", "Alpha");
    transport.respond(&search_url(&a, "Hero"), &cms_body(&["Hero"]));
    transport.respond(&search_url(&a, "hero"), &cms_body(&["hero one", "hero two"]));

    let upper = fetcher.fetch(&a, &RelayConfig::direct(), Some("Hero"), None, false).await.unwrap();
    let lower = fetcher.fetch(&a, &RelayConfig::direct(), Some("hero"), None, false).await.unwrap();
    assert_eq!(upper.len(), 1);
    assert_eq!(lower.len(), 2);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn query_whitespace_is_collapsed_upstream() {
    let (transport, _, fetcher) = setup();
    let a = cms("a", "Alpha");
    transport.respond(&format!("{}?ac=detail&wd=big+show", a.url), &cms_body(&["Big Show"]));
    let videos = fetcher.fetch(&a, &RelayConfig::direct(), Some(" big   show "), None, false).await.unwrap();
    assert_eq!(videos.len(), 1);
}

#[tokio::test]
async fn playlist_category_is_empty_without_network() {
    let (transport, _, fetcher) = setup();
    let p = playlist("live", "Live TV");
    let videos = fetcher.fetch(&p, &RelayConfig::direct(), None, Some("1"), false).await.unwrap();
    assert!(videos.is_empty());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn browse_uses_first_usable_catalog() {
    let (transport, _, fetcher) = setup();
    let mut dead = cms("dead", "Dead");
    dead.status = SourceStatus::Unavailable;
    let good = cms("good", "Good");
    transport.respond(&format!("{}?ac=detail&t=1", good.url), &cms_body(&["Film"]));
    let agg = Aggregator::new(fetcher);

    let videos = agg.browse_category(&[playlist("p", "P"), dead, good], &RelayConfig::direct(), Some("1"), false).await.unwrap();
    assert_eq!(videos[0].source_name, "Good");

    let err = agg.browse_category(&[playlist("p", "P")], &RelayConfig::direct(), None, false).await.unwrap_err();
    assert_eq!(err, AggregateError::NoCatalogSource);
}

#[tokio::test]
async fn probes_classify_each_source() {
    let (transport, _, fetcher) = setup();
    let (a, b, p) = (cms("a", "Alpha"), cms("b", "Bravo"), playlist("live", "Live"));
    transport.respond(&format!("{}?ac=detail", a.url), &cms_body(&["One"]));
    transport.respond(&format!("{}?ac=detail", b.url), "not json");
    transport.respond(&p.url, PLAYLIST);

    let prober = HealthProber::new(fetcher);
    let results = prober.probe_all(&[a, b, p], &RelayConfig::direct()).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results["a"].status, SourceStatus::Available);
    assert!(results["a"].latency_ms.is_some());
    assert_eq!(results["b"].status, SourceStatus::Unavailable);
    assert_eq!(results["b"].latency_ms, None);
    assert_eq!(results["live"].status, SourceStatus::Available);
}

#[tokio::test]
async fn probes_ignore_cached_results() {
    let (transport, _, fetcher) = setup();
    let a = cms("a", "Alpha");
    transport.respond(&format!("{}?ac=detail", a.url), &cms_body(&["One"]));
    fetcher.fetch(&a, &RelayConfig::direct(), None, None, false).await.unwrap();

    transport.fail(&format!("{}?ac=detail", a.url), "timed out");
    let outcome = HealthProber::new(fetcher).probe_one(&a, &RelayConfig::direct()).await;
    assert_eq!(outcome.status, SourceStatus::Unavailable);
    assert_eq!(transport.calls(), 2);
}
