#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use vodmux::fetch::{HttpResponse, Transport};
use vodmux::types::{Source, SourceKind};

/// Scripted transport: answers by exact URL and counts every request.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Result<HttpResponse, String>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn respond(&self, url: &str, body: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), Ok(HttpResponse::ok(body)));
    }

    pub fn respond_status(&self, url: &str, status: u16, reason: &str) {
        let resp = HttpResponse { status, reason: reason.to_string(), body: String::new() };
        self.routes.lock().unwrap().insert(url.to_string(), Ok(resp));
    }

    pub fn fail(&self, url: &str, message: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), Err(message.to_string()));
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    pub fn seen(&self) -> Vec<String> { self.seen.lock().unwrap().clone() }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(url.to_string());
        match self.routes.lock().unwrap().get(url) {
            Some(Ok(resp)) => Ok(resp.clone()),
            Some(Err(msg)) => Err(anyhow!("{msg}")),
            None => Err(anyhow!("connection refused")),
        }
    }
}

pub fn cms(id: &str, name: &str) -> Source {
    Source::new(id, name, format!("https://{id}.example/api.php/provide/vod"), SourceKind::CmsApi)
}

pub fn playlist(id: &str, name: &str) -> Source {
    Source::new(id, name, format!("https://{id}.example/live.m3u8"), SourceKind::Playlist)
}

pub fn search_url(source: &Source, query: &str) -> String {
    format!("{}?ac=detail&wd={}", source.url, query)
}

pub fn cms_body(titles: &[&str]) -> String {
    let list: Vec<serde_json::Value> = titles
        .iter()
        .enumerate()
        .map(|(i, t)| serde_json::json!({ "vod_id": i + 1, "vod_name": t, "vod_play_url": format!("EP1$https://cdn.example/{i}.m3u8") }))
        .collect();
    serde_json::json!({ "code": 1, "total": list.len(), "list": list }).to_string()
}

pub const PLAYLIST: &str = "#EXTM3U\n\
#EXTINF:-1 tvg-logo=\"https://logo.example/news.png\",News 24\n\
https://stream.example/news.m3u8\n\
#EXTINF:-1,Sports One\n\
https://stream.example/sports.m3u8\n";
