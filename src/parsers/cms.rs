use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::SourceError;
use crate::types::{Episode, Source, Video};

const EPISODE_SEPARATOR: char = '#';
const FIELD_SEPARATOR: char = '$';
const DEFAULT_EPISODE_NAME: &str = "Video";
const DEFAULT_DESCRIPTION: &str = "No description available.";
const DEFAULT_API_ERROR: &str = "The API returned an error.";

/// One raw catalog record. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CmsRecord {
    pub vod_id: Value,
    pub vod_name: Option<String>,
    pub vod_blurb: Option<String>,
    pub vod_pic: Option<String>,
    pub vod_play_url: Option<String>,
    pub vod_remarks: Option<String>,
}

/// Validated shape of a CMS response.
#[derive(Debug, Clone, PartialEq)]
pub enum CmsResponse {
    Success { list: Vec<Value>, total: u64 },
    ApiError { msg: String },
    Malformed,
}

/// Classify a decoded JSON body.
///
/// `total == 0` turns both a failure code and a missing `list` into an empty
/// success, because some backends answer zero-match queries that way.
pub fn decode_cms_response(body: &Value) -> CmsResponse {
    let code = body.get("code").and_then(as_i64);
    let total = body.get("total").and_then(as_i64);
    if code != Some(1) {
        if total == Some(0) {
            return CmsResponse::Success { list: Vec::new(), total: 0 };
        }
        let msg = body
            .get("msg")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_API_ERROR);
        return CmsResponse::ApiError { msg: msg.to_string() };
    }
    match body.get("list").and_then(Value::as_array) {
        Some(list) => CmsResponse::Success { list: list.clone(), total: total.map_or(list.len() as u64, |t| t.max(0) as u64) },
        None if total == Some(0) => CmsResponse::Success { list: Vec::new(), total: 0 },
        None => CmsResponse::Malformed,
    }
}

/// Turn a decoded body into videos attributed to `source`.
pub fn transform_cms(body: &Value, source: &Source) -> Result<Vec<Video>, SourceError> {
    match decode_cms_response(body) {
        CmsResponse::Success { list, .. } => Ok(list.iter().filter_map(|raw| record_to_video(raw, source)).collect()),
        CmsResponse::ApiError { msg } => Err(SourceError::api(&source.name, msg)),
        CmsResponse::Malformed => Err(SourceError::format(
            &source.name,
            "invalid API response: \"list\" is missing or is not an array",
        )),
    }
}

fn record_to_video(raw: &Value, source: &Source) -> Option<Video> {
    let record: CmsRecord = match serde_json::from_value(raw.clone()) {
        Ok(r) => r,
        Err(e) => {
            warn!("Skipping unreadable record from {}: {}", source.name, e);
            return None;
        }
    };
    Some(Video {
        id: id_string(&record.vod_id),
        title: record.vod_name.unwrap_or_default(),
        description: record.vod_blurb.filter(|b| !b.is_empty()).unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        thumbnail_url: record.vod_pic.unwrap_or_default(),
        episodes: parse_episodes(record.vod_play_url.as_deref().unwrap_or_default()),
        remarks: record.vod_remarks.unwrap_or_default(),
        source_id: source.id.clone(),
        source_name: source.name.clone(),
        source_kind: source.kind,
    })
}

/// Split the packed `name$url#name$url` episode grammar. Entries without a
/// url are dropped; a missing name falls back to a generic label.
pub fn parse_episodes(packed: &str) -> Vec<Episode> {
    if packed.is_empty() {
        return Vec::new();
    }
    packed
        .split(EPISODE_SEPARATOR)
        .filter_map(|entry| {
            let mut parts = entry.split(FIELD_SEPARATOR);
            let name = parts.next().unwrap_or_default();
            let url = parts.next().unwrap_or_default();
            if url.is_empty() {
                return None;
            }
            let name = if name.is_empty() { DEFAULT_EPISODE_NAME } else { name };
            Some(Episode { name: name.to_string(), url: url.to_string() })
        })
        .collect()
}

fn id_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// Some backends send numbers as strings.
fn as_i64(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}
