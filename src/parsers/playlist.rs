use crate::error::SourceError;
use crate::types::{Episode, Source, Video};

const EXTINF: &str = "#EXTINF:";
const LOGO_ATTR: &str = "tvg-logo=\"";
pub const FALLBACK_THUMBNAIL: &str = "https://via.placeholder.com/300x450.png?text=Live";
pub const LIVE_REMARK: &str = "Live";
pub const PLAY_LABEL: &str = "Play";

/// True when the body looks like an XML/HTML page rather than a playlist,
/// which is what a failing relay usually sends back.
pub fn looks_like_markup(content: &str) -> bool {
    content.trim_start().starts_with('<')
}

// Metadata from an EXTINF line waiting for its URI line.
struct Pending {
    id: String,
    title: String,
    thumbnail_url: String,
}

/// Scan an M3U8 playlist into single-episode live videos. With a `query`,
/// only channels whose title contains it (case-insensitively) are kept.
pub fn parse_playlist(content: &str, source: &Source, query: Option<&str>) -> Result<Vec<Video>, SourceError> {
    if looks_like_markup(content) {
        return Err(SourceError::format(
            &source.name,
            "the server returned XML/HTML instead of an M3U8 playlist",
        ));
    }
    let needle = query.map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty());
    let mut videos = Vec::new();
    let mut pending: Option<Pending> = None;

    for (i, raw) in content.split('\n').enumerate() {
        let line = raw.trim();
        if line.starts_with(EXTINF) {
            let title = extinf_title(line).map(str::to_string).unwrap_or_else(|| format!("Unknown channel {i}"));
            pending = Some(Pending {
                id: format!("{}-{}-{}", source.id, title, i),
                thumbnail_url: extinf_logo(line).unwrap_or(FALLBACK_THUMBNAIL).to_string(),
                title,
            });
        } else if !line.is_empty() && !line.starts_with('#') {
            // A URI with no preceding EXTINF is skipped.
            let Some(p) = pending.take() else { continue };
            if let Some(n) = &needle {
                if !p.title.to_lowercase().contains(n.as_str()) {
                    continue;
                }
            }
            videos.push(Video {
                description: format!("Live channel: {}", p.title),
                id: p.id,
                title: p.title,
                thumbnail_url: p.thumbnail_url,
                episodes: vec![Episode { name: PLAY_LABEL.to_string(), url: line.to_string() }],
                remarks: LIVE_REMARK.to_string(),
                source_id: source.id.clone(),
                source_name: source.name.clone(),
                source_kind: source.kind,
            });
        }
    }
    Ok(videos)
}

fn extinf_title(line: &str) -> Option<&str> {
    line.rfind(',').map(|pos| line[pos + 1..].trim()).filter(|t| !t.is_empty())
}

fn extinf_logo(line: &str) -> Option<&str> {
    let start = line.find(LOGO_ATTR)? + LOGO_ATTR.len();
    let len = line[start..].find('"')?;
    Some(&line[start..start + len]).filter(|l| !l.is_empty())
}
