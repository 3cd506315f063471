//! Play payload normalization.
//!
//! Stream-resolution endpoints answer in one of several layouts. Each layout is
//! detected structurally and extracted by its own function into [`Track`]s.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::media::quality::{audio_codec_name, quality_description, video_codec_name};
use crate::media::track::{FrameKind, Track, TrackPart};

/// Recognized payload layouts, in detection precedence order.
#[derive(Debug, Clone, Copy)]
pub enum PayloadShape<'a> {
    /// `data.video_info.stream_list` with per-stream video wrappers.
    International { video_info: &'a Value },
    /// Adaptive streaming with separate `video`/`audio` representation arrays.
    Dash { dash: &'a Value },
    /// One quality tier split into already-concatenated byte ranges.
    Legacy { root: &'a Value, durl: &'a [Value] },
}

/// Parse a raw play response body into tracks.
pub fn parse_play_payload(body: &str, encoding_hint: Option<&str>) -> Result<Vec<Track>> {
    let doc: Value = serde_json::from_str(body)?;
    normalize(&doc, encoding_hint)
}

/// Normalize a decoded play response into tracks.
///
/// With an encoding hint, video tracks of that codec are moved ahead of the
/// others, keeping relative order within each group.
pub fn normalize(doc: &Value, encoding_hint: Option<&str>) -> Result<Vec<Track>> {
    let shape = detect_shape(doc).ok_or(Error::NoTrackContainer)?;

    let mut tracks = match shape {
        PayloadShape::International { video_info } => extract_international(video_info),
        PayloadShape::Dash { dash } => extract_dash(dash),
        PayloadShape::Legacy { root, durl } => extract_legacy(root, durl),
    };

    if let Some(hint) = encoding_hint.filter(|h| !h.is_empty()) {
        let hinted = |t: &Track| t.is_video() && t.codec.eq_ignore_ascii_case(hint);
        // sort_by_key is stable
        tracks.sort_by_key(|t| !hinted(t));
    }

    tracing::debug!("Normalized {} track(s) from {} payload", tracks.len(), shape_name(&shape));
    Ok(tracks)
}

/// Detect which known layout a document matches.
pub fn detect_shape(doc: &Value) -> Option<PayloadShape<'_>> {
    if let Some(video_info) = doc.pointer("/data/video_info") {
        if video_info.get("stream_list").is_some() {
            return Some(PayloadShape::International { video_info });
        }
    }

    let root = root_node(doc);

    if let Some(dash) = root.get("dash").filter(|d| d.is_object()) {
        return Some(PayloadShape::Dash { dash });
    }

    if let Some(durl) = root.get("durl").and_then(Value::as_array) {
        return Some(PayloadShape::Legacy { root, durl });
    }

    None
}

fn shape_name(shape: &PayloadShape<'_>) -> &'static str {
    match shape {
        PayloadShape::International { .. } => "international",
        PayloadShape::Dash { .. } => "dash",
        PayloadShape::Legacy { .. } => "legacy",
    }
}

/// Locate the node holding the stream containers.
fn root_node(doc: &Value) -> &Value {
    if let Some(result) = doc.get("result").filter(|r| r.is_object()) {
        return result
            .get("video_info")
            .filter(|v| v.is_object())
            .unwrap_or(result);
    }

    doc.get("data").filter(|d| d.is_object()).unwrap_or(doc)
}

fn extract_international(video_info: &Value) -> Vec<Track> {
    let mut tracks = Vec::new();

    for stream in array(video_info, "stream_list") {
        let (Some(info), Some(dash_video)) = (
            stream.get("stream_info").filter(|v| v.is_object()),
            stream.get("dash_video").filter(|v| v.is_object()),
        ) else {
            tracing::debug!("Skipping stream entry without stream_info/dash_video");
            continue;
        };

        let mut track = video_track(dash_video, field_u64(info, "quality") as u32);
        if track.url.is_empty() {
            continue;
        }
        if let Some(desc) = info.get("new_description").and_then(Value::as_str) {
            if !desc.is_empty() {
                track.description = desc.to_string();
            }
        }
        tracks.push(track);
    }

    for audio in array(video_info, "dash_audio") {
        let mut track = audio_track(audio);
        track.codec = "M4A".to_string();
        tracks.push(track);
    }

    tracks
}

fn extract_dash(dash: &Value) -> Vec<Track> {
    let mut tracks = Vec::new();

    for video in array(dash, "video") {
        let id = field_u64(video, "id") as u32;
        tracks.push(video_track(video, id));
    }

    for audio in array(dash, "audio") {
        tracks.push(audio_track(audio));
    }

    if let Some(dolby) = dash.get("dolby") {
        for audio in array(dolby, "audio") {
            let mut track = audio_track(audio);
            track.codec = "E-AC-3".to_string();
            tracks.push(track);
        }
    }

    // Lossless audio is a single object rather than an array
    if let Some(flac) = dash.pointer("/flac/audio").filter(|a| a.is_object()) {
        let mut track = audio_track(flac);
        track.codec = "FLAC".to_string();
        tracks.push(track);
    }

    tracks
}

fn extract_legacy(root: &Value, durl: &[Value]) -> Vec<Track> {
    let quality = field_u64(root, "quality") as u32;

    let mut track = Track::new(FrameKind::Video);
    track.id = quality;
    track.description = quality_description(quality);
    track.codec = video_codec_name(field_i64(root, "video_codecid")).to_string();
    track.combined = true;

    let mut duration_ms = 0u64;
    let mut parts = Vec::with_capacity(durl.len());
    for part in durl {
        let size = field_u64(part, "size");
        track.size += size;
        duration_ms += field_u64(part, "length");
        parts.push(TrackPart {
            url: field_str(part, "url").to_string(),
            backup_urls: url_list(part, &["backup_url", "backupUrl"]),
            size,
        });
    }
    track.duration = duration_ms / 1000;

    if let Some(first) = parts.first() {
        track.url = first.url.clone();
        track.backup_urls = first.backup_urls.clone();
    }
    // A lone part is the whole stream
    if parts.len() > 1 {
        track.parts = parts;
    }

    vec![track]
}

/// Build a video track from a DASH-style representation object.
fn video_track(entry: &Value, quality: u32) -> Track {
    let mut track = Track::new(FrameKind::Video);
    track.id = quality;
    track.description = quality_description(quality);
    track.codec = video_codec_name(field_i64(entry, "codecid")).to_string();
    track.bandwidth = field_u64(entry, "bandwidth") / 1000;
    track.size = field_u64(entry, "size");
    track.width = field_u64(entry, "width") as u32;
    track.height = field_u64(entry, "height") as u32;
    track.fps = frame_rate(entry);
    assign_urls(&mut track, entry);
    track
}

/// Build an audio track from a DASH-style representation object.
fn audio_track(entry: &Value) -> Track {
    let id = field_u64(entry, "id") as u32;

    let mut track = Track::new(FrameKind::Audio);
    track.id = id;
    track.description = id.to_string();
    track.codec = audio_codec_name(field_str(entry, "codecs"));
    track.bandwidth = field_u64(entry, "bandwidth") / 1000;
    track.size = field_u64(entry, "size");
    assign_urls(&mut track, entry);
    track
}

/// Prefer the first backup URL; keep the base URL and other backups as fallbacks.
fn assign_urls(track: &mut Track, entry: &Value) {
    let base = first_str(entry, &["base_url", "baseUrl"]).to_string();
    let mut backups = url_list(entry, &["backup_url", "backupUrl"]);

    if backups.is_empty() {
        track.url = base;
        return;
    }

    track.url = backups.remove(0);
    let mut fallbacks = Vec::with_capacity(backups.len() + 1);
    if !base.is_empty() {
        fallbacks.push(base);
    }
    fallbacks.extend(backups);
    track.backup_urls = fallbacks;
}

fn frame_rate(entry: &Value) -> u32 {
    let raw = entry.get("frame_rate").or_else(|| entry.get("frameRate"));
    match raw {
        Some(Value::String(s)) => s.parse::<f64>().map(|f| f as u32).unwrap_or(0),
        Some(Value::Number(n)) => n.as_f64().map(|f| f as u32).unwrap_or(0),
        _ => 0,
    }
}

fn array<'a>(obj: &'a Value, key: &str) -> &'a [Value] {
    obj.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn field_str<'a>(obj: &'a Value, key: &str) -> &'a str {
    obj.get(key).and_then(Value::as_str).unwrap_or("")
}

fn first_str<'a>(obj: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .map(|k| field_str(obj, k))
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

fn url_list(obj: &Value, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn field_u64(obj: &Value, key: &str) -> u64 {
    match obj.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn field_i64(obj: &Value, key: &str) -> i64 {
    match obj.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}
