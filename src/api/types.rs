//! API response type definitions.

use serde::Deserialize;

/// Generic API response wrapper.
///
/// Web endpoints put the payload under `data`, bangumi endpoints under `result`.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default, alias = "msg")]
    pub message: String,
    pub data: Option<T>,
    pub result: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Take the payload from whichever field carries it.
    pub fn into_payload(self) -> Option<T> {
        self.data.or(self.result)
    }
}

/// Minimal envelope used to check the status code of untyped responses.
#[derive(Debug, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub code: i64,
    #[serde(default, alias = "msg")]
    pub message: String,
}

/// Video metadata from `/x/web-interface/view`.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoView {
    pub aid: u64,
    #[serde(default)]
    pub bvid: String,
    pub title: String,
    #[serde(default)]
    pub pubdate: i64,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub pages: Vec<VideoPage>,
}

/// Uploader information.
#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub mid: u64,
    pub name: String,
}

/// One part of a multi-part video.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoPage {
    pub cid: u64,
    pub page: u32,
    #[serde(default)]
    pub part: String,
    /// Seconds.
    #[serde(default)]
    pub duration: u64,
}

/// Bangumi season from `/pgc/view/web/season`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeasonInfo {
    pub season_id: u64,
    pub title: String,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

/// One bangumi episode.
#[derive(Debug, Clone, Deserialize)]
pub struct Episode {
    pub aid: u64,
    pub cid: u64,
    /// Episode id.
    pub id: u64,
    /// Episode number or short label.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub long_title: String,
    /// Milliseconds.
    #[serde(default)]
    pub duration: u64,
}

/// Media list header from `/x/v2/medialist/info`.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaListInfo {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub media_count: u64,
}

/// One page of `/x/v2/medialist/resource/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaListPage {
    #[serde(default)]
    pub media_list: Option<Vec<MediaListItem>>,
    #[serde(default)]
    pub has_more: bool,
}

/// A video in a media list.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaListItem {
    /// Video aid.
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub pages: Vec<MediaListPart>,
}

/// One part of a media list video.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaListPart {
    /// Part cid.
    pub id: u64,
    pub page: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration: u64,
}

/// Payload of `/x/web-interface/nav`.
#[derive(Debug, Clone, Deserialize)]
pub struct NavData {
    pub wbi_img: WbiImage,
}

/// Image URLs carrying the WBI key halves.
#[derive(Debug, Clone, Deserialize)]
pub struct WbiImage {
    pub img_url: String,
    pub sub_url: String,
}
