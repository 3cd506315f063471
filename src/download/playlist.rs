//! Expanding a media identifier into the entries to download.

use crate::api::{BiliApi, MediaListInfo, MediaListItem, PlayTarget, SeasonInfo, VideoView};
use crate::config::{parse_page_selection, MediaId};
use crate::error::Result;

/// One downloadable item (a video part or a bangumi episode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub aid: u64,
    pub cid: u64,
    pub ep_id: Option<u64>,
    /// Title of the video, season or list this entry belongs to.
    pub title: String,
    /// Part or episode title; may be empty.
    pub part: String,
    /// 1-based position in the playlist.
    pub index: u32,
    /// Seconds.
    pub duration: u64,
}

impl PlaylistEntry {
    pub fn target(&self) -> PlayTarget {
        PlayTarget {
            aid: self.aid,
            cid: self.cid,
            ep_id: self.ep_id,
        }
    }

    pub fn is_bangumi(&self) -> bool {
        self.ep_id.is_some()
    }
}

/// Entries resolved from one identifier.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    pub title: String,
    pub entries: Vec<PlaylistEntry>,
}

impl Playlist {
    /// Whether output names need a part suffix.
    pub fn is_multi_part(&self) -> bool {
        self.entries.len() > 1
    }

    /// Keep only the pages named by `selection` (1-based).
    pub fn select_pages(mut self, selection: Option<&str>) -> Result<Self> {
        let Some(selection) = selection else {
            return Ok(self);
        };

        let pages = parse_page_selection(selection, self.entries.len())?;
        self.entries = pages
            .into_iter()
            .filter_map(|page| self.entries.get(page - 1).cloned())
            .collect();
        Ok(self)
    }
}

/// Resolve an identifier into its playlist.
pub async fn resolve_playlist(api: &BiliApi, id: &MediaId) -> Result<Playlist> {
    match id {
        MediaId::Bvid(_) | MediaId::Aid(_) => {
            let view = api.video_view(id).await?;
            Ok(from_view(view))
        }
        MediaId::Episode(ep_id) => {
            let season = api.season(id).await?;
            Ok(from_season(season, Some(*ep_id)))
        }
        MediaId::Season(_) => {
            let season = api.season(id).await?;
            Ok(from_season(season, None))
        }
        MediaId::MediaList(ml_id) => {
            let info = api.medialist_info(*ml_id).await?;
            let items = api.medialist_items(*ml_id).await?;
            Ok(from_medialist(info, items))
        }
    }
}

fn from_view(view: VideoView) -> Playlist {
    let entries = view
        .pages
        .iter()
        .enumerate()
        .map(|(i, page)| PlaylistEntry {
            aid: view.aid,
            cid: page.cid,
            ep_id: None,
            title: view.title.clone(),
            part: page.part.clone(),
            index: if page.page > 0 { page.page } else { i as u32 + 1 },
            duration: page.duration,
        })
        .collect();

    Playlist {
        title: view.title,
        entries,
    }
}

/// Season entries. With `only_episode`, just that episode is kept if present.
fn from_season(season: SeasonInfo, only_episode: Option<u64>) -> Playlist {
    let entries: Vec<PlaylistEntry> = season
        .episodes
        .iter()
        .enumerate()
        .map(|(i, ep)| PlaylistEntry {
            aid: ep.aid,
            cid: ep.cid,
            ep_id: Some(ep.id),
            title: season.title.clone(),
            part: episode_title(&ep.title, &ep.long_title),
            index: i as u32 + 1,
            duration: ep.duration / 1000,
        })
        .collect();

    let entries = match only_episode {
        Some(ep_id) if entries.iter().any(|e| e.ep_id == Some(ep_id)) => entries
            .into_iter()
            .filter(|e| e.ep_id == Some(ep_id))
            .collect(),
        Some(ep_id) => {
            tracing::warn!("Episode {} not listed in season {}, keeping all", ep_id, season.season_id);
            entries
        }
        None => entries,
    };

    Playlist {
        title: season.title,
        entries,
    }
}

fn episode_title(title: &str, long_title: &str) -> String {
    match (title.trim(), long_title.trim()) {
        (t, "") => t.to_string(),
        ("", l) => l.to_string(),
        (t, l) => format!("{} {}", t, l),
    }
}

/// Media list entries, one per part of every listed video.
fn from_medialist(info: MediaListInfo, items: Vec<MediaListItem>) -> Playlist {
    let mut entries = Vec::new();

    for item in items {
        let multi = item.pages.len() > 1;
        for part in item.pages {
            let name = if multi {
                format!("{} {}", item.title, part.title)
            } else {
                item.title.clone()
            };

            entries.push(PlaylistEntry {
                aid: item.id,
                cid: part.id,
                ep_id: None,
                title: info.title.clone(),
                part: name,
                index: entries.len() as u32 + 1,
                duration: part.duration,
            });
        }
    }

    Playlist {
        title: info.title,
        entries,
    }
}
