//! Per-entry download pipeline: resolve, select, fetch, assemble.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::api::BiliApi;
use crate::config::Config;
use crate::download::mux::{mux_tracks, MuxTools};
use crate::download::playlist::{Playlist, PlaylistEntry};
use crate::download::supervisor::TransferSupervisor;
use crate::error::{Error, Result};
use crate::fs::{ensure_dir, move_file, output_stem, remove_if_exists, EntryPaths};
use crate::media::{
    candidates, parse_play_payload, select_audio, select_video, select_with_prompt, ChoicePrompt,
    FrameKind, SelectionPolicy, Track,
};
use crate::output::console::{print_info, print_success, print_tracks, print_warning};
use crate::output::progress::create_spinner;
use crate::output::stats::RunStats;

/// Settings for a pipeline run, taken from the merged configuration.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub policy: SelectionPolicy,
    pub interactive: bool,
    pub video_only: bool,
    pub audio_only: bool,
    pub hide_streams: bool,
    pub skip_mux: bool,
    pub keep_intermediate: bool,
    /// List entries and streams without downloading.
    pub info_only: bool,
    pub delay: Duration,
    pub work_dir: PathBuf,
    pub mux_tools: MuxTools,
}

impl PipelineOptions {
    pub fn from_config(config: &Config, info_only: bool) -> Self {
        Self {
            policy: SelectionPolicy {
                quality_priority: config.selection.quality_priority.clone(),
                encoding_priority: config.selection.encoding_priority.clone(),
            },
            interactive: config.selection.interactive,
            video_only: config.selection.video_only,
            audio_only: config.selection.audio_only,
            hide_streams: config.selection.hide_streams,
            skip_mux: config.mux.skip_mux,
            keep_intermediate: config.mux.keep_intermediate,
            info_only,
            delay: Duration::from_secs(config.download.delay_per_page_secs),
            work_dir: config.work_dir(),
            mux_tools: MuxTools {
                ffmpeg: config.mux.ffmpeg_path.clone(),
                mp4box: config.mux.mp4box_path.clone(),
            },
        }
    }

    /// Codec hint passed to the normalizer: the preferred encoding.
    fn encoding_hint(&self) -> Option<&str> {
        self.policy.encoding_priority.first().map(String::as_str)
    }
}

/// Tracks chosen for one entry.
#[derive(Debug, Clone, Copy)]
pub struct Chosen<'a> {
    pub video: Option<&'a Track>,
    pub audio: Option<&'a Track>,
}

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Streams were listed only.
    Listed,
    /// The final output already existed.
    Skipped(PathBuf),
    Downloaded {
        tracks: u64,
        bytes: u64,
        output: Vec<PathBuf>,
    },
}

/// Pick the tracks to fetch for one entry.
///
/// Audio is skipped for combined streams and is optional when a video track
/// was chosen; it is required for audio-only runs.
pub fn choose_tracks<'a>(
    tracks: &'a [Track],
    options: &PipelineOptions,
    prompt: &mut dyn ChoicePrompt,
) -> Result<Chosen<'a>> {
    let video = if options.audio_only {
        None
    } else if options.interactive {
        Some(select_with_prompt(tracks, FrameKind::Video, &mut *prompt)?)
    } else {
        Some(select_video(tracks, &options.policy)?)
    };

    let wants_audio = !options.video_only && !video.is_some_and(|v| v.combined);
    let has_audio = !candidates(tracks, FrameKind::Audio).is_empty();

    let audio = if !wants_audio || (video.is_some() && !has_audio) {
        None
    } else if options.interactive {
        Some(select_with_prompt(tracks, FrameKind::Audio, &mut *prompt)?)
    } else {
        Some(select_audio(tracks)?)
    };

    Ok(Chosen { video, audio })
}

/// Runs every entry of a playlist through resolution, selection and transfer.
pub struct Pipeline<'a> {
    api: &'a BiliApi,
    supervisor: &'a TransferSupervisor,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(api: &'a BiliApi, supervisor: &'a TransferSupervisor, options: PipelineOptions) -> Self {
        Self {
            api,
            supervisor,
            options,
        }
    }

    /// Process all entries. A failed entry is counted and the loop continues;
    /// cancellation stops the run.
    pub async fn run(
        &self,
        playlist: &Playlist,
        prompt: &mut dyn ChoicePrompt,
        cancel: &CancellationToken,
    ) -> Result<RunStats> {
        let mut stats = RunStats::default();
        let total = playlist.entries.len();

        print_info(&format!("{}: {} entries", playlist.title, total));

        if !self.options.info_only {
            ensure_dir(&self.options.work_dir)?;
        }

        for (i, entry) in playlist.entries.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if i > 0 && !self.options.delay.is_zero() && !self.options.info_only {
                tracing::debug!("Waiting {:?} before next entry", self.options.delay);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = sleep(self.options.delay) => {}
                }
            }

            print_info(&format!(
                "[{}/{}] P{} {}",
                i + 1,
                total,
                entry.index,
                display_name(entry)
            ));

            match self.process_entry(playlist, entry, prompt, cancel).await {
                Ok(EntryOutcome::Listed) => stats.entries_processed += 1,
                Ok(EntryOutcome::Skipped(path)) => {
                    print_info(&format!("Already exists: {}", path.display()));
                    stats.entries_skipped += 1;
                }
                Ok(EntryOutcome::Downloaded {
                    tracks,
                    bytes,
                    output,
                }) => {
                    for path in &output {
                        print_success(&format!("Saved {}", path.display()));
                    }
                    stats.entries_processed += 1;
                    stats.tracks_downloaded += tracks;
                    stats.bytes_downloaded += bytes;
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!("Entry P{} failed: {}", entry.index, e);
                    print_warning(&format!("P{} failed: {}", entry.index, e));
                    stats.entries_failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Resolve, select, fetch and assemble one entry.
    pub async fn process_entry(
        &self,
        playlist: &Playlist,
        entry: &PlaylistEntry,
        prompt: &mut dyn ChoicePrompt,
        cancel: &CancellationToken,
    ) -> Result<EntryOutcome> {
        let spinner = create_spinner("Resolving streams...");
        let payload = self.api.play_payload(&entry.target()).await;
        spinner.finish_and_clear();

        let tracks = parse_play_payload(&payload?, self.options.encoding_hint())?;
        tracing::debug!("Resolved {} tracks for cid {}", tracks.len(), entry.cid);

        if !self.options.hide_streams || self.options.info_only {
            print_tracks(&tracks);
        }

        if self.options.info_only {
            return Ok(EntryOutcome::Listed);
        }

        let chosen = choose_tracks(&tracks, &self.options, prompt)?;

        let stem = output_stem(
            &entry.title,
            &entry.part,
            entry.index,
            playlist.is_multi_part(),
        )?;
        let paths = EntryPaths::new(&self.options.work_dir, stem);

        self.fetch_and_assemble(&chosen, &paths, cancel).await
    }

    async fn fetch_and_assemble(
        &self,
        chosen: &Chosen<'_>,
        paths: &EntryPaths,
        cancel: &CancellationToken,
    ) -> Result<EntryOutcome> {
        let final_path = self.final_path(chosen, paths);
        if let Some(path) = &final_path {
            if path.exists() && !paths.video().exists() && !paths.audio().exists() {
                return Ok(EntryOutcome::Skipped(path.clone()));
            }
        }

        let mut tracks = 0;
        let mut bytes = 0;

        let video_path = match chosen.video {
            Some(video) => {
                print_info(&format!("Downloading video: {}", video.summary()));
                let dest = if video.combined {
                    paths.combined_output(&video.url)
                } else {
                    paths.video()
                };
                let outcome = self.supervisor.fetch_track(video, &dest, cancel).await?;
                tracks += 1;
                bytes += outcome.transferred();
                Some(dest)
            }
            None => None,
        };

        let audio_path = match chosen.audio {
            Some(audio) => {
                print_info(&format!("Downloading audio: {}", audio.summary()));
                let dest = paths.audio();
                let outcome = self.supervisor.fetch_track(audio, &dest, cancel).await?;
                tracks += 1;
                bytes += outcome.transferred();
                Some(dest)
            }
            None => None,
        };

        let output = match (chosen.video, video_path, chosen.audio, audio_path) {
            (Some(video), Some(video_path), _, None) => {
                if video.combined {
                    vec![video_path]
                } else {
                    let output = paths.output();
                    move_file(&video_path, &output).await?;
                    vec![output]
                }
            }
            (None, None, Some(audio), Some(audio_path)) => {
                let output = paths.audio_output(&audio.codec);
                move_file(&audio_path, &output).await?;
                vec![output]
            }
            (Some(_), Some(video_path), Some(_), Some(audio_path)) => {
                if self.options.skip_mux {
                    vec![video_path, audio_path]
                } else {
                    let output = paths.output();
                    mux_tracks(&self.options.mux_tools, &video_path, &audio_path, &output).await?;
                    if !self.options.keep_intermediate {
                        remove_if_exists(&video_path).await?;
                        remove_if_exists(&audio_path).await?;
                    }
                    vec![output]
                }
            }
            _ => Vec::new(),
        };

        Ok(EntryOutcome::Downloaded {
            tracks,
            bytes,
            output,
        })
    }

    /// The file that marks an entry as done, if the run produces one.
    fn final_path(&self, chosen: &Chosen<'_>, paths: &EntryPaths) -> Option<PathBuf> {
        match (chosen.video, chosen.audio) {
            (Some(video), _) if video.combined => None,
            (Some(_), Some(_)) if self.options.skip_mux => None,
            (Some(_), _) => Some(paths.output()),
            (None, Some(audio)) => Some(paths.audio_output(&audio.codec)),
            (None, None) => None,
        }
    }
}

fn display_name(entry: &PlaylistEntry) -> &str {
    if entry.part.is_empty() {
        &entry.title
    } else {
        &entry.part
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<usize>);

    impl ChoicePrompt for Fixed {
        fn choose(&mut self, _kind: FrameKind, _candidates: &[&Track]) -> Result<usize> {
            Ok(self.0.remove(0))
        }
    }

    fn options() -> PipelineOptions {
        PipelineOptions::from_config(&Config::default(), false)
    }

    fn track(kind: FrameKind, desc: &str, codec: &str, bandwidth: u64) -> Track {
        let mut t = Track::new(kind);
        t.description = desc.to_string();
        t.codec = codec.to_string();
        t.bandwidth = bandwidth;
        t.url = format!("https://cdn/{}", desc);
        t
    }

    fn tracks() -> Vec<Track> {
        vec![
            track(FrameKind::Video, "1080P 高清", "AVC", 3000),
            track(FrameKind::Video, "720P 高清", "AVC", 1500),
            track(FrameKind::Audio, "30280", "M4A", 320),
            track(FrameKind::Audio, "30216", "M4A", 64),
        ]
    }

    #[test]
    fn test_choose_both() {
        let tracks = tracks();
        let chosen = choose_tracks(&tracks, &options(), &mut Fixed(vec![])).unwrap();
        assert_eq!(chosen.video.unwrap().description, "1080P 高清");
        assert_eq!(chosen.audio.unwrap().description, "30280");
    }

    #[test]
    fn test_choose_video_only_and_audio_only() {
        let tracks = tracks();

        let mut opts = options();
        opts.video_only = true;
        let chosen = choose_tracks(&tracks, &opts, &mut Fixed(vec![])).unwrap();
        assert!(chosen.video.is_some());
        assert!(chosen.audio.is_none());

        let mut opts = options();
        opts.audio_only = true;
        let chosen = choose_tracks(&tracks, &opts, &mut Fixed(vec![])).unwrap();
        assert!(chosen.video.is_none());
        assert_eq!(chosen.audio.unwrap().bandwidth, 320);
    }

    #[test]
    fn test_choose_interactive() {
        let tracks = tracks();
        let mut opts = options();
        opts.interactive = true;

        let chosen = choose_tracks(&tracks, &opts, &mut Fixed(vec![2, 2])).unwrap();
        assert_eq!(chosen.video.unwrap().description, "720P 高清");
        assert_eq!(chosen.audio.unwrap().description, "30216");

        let err = choose_tracks(&tracks, &opts, &mut Fixed(vec![3])).unwrap_err();
        assert!(matches!(err, Error::InvalidChoice { choice: 3, max: 2 }));
    }

    #[test]
    fn test_combined_track_skips_audio() {
        let mut combined = track(FrameKind::Video, "480P 清晰", "AVC", 0);
        combined.combined = true;
        let tracks = vec![combined];

        let chosen = choose_tracks(&tracks, &options(), &mut Fixed(vec![])).unwrap();
        assert!(chosen.video.unwrap().combined);
        assert!(chosen.audio.is_none());
    }

    #[test]
    fn test_missing_audio() {
        let tracks = vec![track(FrameKind::Video, "1080P 高清", "HEVC", 0)];
        let chosen = choose_tracks(&tracks, &options(), &mut Fixed(vec![])).unwrap();
        assert!(chosen.audio.is_none());

        let mut opts = options();
        opts.audio_only = true;
        let err = choose_tracks(&tracks, &opts, &mut Fixed(vec![])).unwrap_err();
        assert!(matches!(err, Error::NoCandidate(FrameKind::Audio)));
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.download.delay_per_page_secs = 2;
        config.mux.skip_mux = true;

        let opts = PipelineOptions::from_config(&config, true);
        assert_eq!(opts.delay, Duration::from_secs(2));
        assert!(opts.skip_mux);
        assert!(opts.info_only);
        assert_eq!(opts.encoding_hint(), Some("hevc"));
    }

    #[test]
    fn test_display_name() {
        let mut entry = PlaylistEntry {
            aid: 1,
            cid: 2,
            ep_id: None,
            title: "Video".into(),
            part: String::new(),
            index: 1,
            duration: 0,
        };
        assert_eq!(display_name(&entry), "Video");
        entry.part = "Intro".into();
        assert_eq!(display_name(&entry), "Intro");
    }
}
