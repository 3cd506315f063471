//! Command-line argument definitions using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::{ApiMode, Config, DownloadStrategy};

/// Bilibili stream resolver and downloader CLI.
#[derive(Parser, Debug)]
#[command(
    name = "bili-downloader",
    version,
    about = "Resolve and download Bilibili video and audio streams",
    long_about = "A CLI tool that resolves a video, bangumi episode, season or media list into \
                  its audio and video streams, picks the best ones and downloads them with \
                  resumable segmented transfers.\n\n\
                  Accepts BV/av/ep/ss identifiers, medialist:<id>, or page URLs."
)]
pub struct Args {
    /// Video URL or identifier (BV…, av…, ep…, ss…, medialist:…).
    pub input: String,

    /// Path to configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Browser cookie string.
    #[arg(long, env = "BILI_COOKIE", hide_env_values = true)]
    pub cookie: Option<String>,

    /// Access token for TV and international endpoints.
    #[arg(long = "access-token", env = "BILI_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Browser user agent string.
    #[arg(short = 'a', long = "user-agent", env = "BILI_USER_AGENT")]
    pub user_agent: Option<String>,

    /// API endpoint family.
    #[arg(short, long, value_enum)]
    pub mode: Option<ApiModeArg>,

    /// Main API host.
    #[arg(long)]
    pub host: Option<String>,

    /// Host for bangumi requests.
    #[arg(long = "ep-host")]
    pub ep_host: Option<String>,

    /// Host for TV requests.
    #[arg(long = "tv-host")]
    pub tv_host: Option<String>,

    /// Region hint.
    #[arg(long)]
    pub area: Option<String>,

    /// App key for signed requests.
    #[arg(long = "app-key", env = "BILI_APP_KEY", hide_env_values = true)]
    pub app_key: Option<String>,

    /// App secret matching the app key.
    #[arg(long = "app-secret", env = "BILI_APP_SECRET", hide_env_values = true)]
    pub app_secret: Option<String>,

    /// Quality labels in priority order, comma-separated.
    #[arg(short = 'q', long = "quality", value_delimiter = ',')]
    pub quality_priority: Option<Vec<String>>,

    /// Encodings in priority order, comma-separated (hevc,av1,avc).
    #[arg(short = 'e', long = "encoding", value_delimiter = ',')]
    pub encoding_priority: Option<Vec<String>>,

    /// Choose streams interactively.
    #[arg(short, long)]
    pub interactive: bool,

    /// Download video only.
    #[arg(long = "video-only")]
    pub video_only: bool,

    /// Download audio only.
    #[arg(long = "audio-only")]
    pub audio_only: bool,

    /// Don't list available streams.
    #[arg(long = "hide-streams")]
    pub hide_streams: bool,

    /// Transfer strategy.
    #[arg(short, long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Segment size in MiB for segmented transfers.
    #[arg(long = "segment-size")]
    pub segment_size_mib: Option<u64>,

    /// Resume attempts for single-stream transfers.
    #[arg(long = "resume-attempts")]
    pub resume_attempts: Option<u32>,

    /// Per-request timeout in seconds.
    #[arg(long = "timeout")]
    pub timeout_secs: Option<u64>,

    /// Output directory.
    #[arg(short = 'd', long = "work-dir")]
    pub work_dir: Option<PathBuf>,

    /// Pages to download, e.g. 1,3-5.
    #[arg(short = 'p', long = "select-page")]
    pub select_page: Option<String>,

    /// Seconds to wait between entries.
    #[arg(long = "delay-per-page")]
    pub delay_per_page_secs: Option<u64>,

    /// Path to the aria2c binary.
    #[arg(long = "aria2c-path")]
    pub aria2c_path: Option<PathBuf>,

    /// Extra aria2c arguments.
    #[arg(long = "aria2c-args", allow_hyphen_values = true)]
    pub aria2c_args: Option<String>,

    /// Path to the ffmpeg binary.
    #[arg(long = "ffmpeg-path")]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to the MP4Box binary.
    #[arg(long = "mp4box-path")]
    pub mp4box_path: Option<PathBuf>,

    /// Leave video and audio as separate files.
    #[arg(long = "skip-mux")]
    pub skip_mux: bool,

    /// Keep per-track files after muxing.
    #[arg(long = "keep-intermediate")]
    pub keep_intermediate: bool,

    /// Only list entries and streams.
    #[arg(long)]
    pub info: bool,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

/// CLI API mode argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ApiModeArg {
    /// Web endpoints (WBI signed).
    Web,
    /// TV endpoints (app-key signed).
    Tv,
    /// International gateway.
    Intl,
}

impl From<ApiModeArg> for ApiMode {
    fn from(arg: ApiModeArg) -> Self {
        match arg {
            ApiModeArg::Web => ApiMode::Web,
            ApiModeArg::Tv => ApiMode::Tv,
            ApiModeArg::Intl => ApiMode::Intl,
        }
    }
}

/// CLI transfer strategy argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    /// Parallel range requests with resumable segment files.
    Segmented,
    /// One resumable stream.
    Single,
    /// Delegate to aria2c.
    Aria2c,
}

impl From<StrategyArg> for DownloadStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Segmented => DownloadStrategy::Segmented,
            StrategyArg::Single => DownloadStrategy::Single,
            StrategyArg::Aria2c => DownloadStrategy::Aria2c,
        }
    }
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(self, config: &mut Config) {
        // Account
        if let Some(cookie) = self.cookie {
            config.account.cookie = Some(cookie);
        }

        if let Some(token) = self.access_token {
            config.account.access_token = Some(token);
        }

        if let Some(user_agent) = self.user_agent {
            config.account.user_agent = Some(user_agent);
        }

        // API
        if let Some(mode) = self.mode {
            config.api.mode = mode.into();
        }

        if let Some(host) = self.host {
            config.api.host = host;
        }

        if let Some(ep_host) = self.ep_host {
            config.api.ep_host = ep_host;
        }

        if let Some(tv_host) = self.tv_host {
            config.api.tv_host = tv_host;
        }

        if let Some(area) = self.area {
            config.api.area = Some(area);
        }

        if let Some(app_key) = self.app_key {
            config.api.app_key = Some(app_key);
        }

        if let Some(app_secret) = self.app_secret {
            config.api.app_secret = Some(app_secret);
        }

        // Selection
        if let Some(quality) = self.quality_priority {
            config.selection.quality_priority = trimmed(quality);
        }

        if let Some(encoding) = self.encoding_priority {
            config.selection.encoding_priority = trimmed(encoding);
        }

        // Boolean flags (only override if set to non-default)
        if self.interactive {
            config.selection.interactive = true;
        }

        if self.video_only {
            config.selection.video_only = true;
        }

        if self.audio_only {
            config.selection.audio_only = true;
        }

        if self.hide_streams {
            config.selection.hide_streams = true;
        }

        // Download
        if let Some(strategy) = self.strategy {
            config.download.strategy = strategy.into();
        }

        if let Some(size) = self.segment_size_mib {
            config.download.segment_size_mib = size;
        }

        if let Some(attempts) = self.resume_attempts {
            config.download.resume_attempts = attempts;
        }

        if let Some(timeout) = self.timeout_secs {
            config.download.timeout_secs = timeout;
        }

        if let Some(dir) = self.work_dir {
            config.download.work_dir = Some(dir);
        }

        if let Some(pages) = self.select_page {
            config.download.select_page = Some(pages);
        }

        if let Some(delay) = self.delay_per_page_secs {
            config.download.delay_per_page_secs = delay;
        }

        if let Some(path) = self.aria2c_path {
            config.download.aria2c_path = path;
        }

        if let Some(extra) = self.aria2c_args {
            config.download.aria2c_args = extra;
        }

        // Mux
        if let Some(path) = self.ffmpeg_path {
            config.mux.ffmpeg_path = path;
        }

        if let Some(path) = self.mp4box_path {
            config.mux.mp4box_path = path;
        }

        if self.skip_mux {
            config.mux.skip_mux = true;
        }

        if self.keep_intermediate {
            config.mux.keep_intermediate = true;
        }
    }
}

fn trimmed(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
