//! Configuration structures and loading logic.

use crate::config::modes::{ApiMode, DownloadStrategy};
use crate::error::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub account: AccountConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub mux: MuxConfig,
}

/// Account credentials configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Browser cookie string (e.g. `SESSDATA=...`).
    #[serde(default)]
    pub cookie: Option<String>,

    /// Access token for the TV endpoints.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Browser user agent string. A random desktop one is used when unset.
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Upstream API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Endpoint family (web, tv, intl).
    #[serde(default)]
    pub mode: ApiMode,

    #[serde(default = "default_host")]
    pub host: String,

    /// Host for bangumi episode requests.
    #[serde(default = "default_host")]
    pub ep_host: String,

    #[serde(default = "default_tv_host")]
    pub tv_host: String,

    #[serde(default = "default_intl_host")]
    pub intl_host: String,

    /// Region hint for the international gateway.
    #[serde(default)]
    pub area: Option<String>,

    /// App key for signed TV requests.
    #[serde(default)]
    pub app_key: Option<String>,

    /// App secret matching `app_key`.
    #[serde(default)]
    pub app_secret: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            mode: ApiMode::default(),
            host: default_host(),
            ep_host: default_host(),
            tv_host: default_tv_host(),
            intl_host: default_intl_host(),
            area: None,
            app_key: None,
            app_secret: None,
        }
    }
}

/// Track selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Quality labels in priority order.
    #[serde(default = "default_quality_priority")]
    pub quality_priority: Vec<String>,

    /// Codec names in priority order.
    #[serde(default = "default_encoding_priority")]
    pub encoding_priority: Vec<String>,

    /// Prompt for each track instead of choosing automatically.
    #[serde(default)]
    pub interactive: bool,

    #[serde(default)]
    pub video_only: bool,

    #[serde(default)]
    pub audio_only: bool,

    /// Don't print the available streams before choosing.
    #[serde(default)]
    pub hide_streams: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            quality_priority: default_quality_priority(),
            encoding_priority: default_encoding_priority(),
            interactive: false,
            video_only: false,
            audio_only: false,
            hide_streams: false,
        }
    }
}

/// Transfer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default)]
    pub strategy: DownloadStrategy,

    /// Clip size for segmented transfers, in MiB.
    #[serde(default = "default_segment_size_mib")]
    pub segment_size_mib: u64,

    /// Resumes allowed for an interrupted single-stream transfer.
    #[serde(default = "default_resume_attempts")]
    pub resume_attempts: u32,

    /// Overall per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Output directory. Defaults to the current directory.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Page selection such as `1,3-5`. All pages when unset.
    #[serde(default)]
    pub select_page: Option<String>,

    /// Seconds to wait between entries.
    #[serde(default)]
    pub delay_per_page_secs: u64,

    #[serde(default = "default_aria2c_path")]
    pub aria2c_path: PathBuf,

    /// Extra whitespace-separated aria2c arguments.
    #[serde(default)]
    pub aria2c_args: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            strategy: DownloadStrategy::default(),
            segment_size_mib: default_segment_size_mib(),
            resume_attempts: default_resume_attempts(),
            timeout_secs: default_timeout_secs(),
            work_dir: None,
            select_page: None,
            delay_per_page_secs: 0,
            aria2c_path: default_aria2c_path(),
            aria2c_args: String::new(),
        }
    }
}

/// Mux configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuxConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    #[serde(default = "default_mp4box_path")]
    pub mp4box_path: PathBuf,

    /// Leave video and audio as separate files.
    #[serde(default)]
    pub skip_mux: bool,

    /// Keep the per-track files after a successful mux.
    #[serde(default)]
    pub keep_intermediate: bool,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            mp4box_path: default_mp4box_path(),
            skip_mux: false,
            keep_intermediate: false,
        }
    }
}

fn default_host() -> String {
    "api.bilibili.com".to_string()
}

fn default_tv_host() -> String {
    "api.snm0516.aisee.tv".to_string()
}

fn default_intl_host() -> String {
    "api.biliintl.com".to_string()
}

fn default_quality_priority() -> Vec<String> {
    ["8K 超高清", "4K 超清", "1080P 高码率", "1080P 高清"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_encoding_priority() -> Vec<String> {
    ["hevc", "av1", "avc"].iter().map(|s| s.to_string()).collect()
}

fn default_segment_size_mib() -> u64 {
    20
}

fn default_resume_attempts() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_aria2c_path() -> PathBuf {
    PathBuf::from("aria2c")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_mp4box_path() -> PathBuf {
    PathBuf::from("MP4Box")
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!("Configuration file not found: {}", path.display()))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from the first existing candidate file, or fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::locate(path) {
            Some(found) => {
                tracing::debug!("Loading configuration from {}", found.display());
                Self::load(&found)
            }
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Resolve the configuration file: `path` itself, then the platform config dir.
    pub fn locate(path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }

        // Only the default name falls through to the platform directory
        if path != Path::new(CONFIG_FILE_NAME) {
            return None;
        }

        ProjectDirs::from("", "", "bili-downloader")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .filter(|p| p.is_file())
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the effective output directory.
    pub fn work_dir(&self) -> PathBuf {
        self.download
            .work_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Segment size in bytes.
    pub fn segment_size(&self) -> u64 {
        self.download.segment_size_mib.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.mode, ApiMode::Web);
        assert_eq!(config.download.strategy, DownloadStrategy::Segmented);
        assert_eq!(config.segment_size(), 20 * 1024 * 1024);
        assert_eq!(config.download.timeout_secs, 120);
        assert_eq!(config.selection.quality_priority[0], "8K 超高清");
        assert_eq!(config.selection.encoding_priority, vec!["hevc", "av1", "avc"]);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[account]
cookie = "SESSDATA=abc"

[api]
mode = "tv"

[download]
strategy = "single"
segment_size_mib = 8

[mux]
keep_intermediate = true
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.account.cookie.as_deref(), Some("SESSDATA=abc"));
        assert_eq!(config.api.mode, ApiMode::Tv);
        assert_eq!(config.api.host, "api.bilibili.com");
        assert_eq!(config.download.strategy, DownloadStrategy::Single);
        assert_eq!(config.segment_size(), 8 * 1024 * 1024);
        assert_eq!(config.download.resume_attempts, 3);
        assert!(config.mux.keep_intermediate);
        assert_eq!(config.mux.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.toml");

        let mut config = Config::default();
        config.selection.video_only = true;
        config.download.select_page = Some("1-3".into());
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert!(loaded.selection.video_only);
        assert_eq!(loaded.download.select_page.as_deref(), Some("1-3"));
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(Config::load(&missing), Err(Error::Config(_))));
        assert!(Config::load_or_default(&missing).is_ok());

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[download\nstrategy =").unwrap();
        assert!(matches!(Config::load(&bad), Err(Error::TomlParse(_))));
    }
}
