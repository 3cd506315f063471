//! Transfer supervision: strategy choice, mirror fallback and progress display.

use std::path::Path;
use std::sync::Arc;

use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;

use crate::config::DownloadStrategy;
use crate::download::aria2c::{download_with_aria2c, Aria2cOptions};
use crate::download::clip::temp_path;
use crate::download::merge::merge_clips;
use crate::download::segmented::SegmentedDownloader;
use crate::download::source::HttpConfig;
use crate::download::state::{NoProgress, Outcome, ProgressReporter};
use crate::error::{Error, Result};
use crate::media::Track;
use crate::output::progress::create_download_bar;

/// Runs track transfers with the configured strategy.
pub struct TransferSupervisor {
    engine: SegmentedDownloader,
    strategy: DownloadStrategy,
    aria2c: Aria2cOptions,
    http: HttpConfig,
    show_progress: bool,
}

impl TransferSupervisor {
    pub fn new(
        engine: SegmentedDownloader,
        strategy: DownloadStrategy,
        aria2c: Aria2cOptions,
        http: HttpConfig,
    ) -> Self {
        Self {
            engine,
            strategy,
            aria2c,
            http,
            show_progress: true,
        }
    }

    /// Disable progress bars.
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn strategy(&self) -> DownloadStrategy {
        self.strategy
    }

    /// Fetch `track` into `dest`, trying its URLs in order.
    ///
    /// Transport failures move on to the next URL; anything else is returned
    /// immediately. A track served as several parts is fetched part by part
    /// and joined in order.
    pub async fn fetch_track(
        &self,
        track: &Track,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::assembly(parent, e))?;
        }

        let label = format!("{} {}", track.kind, track.codec);
        if track.is_multi_part() {
            return self.fetch_parts(track, dest, &label, cancel).await;
        }

        self.fetch_mirrors(&track.urls(), dest, track.size, &label, cancel)
            .await
    }

    async fn fetch_parts(
        &self,
        track: &Track,
        dest: &Path,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let existing = tokio::fs::metadata(dest).await.map(|m| m.len()).ok();
        if track.size > 0 && existing == Some(track.size) {
            tracing::debug!("{} already complete", dest.display());
            return Ok(Outcome::AlreadyComplete);
        }

        let total = track.parts.len();
        let mut bytes = 0;
        for (index, part) in track.parts.iter().enumerate() {
            let part_dest = temp_path(dest, index);
            let part_label = format!("{} {}/{}", label, index + 1, total);
            tracing::debug!("Fetching part {}/{} into {}", index + 1, total, part_dest.display());

            let outcome = self
                .fetch_mirrors(&part.urls(), &part_dest, part.size, &part_label, cancel)
                .await?;
            bytes += outcome.transferred();
        }

        merge_clips(dest, total).await?;
        Ok(Outcome::Downloaded { bytes })
    }

    async fn fetch_mirrors(
        &self,
        urls: &[&str],
        dest: &Path,
        size_hint: u64,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        if urls.is_empty() {
            return Err(Error::EmptyTrackUrl);
        }

        let mut last_error = None;

        for (attempt, url) in urls.iter().enumerate() {
            if attempt > 0 {
                tracing::info!("Trying mirror {}/{}", attempt + 1, urls.len());
            }

            match self.fetch_url(url, dest, size_hint, label, cancel).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if is_retryable(&e) => {
                    tracing::warn!("Transfer from URL {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(Error::EmptyTrackUrl))
    }

    async fn fetch_url(
        &self,
        url: &str,
        dest: &Path,
        size_hint: u64,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let known_size = (size_hint > 0).then_some(size_hint);

        match self.strategy {
            DownloadStrategy::Aria2c => {
                download_with_aria2c(&self.aria2c, &self.http, url, dest).await?;
                let written = tokio::fs::metadata(dest).await.map(|m| m.len()).unwrap_or(0);
                Ok(Outcome::Downloaded { bytes: written })
            }
            DownloadStrategy::Single => {
                let (bar, reporter) = self.reporter(label);
                let result = self
                    .engine
                    .download_single(url, dest, known_size, reporter, cancel)
                    .await;
                finish(bar);
                result
            }
            DownloadStrategy::Segmented => {
                let (bar, reporter) = self.reporter(label);
                let result = self.engine.download(url, dest, reporter, cancel).await;
                finish(bar);

                match result {
                    Err(e) if e.is_transport() => {
                        tracing::warn!("Segmented transfer failed ({}), falling back to single stream", e);
                        let (bar, reporter) = self.reporter(label);
                        let result = self
                            .engine
                            .download_single(url, dest, known_size, reporter, cancel)
                            .await;
                        finish(bar);
                        result
                    }
                    other => other,
                }
            }
        }
    }

    fn reporter(&self, label: &str) -> (Option<ProgressBar>, Arc<dyn ProgressReporter>) {
        if self.show_progress {
            let bar = create_download_bar(label);
            (Some(bar.clone()), Arc::new(bar))
        } else {
            (None, Arc::new(NoProgress))
        }
    }
}

fn finish(bar: Option<ProgressBar>) {
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
}

fn is_retryable(error: &Error) -> bool {
    error.is_transport() || matches!(error, Error::Aria2c(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::segmented::EngineOptions;
    use crate::download::source::testing::MemorySource;
    use crate::media::FrameKind;
    use tempfile::tempdir;

    fn supervisor(source: Arc<MemorySource>, strategy: DownloadStrategy) -> TransferSupervisor {
        let engine = SegmentedDownloader::new(
            source,
            EngineOptions {
                segment_size: 8,
                ..EngineOptions::default()
            },
        );
        TransferSupervisor::new(engine, strategy, Aria2cOptions::default(), HttpConfig::default())
            .quiet()
    }

    fn track(urls: &[&str]) -> Track {
        let mut track = Track::new(FrameKind::Video);
        track.url = urls[0].to_string();
        track.backup_urls = urls[1..].iter().map(|u| u.to_string()).collect();
        track
    }

    #[tokio::test]
    async fn test_falls_back_to_backup_url() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("sub").join("v.m4s");
        let data: Vec<u8> = (0..30).collect();
        let source = Arc::new(MemorySource::new().with("m://mirror", data.clone()));

        let outcome = supervisor(source, DownloadStrategy::Segmented)
            .fetch_track(
                &track(&["m://dead", "m://mirror"]),
                &dest,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.transferred(), 30);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_segment_failure_falls_back_to_single_stream() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("v.m4s");
        let data: Vec<u8> = (0..20).collect();
        let mut source = MemorySource::new().with("m://v", data.clone());
        source.failing_offsets.insert(8);
        let source = Arc::new(source);

        supervisor(source.clone(), DownloadStrategy::Segmented)
            .fetch_track(&track(&["m://v"]), &dest, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
        let ranges = source.ranges.lock().unwrap().clone();
        assert_eq!(ranges.last(), Some(&None));
        // Clip temp files from the failed attempt stay behind for a later run
        assert!(temp_path(&dest, 0).exists());
    }

    #[tokio::test]
    async fn test_single_strategy() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("v.flv");
        let data: Vec<u8> = (0..40).collect();
        let source = Arc::new(MemorySource::new().with("m://v", data.clone()));

        supervisor(source.clone(), DownloadStrategy::Single)
            .fetch_track(&track(&["m://v"]), &dest, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(source.open_count(), 1);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_truncated_body_falls_back_to_backup_url() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("v.flv");
        let data: Vec<u8> = (0..20).collect();
        let source = Arc::new(
            MemorySource::new()
                .with("m://short", data[..10].to_vec())
                .with("m://full", data.clone()),
        );
        let mut track = track(&["m://short", "m://full"]);
        track.size = 20;

        supervisor(source.clone(), DownloadStrategy::Single)
            .fetch_track(&track, &dest, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
        // The full request and three resumes on the short URL, then the backup
        assert_eq!(source.open_count(), 5);
    }

    fn two_part_track() -> (Track, Vec<u8>) {
        let payload = serde_json::json!({
            "data": {
                "quality": 32,
                "video_codecid": 7,
                "durl": [
                    { "length": 1000, "size": 20, "url": "m://part1" },
                    { "length": 1000, "size": 20, "url": "m://part2", "backup_url": ["m://part2b"] }
                ]
            }
        });
        let track = crate::media::parse_play_payload(&payload.to_string(), None)
            .unwrap()
            .remove(0);
        (track, (0..40).collect())
    }

    #[tokio::test]
    async fn test_multi_part_track_joins_every_part() {
        for strategy in [DownloadStrategy::Single, DownloadStrategy::Segmented] {
            let dir = tempdir().unwrap();
            let dest = dir.path().join("v.flv");
            let (track, data) = two_part_track();
            let source = Arc::new(
                MemorySource::new()
                    .with("m://part1", data[..20].to_vec())
                    .with("m://part2b", data[20..].to_vec()),
            );

            let outcome = supervisor(source, strategy)
                .fetch_track(&track, &dest, &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(outcome.transferred(), 40, "{}", strategy);
            assert_eq!(tokio::fs::read(&dest).await.unwrap(), data, "{}", strategy);
            assert!(!temp_path(&dest, 0).exists());
            assert!(!temp_path(&dest, 1).exists());
        }
    }

    #[tokio::test]
    async fn test_multi_part_track_already_complete() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("v.flv");
        let (track, data) = two_part_track();
        tokio::fs::write(&dest, &data).await.unwrap();
        let source = Arc::new(MemorySource::new());

        let outcome = supervisor(source.clone(), DownloadStrategy::Segmented)
            .fetch_track(&track, &dest, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::AlreadyComplete);
        assert_eq!(source.open_count(), 0);
    }

    #[tokio::test]
    async fn test_all_urls_fail() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("v.m4s");
        let source = Arc::new(MemorySource::new());

        let err = supervisor(source, DownloadStrategy::Segmented)
            .fetch_track(&track(&["m://a", "m://b"]), &dest, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_empty_track_url() {
        let dir = tempdir().unwrap();
        let source = Arc::new(MemorySource::new());
        let empty = Track::new(FrameKind::Audio);

        let err = supervisor(source, DownloadStrategy::Segmented)
            .fetch_track(&empty, &dir.path().join("a.m4s"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyTrackUrl));
    }
}
